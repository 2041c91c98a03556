// Run a closure inside the caller's write transaction, or inside a new one
// that is committed here if the caller didn't pass one.
macro_rules! write_transact {
    ($slf:ident, $txn:ident, $f:ident) => {
        match $txn {
            Some(txn) => $f(txn),
            None => {
                let mut txn = $slf.env.write_txn()?;
                let result = $f(&mut txn)?;
                txn.commit()?;
                Ok(result)
            }
        }
    };
}

// A boolean stored in the general database
macro_rules! def_flag {
    ($field:ident, $string:literal, $default:expr) => {
        paste! {
            pub fn [<set_flag_ $field>]<'a>(
                &'a self,
                $field: bool,
                rw_txn: Option<&mut RwTxn<'a>>,
            ) -> Result<(), Error> {
                let bytes: [u8; 1] = [$field as u8];
                let f = |txn: &mut RwTxn<'a>| -> Result<(), Error> {
                    self.general.put(txn, $string, &bytes)?;
                    Ok(())
                };
                write_transact!(self, rw_txn, f)
            }

            pub fn [<get_flag_ $field>](&self) -> bool {
                let txn = match self.env.read_txn() {
                    Ok(txn) => txn,
                    Err(_) => return $default,
                };
                match self.general.get(&txn, $string) {
                    Ok(Some(bytes)) => bytes.first().map(|b| *b != 0).unwrap_or($default),
                    _ => $default,
                }
            }
        }
    };
}

// A setting stored as JSON in the general database, with read, write,
// default and reset functions
macro_rules! def_setting {
    ($field:ident, $string:literal, $type:ty, $default:expr) => {
        paste! {
            #[allow(dead_code)]
            pub fn [<write_setting_ $field>]<'a>(
                &'a self,
                $field: &$type,
                rw_txn: Option<&mut RwTxn<'a>>,
            ) -> Result<(), Error> {
                let bytes = serde_json::to_vec($field)?;
                let f = |txn: &mut RwTxn<'a>| -> Result<(), Error> {
                    self.general.put(txn, $string, &bytes)?;
                    Ok(())
                };
                write_transact!(self, rw_txn, f)
            }

            #[allow(dead_code)]
            pub fn [<read_setting_ $field>](&self) -> $type {
                let txn = match self.env.read_txn() {
                    Ok(txn) => txn,
                    Err(_) => return $default,
                };
                match self.general.get(&txn, $string) {
                    Ok(Some(bytes)) => match serde_json::from_slice::<$type>(bytes) {
                        Ok(val) => val,
                        Err(e) => {
                            tracing::warn!(
                                "Bad stored value for setting {}, using default: {}",
                                stringify!($field),
                                e
                            );
                            $default
                        }
                    },
                    _ => $default,
                }
            }

            #[allow(dead_code)]
            pub fn [<get_default_setting_ $field>]() -> $type {
                $default
            }

            #[allow(dead_code)]
            pub fn [<reset_setting_ $field>]<'a>(
                &'a self,
                rw_txn: Option<&mut RwTxn<'a>>,
            ) -> Result<(), Error> {
                let f = |txn: &mut RwTxn<'a>| -> Result<(), Error> {
                    self.general.delete(txn, $string)?;
                    Ok(())
                };
                write_transact!(self, rw_txn, f)
            }
        }
    };
}

mod contacts1;

use crate::contracts::{INDEXER_URL, MODULE_ADDRESS, REST_URL};
use crate::error::Error;
use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn, RwTxn};
use paste::paste;
use std::path::Path;

type RawDatabase = Database<Bytes, Bytes>;

/// The LMDB storage engine.
///
/// All calls are synchronous but fast so callers can just wait on them.
#[derive(Clone)]
pub struct Storage {
    env: Env,

    // General database (settings, flags)
    general: RawDatabase,

    // Owner address -> contact list
    contacts: RawDatabase,
}

impl Storage {
    /// Open (creating if needed) the LMDB environment in `dir`
    pub fn open(dir: &Path) -> Result<Storage, Error> {
        let mut builder = EnvOpenOptions::new();
        unsafe {
            builder.flags(EnvFlags::NO_TLS);
        }
        builder.max_dbs(8);

        // Size of the map in virtual address space. Our data is small.
        builder.map_size(1048576 * 1024); // 1 GB

        let env = unsafe {
            match builder.open(dir) {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!("Unable to open LMDB at {}", dir.display());
                    return Err(e.into());
                }
            }
        };

        let mut txn = env.write_txn()?;

        let general = env
            .database_options()
            .types::<Bytes, Bytes>()
            .name("general")
            .create(&mut txn)?;

        let contacts = env
            .database_options()
            .types::<Bytes, Bytes>()
            .name("contacts1")
            .create(&mut txn)?;

        txn.commit()?;

        Ok(Storage {
            env,
            general,
            contacts,
        })
    }

    /// Get a write transaction. With it, you can do multiple writes before you commit it.
    /// Bundling multiple writes together is more efficient.
    pub fn get_write_txn(&self) -> Result<RwTxn<'_>, Error> {
        Ok(self.env.write_txn()?)
    }

    /// Get a read transaction.
    pub fn get_read_txn(&self) -> Result<RoTxn<'_>, Error> {
        Ok(self.env.read_txn()?)
    }

    /// Sync the data to disk. This happens periodically, but sometimes it's useful to force
    /// it.
    pub fn sync(&self) -> Result<(), Error> {
        self.env.force_sync()?;
        Ok(())
    }

    /// The number of records in the general table
    pub fn get_general_len(&self) -> Result<u64, Error> {
        let txn = self.env.read_txn()?;
        Ok(self.general.len(&txn)?)
    }

    /// The number of wallets with a stored contact list
    pub fn get_contacts_len(&self) -> Result<u64, Error> {
        let txn = self.env.read_txn()?;
        Ok(self.contacts.len(&txn)?)
    }

    // Flags ------------------------------------------------------------

    def_flag!(registration_pending, b"spacely_registration_pending", false);

    // Settings ----------------------------------------------------------

    // This defines functions for read_{setting} and write_{setting} for each
    // setting value
    def_setting!(offline, b"offline", bool, false);
    def_setting!(rest_url, b"rest_url", String, REST_URL.to_owned());
    def_setting!(indexer_url, b"indexer_url", String, INDEXER_URL.to_owned());
    def_setting!(
        module_address,
        b"module_address",
        String,
        MODULE_ADDRESS.to_owned()
    );
    def_setting!(use_indexer, b"use_indexer", bool, true);
    def_setting!(set_user_agent, b"set_user_agent", bool, true);
    def_setting!(view_connect_timeout_sec, b"view_connect_timeout_sec", u64, 15);
    def_setting!(view_timeout_sec, b"view_timeout_sec", u64, 30);
    def_setting!(view_max_requests, b"view_max_requests", u8, 4);
    def_setting!(
        view_exclusion_on_rate_limit_secs,
        b"view_exclusion_on_rate_limit_secs",
        u64,
        30
    );
    def_setting!(profile_poll_secs, b"profile_poll_secs", u64, 30);
    def_setting!(ups_poll_secs, b"ups_poll_secs", u64, 10);
    def_setting!(messages_poll_secs, b"messages_poll_secs", u64, 10);
    def_setting!(conversations_poll_secs, b"conversations_poll_secs", u64, 15);
    def_setting!(events_poll_secs, b"events_poll_secs", u64, 60);
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// A storage in a fresh temporary directory. Keep the TempDir alive for
    /// as long as the storage is used.
    pub(crate) fn temp_storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_settings_default_and_roundtrip() {
        let (_dir, storage) = temp_storage();
        assert_eq!(storage.read_setting_rest_url(), REST_URL);
        assert_eq!(storage.read_setting_view_max_requests(), 4);
        assert_eq!(Storage::get_default_setting_events_poll_secs(), 60);

        storage
            .write_setting_rest_url(&"http://localhost:8080/v1".to_owned(), None)
            .unwrap();
        storage.write_setting_offline(&true, None).unwrap();
        assert_eq!(storage.read_setting_rest_url(), "http://localhost:8080/v1");
        assert!(storage.read_setting_offline());

        storage.reset_setting_rest_url(None).unwrap();
        assert_eq!(storage.read_setting_rest_url(), REST_URL);
    }

    #[test]
    fn test_settings_in_one_transaction() {
        let (_dir, storage) = temp_storage();
        let mut txn = storage.get_write_txn().unwrap();
        storage
            .write_setting_ups_poll_secs(&5, Some(&mut txn))
            .unwrap();
        storage
            .write_setting_use_indexer(&false, Some(&mut txn))
            .unwrap();
        txn.commit().unwrap();
        assert_eq!(storage.read_setting_ups_poll_secs(), 5);
        assert!(!storage.read_setting_use_indexer());
    }

    #[test]
    fn test_registration_flag() {
        let (_dir, storage) = temp_storage();
        assert!(!storage.get_flag_registration_pending());
        storage.set_flag_registration_pending(true, None).unwrap();
        assert!(storage.get_flag_registration_pending());
        storage.set_flag_registration_pending(false, None).unwrap();
        assert!(!storage.get_flag_registration_pending());
    }
}
