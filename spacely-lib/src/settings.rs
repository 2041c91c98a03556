use crate::error::{Error, ErrorKind};
use crate::storage::Storage;
use paste::paste;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

macro_rules! load_setting {
    ($storage:ident, $field:ident) => {
        paste! {
            $storage.[<read_setting_ $field>]()
        }
    };
}

macro_rules! default_setting {
    ($field:ident) => {
        paste! {
            Storage::[<get_default_setting_ $field>]()
        }
    };
}

macro_rules! save_setting {
    ($storage:ident, $field:ident, $slf:ident, $txn:ident) => {
        paste! {
            $storage.[<write_setting_ $field>](&$slf.$field, Some(&mut $txn))?;
        }
    };
}

/// Settings are stored individually in storage. This gathers them together
/// for display and for editing several at once.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    // Network settings
    pub offline: bool,
    pub rest_url: String,
    pub indexer_url: String,
    pub module_address: String,
    pub use_indexer: bool,
    pub set_user_agent: bool,

    // View gateway settings
    pub view_connect_timeout_sec: u64,
    pub view_timeout_sec: u64,
    pub view_max_requests: u8,
    pub view_exclusion_on_rate_limit_secs: u64,

    // Polling settings
    pub profile_poll_secs: u64,
    pub ups_poll_secs: u64,
    pub messages_poll_secs: u64,
    pub conversations_poll_secs: u64,
    pub events_poll_secs: u64,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            offline: default_setting!(offline),
            rest_url: default_setting!(rest_url),
            indexer_url: default_setting!(indexer_url),
            module_address: default_setting!(module_address),
            use_indexer: default_setting!(use_indexer),
            set_user_agent: default_setting!(set_user_agent),
            view_connect_timeout_sec: default_setting!(view_connect_timeout_sec),
            view_timeout_sec: default_setting!(view_timeout_sec),
            view_max_requests: default_setting!(view_max_requests),
            view_exclusion_on_rate_limit_secs: default_setting!(
                view_exclusion_on_rate_limit_secs
            ),
            profile_poll_secs: default_setting!(profile_poll_secs),
            ups_poll_secs: default_setting!(ups_poll_secs),
            messages_poll_secs: default_setting!(messages_poll_secs),
            conversations_poll_secs: default_setting!(conversations_poll_secs),
            events_poll_secs: default_setting!(events_poll_secs),
        }
    }
}

impl Settings {
    pub fn load(storage: &Storage) -> Settings {
        Settings {
            offline: load_setting!(storage, offline),
            rest_url: load_setting!(storage, rest_url),
            indexer_url: load_setting!(storage, indexer_url),
            module_address: load_setting!(storage, module_address),
            use_indexer: load_setting!(storage, use_indexer),
            set_user_agent: load_setting!(storage, set_user_agent),
            view_connect_timeout_sec: load_setting!(storage, view_connect_timeout_sec),
            view_timeout_sec: load_setting!(storage, view_timeout_sec),
            view_max_requests: load_setting!(storage, view_max_requests),
            view_exclusion_on_rate_limit_secs: load_setting!(
                storage,
                view_exclusion_on_rate_limit_secs
            ),
            profile_poll_secs: load_setting!(storage, profile_poll_secs),
            ups_poll_secs: load_setting!(storage, ups_poll_secs),
            messages_poll_secs: load_setting!(storage, messages_poll_secs),
            conversations_poll_secs: load_setting!(storage, conversations_poll_secs),
            events_poll_secs: load_setting!(storage, events_poll_secs),
        }
    }

    pub fn save(&self, storage: &Storage) -> Result<(), Error> {
        self.validate()?;
        let mut txn = storage.get_write_txn()?;
        save_setting!(storage, offline, self, txn);
        save_setting!(storage, rest_url, self, txn);
        save_setting!(storage, indexer_url, self, txn);
        save_setting!(storage, module_address, self, txn);
        save_setting!(storage, use_indexer, self, txn);
        save_setting!(storage, set_user_agent, self, txn);
        save_setting!(storage, view_connect_timeout_sec, self, txn);
        save_setting!(storage, view_timeout_sec, self, txn);
        save_setting!(storage, view_max_requests, self, txn);
        save_setting!(storage, view_exclusion_on_rate_limit_secs, self, txn);
        save_setting!(storage, profile_poll_secs, self, txn);
        save_setting!(storage, ups_poll_secs, self, txn);
        save_setting!(storage, messages_poll_secs, self, txn);
        save_setting!(storage, conversations_poll_secs, self, txn);
        save_setting!(storage, events_poll_secs, self, txn);
        txn.commit()?;
        Ok(())
    }

    /// Every setting name with its current value, as JSON
    pub fn entries(&self) -> Result<Vec<(String, Value)>, Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(ErrorKind::Internal("settings are not an object".to_owned()).into()),
        }
    }

    /// Change one setting by name. The value is read as JSON if it parses
    /// as JSON, and as a plain string otherwise.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let mut map = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => return Err(ErrorKind::Internal("settings are not an object".to_owned()).into()),
        };
        if !map.contains_key(name) {
            return Err(ErrorKind::General(format!("No such setting: {}", name)).into());
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
        map.insert(name.to_owned(), value);
        let changed: Settings = serde_json::from_value(Value::Object(map))?;
        changed.validate()?;
        *self = changed;
        Ok(())
    }

    /// Intervals, timeouts and the request cap must be at least 1
    pub fn validate(&self) -> Result<(), Error> {
        let positive = [
            ("view_connect_timeout_sec", self.view_connect_timeout_sec),
            ("view_timeout_sec", self.view_timeout_sec),
            ("view_max_requests", self.view_max_requests as u64),
            ("profile_poll_secs", self.profile_poll_secs),
            ("ups_poll_secs", self.ups_poll_secs),
            ("messages_poll_secs", self.messages_poll_secs),
            ("conversations_poll_secs", self.conversations_poll_secs),
            ("events_poll_secs", self.events_poll_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ErrorKind::General(format!("{} must be at least 1", name)).into());
            }
        }
        Ok(())
    }

    pub fn profile_poll(&self) -> Duration {
        Duration::from_secs(self.profile_poll_secs)
    }

    pub fn ups_poll(&self) -> Duration {
        Duration::from_secs(self.ups_poll_secs)
    }

    pub fn messages_poll(&self) -> Duration {
        Duration::from_secs(self.messages_poll_secs)
    }

    pub fn conversations_poll(&self) -> Duration {
        Duration::from_secs(self.conversations_poll_secs)
    }

    pub fn events_poll(&self) -> Duration {
        Duration::from_secs(self.events_poll_secs)
    }
}
