use crate::address::Address;
use crate::contacts::Contact;
use crate::error::Error;
use crate::storage::Storage;
use heed::{RoTxn, RwTxn};

// Address -> Vec<Contact>
//   key: owner.as_str().as_bytes()
//   val: serde_json::to_vec(contacts) | serde_json::from_slice(val)

impl Storage {
    pub(crate) fn write_contacts1<'a>(
        &'a self,
        owner: &Address,
        contacts: &[Contact],
        rw_txn: Option<&mut RwTxn<'a>>,
    ) -> Result<(), Error> {
        let key = owner.as_str().as_bytes();
        let bytes = serde_json::to_vec(contacts)?;

        let f = |txn: &mut RwTxn<'a>| -> Result<(), Error> {
            self.contacts.put(txn, key, &bytes)?;
            Ok(())
        };

        write_transact!(self, rw_txn, f)
    }

    pub(crate) fn read_contacts1(&self, owner: &Address) -> Result<Vec<Contact>, Error> {
        let txn = self.env.read_txn()?;
        self.read_contacts1_txn(owner, &txn)
    }

    pub(crate) fn read_contacts1_txn(
        &self,
        owner: &Address,
        txn: &RoTxn<'_>,
    ) -> Result<Vec<Contact>, Error> {
        let key = owner.as_str().as_bytes();
        Ok(match self.contacts.get(txn, key)? {
            Some(bytes) => serde_json::from_slice(bytes)?,
            None => vec![],
        })
    }
}
