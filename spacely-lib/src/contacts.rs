use crate::address::Address;
use crate::contracts::Contracts;
use crate::error::Error;
use crate::misc::now_secs;
use crate::people::PictureCache;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};

/// Someone a wallet owner wants to keep handy for direct messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub address: Address,
    pub username: Option<String>,
    pub pfp: Option<String>,
    /// unix seconds
    pub added_at: u64,
}

impl Contact {
    /// What to show for this contact
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.address.short(),
        }
    }
}

/// Add or update a contact. An address already in the list keeps its
/// original `added_at` and position, but takes the new username and picture.
pub fn upsert(list: &mut Vec<Contact>, contact: Contact) {
    match list.iter_mut().find(|c| c.address == contact.address) {
        Some(existing) => {
            existing.username = contact.username;
            existing.pfp = contact.pfp;
        }
        None => list.push(contact),
    }
}

/// Remove a contact by address. Returns whether anything was removed.
pub fn remove(list: &mut Vec<Contact>, address: &Address) -> bool {
    let before = list.len();
    list.retain(|c| &c.address != address);
    list.len() != before
}

/// A contact for `address`, named and pictured from their profile if they
/// have one
pub async fn lookup_contact(
    contracts: &Contracts,
    pictures: &PictureCache,
    address: &Address,
) -> Contact {
    let (username, pfp) = match contracts.get_profile(address).await {
        Ok(person) => {
            pictures.insert(address, &person.pfp);
            (Some(person.username.clone()), person.pfp().map(|s| s.to_owned()))
        }
        Err(e) => {
            tracing::warn!("No profile for contact {}: {}", address, e);
            (None, pictures.get(address))
        }
    };
    Contact {
        address: address.clone(),
        username,
        pfp,
        added_at: now_secs(),
    }
}

impl Storage {
    /// The contact list of `owner`
    pub fn get_contacts(&self, owner: &Address) -> Result<Vec<Contact>, Error> {
        self.read_contacts1(owner)
    }

    /// Add or update a contact in `owner`'s list, returning the new list
    pub fn add_contact(&self, owner: &Address, contact: Contact) -> Result<Vec<Contact>, Error> {
        let mut txn = self.get_write_txn()?;
        let mut list = self.read_contacts1_txn(owner, &txn)?;
        upsert(&mut list, contact);
        self.write_contacts1(owner, &list, Some(&mut txn))?;
        txn.commit()?;
        Ok(list)
    }

    /// Remove a contact from `owner`'s list, returning the new list
    pub fn remove_contact(&self, owner: &Address, address: &Address) -> Result<Vec<Contact>, Error> {
        let mut txn = self.get_write_txn()?;
        let mut list = self.read_contacts1_txn(owner, &txn)?;
        if remove(&mut list, address) {
            self.write_contacts1(owner, &list, Some(&mut txn))?;
        }
        txn.commit()?;
        Ok(list)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::people::test::{alice, alice_profile, MockChain};
    use crate::storage::test::temp_storage;
    use std::sync::Arc;

    fn addr(n: u8) -> Address {
        Address::try_from_chain(&format!("0x{:x}", n)).unwrap()
    }

    fn contact(n: u8, name: &str, added_at: u64) -> Contact {
        Contact {
            address: addr(n),
            username: Some(name.to_owned()),
            pfp: None,
            added_at,
        }
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let mut list = vec![];
        upsert(&mut list, contact(1, "alice", 100));
        upsert(&mut list, contact(2, "bob", 200));
        let mut again = contact(1, "alice2", 300);
        again.pfp = Some("https://example.com/a.png".to_owned());
        upsert(&mut list, again);

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].username.as_deref(), Some("alice2"));
        assert_eq!(list[0].pfp.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(list[0].added_at, 100);
        assert_eq!(list[1].username.as_deref(), Some("bob"));
    }

    #[test]
    fn test_remove() {
        let mut list = vec![contact(1, "alice", 1), contact(2, "bob", 2)];
        assert!(remove(&mut list, &addr(1)));
        assert!(!remove(&mut list, &addr(1)));
        assert_eq!(list, vec![contact(2, "bob", 2)]);
    }

    #[test]
    fn test_display_name() {
        let mut c = contact(1, "", 0);
        assert_eq!(c.display_name(), "0x0000...0001");
        c.username = Some("alice".to_owned());
        assert_eq!(c.display_name(), "alice");
    }

    #[test]
    fn test_persisted_per_owner() {
        let (_dir, storage) = temp_storage();
        let owner_a = addr(0xa);
        let owner_b = addr(0xb);

        storage.add_contact(&owner_a, contact(1, "alice", 10)).unwrap();
        storage.add_contact(&owner_a, contact(2, "bob", 20)).unwrap();
        storage.add_contact(&owner_b, contact(3, "carol", 30)).unwrap();
        storage.add_contact(&owner_a, contact(1, "alice!", 40)).unwrap();

        let a = storage.get_contacts(&owner_a).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].username.as_deref(), Some("alice!"));
        assert_eq!(a[0].added_at, 10);
        assert_eq!(storage.get_contacts(&owner_b).unwrap().len(), 1);
        assert!(storage.get_contacts(&addr(0xc)).unwrap().is_empty());

        let a = storage.remove_contact(&owner_a, &addr(2)).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(storage.get_contacts(&owner_a).unwrap(), a);
        assert_eq!(storage.get_contacts_len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lookup_contact() {
        let chain = Arc::new(MockChain::default());
        let contracts = chain.contracts();
        let pictures = PictureCache::new();

        pictures.insert(&alice(), "https://example.com/old.png");
        let c = lookup_contact(&contracts, &pictures, &alice()).await;
        assert_eq!(c.username, None);
        assert_eq!(c.pfp.as_deref(), Some("https://example.com/old.png"));

        chain.answer("profile::get_profile_with_status", alice_profile());
        let c = lookup_contact(&contracts, &pictures, &alice()).await;
        assert_eq!(c.username.as_deref(), Some("alice"));
        assert_eq!(c.pfp, pictures.get(&alice()));
        assert_ne!(c.pfp.as_deref(), Some("https://example.com/old.png"));
    }
}
