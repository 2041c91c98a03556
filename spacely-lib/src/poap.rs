//! Proof of attendance collections, one per event

use crate::address::Address;
use crate::contracts::{poap, u64_arg, Contracts, EntryFunctionPayload};
use crate::decode::first_vec;
use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintStatus {
    NotStarted,
    Open,
    Paused,
    Ended,
}

impl std::fmt::Display for MintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MintStatus::NotStarted => write!(f, "Not started"),
            MintStatus::Open => write!(f, "Open"),
            MintStatus::Paused => write!(f, "Paused"),
            MintStatus::Ended => write!(f, "Ended"),
        }
    }
}

/// `poap::get_poap_info`, which returns
/// `(name, description, image_uri, start_time, end_time, paused, minted)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoapInfo {
    pub event_id: u64,
    pub name: String,
    pub description: String,
    pub image_uri: String,
    pub start_time: u64,
    pub end_time: u64,
    pub paused: bool,
    pub minted: u64,
}

impl PoapInfo {
    pub fn status(&self, now: u64) -> MintStatus {
        if now >= self.end_time {
            MintStatus::Ended
        } else if self.paused {
            MintStatus::Paused
        } else if now < self.start_time {
            MintStatus::NotStarted
        } else {
            MintStatus::Open
        }
    }
}

/// A new collection, as entered by the event host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCollection {
    pub event_id: u64,
    pub name: String,
    pub description: String,
    pub image_uri: String,
    pub password: String,
    pub start_time: u64,
    pub end_time: u64,
}

fn check_window(start_time: u64, end_time: u64) -> Result<(), Error> {
    if end_time <= start_time {
        return Err(
            ErrorKind::InvalidEvent("Mint end must be after mint start".to_owned()).into(),
        );
    }
    Ok(())
}

impl Contracts {
    pub async fn get_poap_info(&self, event_id: u64) -> Result<PoapInfo, Error> {
        let r = self.view(poap::GET_POAP_INFO, vec![u64_arg(event_id)]).await?;
        Ok(PoapInfo {
            event_id,
            name: r.string(0)?,
            description: r.string(1)?,
            image_uri: r.string(2)?,
            start_time: r.u64(3)?,
            end_time: r.u64(4)?,
            paused: r.bool(5)?,
            minted: r.u64(6)?,
        })
    }

    pub async fn has_poap(&self, event_id: u64, holder: &Address) -> Result<bool, Error> {
        self.view(
            poap::HAS_POAP,
            vec![u64_arg(event_id), json!(holder.as_str())],
        )
        .await?
        .bool(0)
    }

    pub async fn is_paused(&self, event_id: u64) -> Result<bool, Error> {
        self.view(poap::IS_PAUSED, vec![u64_arg(event_id)])
            .await?
            .bool(0)
    }

    pub async fn get_holders(&self, event_id: u64) -> Result<Vec<Address>, Error> {
        let r = self.view(poap::GET_HOLDERS, vec![u64_arg(event_id)]).await?;
        first_vec(&r.into_inner())
    }

    /// Check a mint password before spending gas on a mint that would abort
    pub async fn verify_password(&self, event_id: u64, password: &str) -> Result<bool, Error> {
        self.view(
            poap::VERIFY_PASSWORD,
            vec![u64_arg(event_id), json!(password)],
        )
        .await?
        .bool(0)
    }

    pub fn create_collection_payload(
        &self,
        c: &NewCollection,
    ) -> Result<EntryFunctionPayload, Error> {
        let name = c.name.trim();
        if name.is_empty() {
            return Err(ErrorKind::InvalidEvent("Collection name is required".to_owned()).into());
        }
        if c.password.is_empty() {
            return Err(ErrorKind::InvalidEvent("A mint password is required".to_owned()).into());
        }
        check_window(c.start_time, c.end_time)?;
        Ok(self.payload(
            poap::CREATE_COLLECTION,
            vec![
                u64_arg(c.event_id),
                json!(name),
                json!(c.description.trim()),
                json!(c.image_uri.trim()),
                json!(c.password),
                u64_arg(c.start_time),
                u64_arg(c.end_time),
            ],
        ))
    }

    pub fn mint_poap_payload(
        &self,
        event_id: u64,
        password: &str,
    ) -> Result<EntryFunctionPayload, Error> {
        if password.is_empty() {
            return Err(ErrorKind::Empty("Password".to_owned()).into());
        }
        Ok(self.payload(poap::MINT_POAP, vec![u64_arg(event_id), json!(password)]))
    }

    pub fn set_paused_payload(&self, event_id: u64, paused: bool) -> EntryFunctionPayload {
        self.payload(poap::SET_PAUSED, vec![u64_arg(event_id), json!(paused)])
    }

    pub fn update_time_payload(
        &self,
        event_id: u64,
        start_time: u64,
        end_time: u64,
    ) -> Result<EntryFunctionPayload, Error> {
        check_window(start_time, end_time)?;
        Ok(self.payload(
            poap::UPDATE_TIME,
            vec![u64_arg(event_id), u64_arg(start_time), u64_arg(end_time)],
        ))
    }

    pub fn end_mint_payload(&self, event_id: u64) -> EntryFunctionPayload {
        self.payload(poap::END_MINT, vec![u64_arg(event_id)])
    }

    pub fn initialize_poap_payload(&self) -> EntryFunctionPayload {
        self.payload(poap::INITIALIZE_MODULE, vec![])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::people::test::{alice, MockChain};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_poap_views() {
        let chain = Arc::new(MockChain::default());
        chain.answer(
            "poap::get_poap_info",
            vec![
                json!("Meetup"),
                json!("first one"),
                json!("ipfs://img"),
                json!("100"),
                json!("200"),
                json!(false),
                json!("7"),
            ],
        );
        chain.answer("poap::get_holders", vec![json!(["0xa11ce"])]);
        chain.answer("poap::has_poap", vec![json!(true)]);
        chain.answer("poap::verify_password", vec![json!(false)]);
        let contracts = chain.contracts();

        let info = contracts.get_poap_info(4).await.unwrap();
        assert_eq!(info.name, "Meetup");
        assert_eq!(info.minted, 7);
        assert_eq!(info.status(50), MintStatus::NotStarted);
        assert_eq!(info.status(150), MintStatus::Open);
        assert_eq!(info.status(200), MintStatus::Ended);

        assert_eq!(contracts.get_holders(4).await.unwrap(), vec![alice()]);
        assert!(contracts.has_poap(4, &alice()).await.unwrap());
        assert!(!contracts.verify_password(4, "nope").await.unwrap());

        let calls = chain.calls.lock();
        assert_eq!(calls[0].arguments, vec![json!("4")]);
        assert_eq!(calls[2].arguments, vec![json!("4"), json!(alice().as_str())]);
    }

    #[test]
    fn test_paused_status() {
        let info = PoapInfo {
            event_id: 1,
            name: "x".to_owned(),
            description: String::new(),
            image_uri: String::new(),
            start_time: 100,
            end_time: 200,
            paused: true,
            minted: 0,
        };
        assert_eq!(info.status(150), MintStatus::Paused);
        assert_eq!(info.status(250), MintStatus::Ended);
    }

    #[test]
    fn test_poap_payloads() {
        let contracts = Arc::new(MockChain::default()).contracts();
        let mut c = NewCollection {
            event_id: 3,
            name: "Meetup".to_owned(),
            password: "hunter2".to_owned(),
            start_time: 10,
            end_time: 20,
            ..Default::default()
        };
        let payload = contracts.create_collection_payload(&c).unwrap();
        assert_eq!(payload.function(), "0x1::poap::create_collection");
        assert_eq!(payload.arguments().len(), 7);

        c.end_time = 10;
        assert!(contracts.create_collection_payload(&c).is_err());
        assert!(contracts.update_time_payload(3, 20, 10).is_err());
        assert!(contracts.mint_poap_payload(3, "").is_err());
        assert_eq!(
            contracts.set_paused_payload(3, true).arguments(),
            &[json!("3"), json!(true)]
        );
    }
}
