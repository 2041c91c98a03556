//! A connected wallet and what it can do: the registration check on connect,
//! its contact list, and submitting transactions on its behalf.

use crate::address::Address;
use crate::contacts::{lookup_contact, Contact};
use crate::contracts::{Contracts, EntryFunctionPayload};
use crate::error::{Error, ErrorKind};
use crate::people::PictureCache;
use crate::storage::Storage;
use crate::ups::{parse_move_amount, parse_stars_amount};
use crate::wallet::{AccountInfo, TxHash, WalletBridge};
use std::sync::Arc;

/// The outcome of connecting a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connected {
    pub account: AccountInfo,
    pub has_profile: bool,
}

pub struct Session {
    bridge: WalletBridge,
    contracts: Contracts,
    storage: Storage,
    pictures: Arc<PictureCache>,
}

impl Session {
    pub fn new(
        bridge: WalletBridge,
        contracts: Contracts,
        storage: Storage,
        pictures: Arc<PictureCache>,
    ) -> Session {
        Session {
            bridge,
            contracts,
            storage,
            pictures,
        }
    }

    pub fn bridge(&self) -> &WalletBridge {
        &self.bridge
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    /// The connected account's address
    pub fn address(&self) -> Option<Address> {
        self.bridge.account().map(|a| a.address)
    }

    fn owner(&self) -> Result<Address, Error> {
        self.address()
            .ok_or_else(|| ErrorKind::AccountNotConnected.into())
    }

    /// Connect a wallet by name and check whether its account has a profile.
    /// Without one, registration is marked pending until a profile is created
    /// or the wallet disconnects.
    pub async fn connect(&self, wallet_name: &str) -> Result<Connected, Error> {
        let account = self.bridge.connect(wallet_name).await?;

        let has_profile = match self.contracts.has_profile(&account.address).await {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Checking profile of {}: {}", account.address, e);
                false
            }
        };

        if !has_profile {
            tracing::info!("{} has no profile yet", account.address);
        }
        self.storage
            .set_flag_registration_pending(!has_profile, None)?;

        Ok(Connected {
            account,
            has_profile,
        })
    }

    pub async fn disconnect(&self) -> Result<(), Error> {
        self.bridge.disconnect().await?;
        self.storage.set_flag_registration_pending(false, None)?;
        Ok(())
    }

    /// Whether the user still owes us a profile. Only meaningful while connected.
    pub fn registration_pending(&self) -> bool {
        self.bridge.account().is_some() && self.storage.get_flag_registration_pending()
    }

    pub async fn create_profile(
        &self,
        username: &str,
        twitter: &str,
        pfp: &str,
    ) -> Result<TxHash, Error> {
        self.owner()?;
        let payload = self
            .contracts
            .create_profile_payload(username, twitter, pfp)?;
        let hash = self.submit(&payload).await?;
        self.storage.set_flag_registration_pending(false, None)?;
        Ok(hash)
    }

    /// Sign and submit through the connected wallet
    pub async fn submit(&self, payload: &EntryFunctionPayload) -> Result<TxHash, Error> {
        self.bridge.sign_and_submit(payload).await
    }

    pub fn contacts(&self) -> Result<Vec<Contact>, Error> {
        self.storage.get_contacts(&self.owner()?)
    }

    /// Add someone to the connected account's contacts, with their username
    /// and picture if they have a profile
    pub async fn add_contact(&self, address: &Address) -> Result<Vec<Contact>, Error> {
        let owner = self.owner()?;
        if *address == owner {
            return Err(ErrorKind::InvalidAddress("You cannot add yourself".to_owned()).into());
        }

        let contact = lookup_contact(&self.contracts, &self.pictures, address).await;
        self.storage.add_contact(&owner, contact)
    }

    pub fn remove_contact(&self, address: &Address) -> Result<Vec<Contact>, Error> {
        self.storage.remove_contact(&self.owner()?, address)
    }

    pub async fn send_direct_message(&self, to: &Address, text: &str) -> Result<TxHash, Error> {
        self.owner()?;
        let payload = self.contracts.send_direct_message_payload(to, text)?;
        self.submit(&payload).await
    }

    pub async fn post_message(&self, text: &str, anonymous: bool) -> Result<TxHash, Error> {
        self.owner()?;
        let payload = if anonymous {
            self.contracts.post_anonymous_payload(text)?
        } else {
            self.contracts.post_message_payload(text)?
        };
        self.submit(&payload).await
    }

    pub async fn claim_daily(&self) -> Result<TxHash, Error> {
        self.owner()?;
        self.submit(&self.contracts.claim_daily_payload()).await
    }

    /// Send stars, typed as a whole number
    pub async fn send_stars(&self, to: &Address, amount: &str) -> Result<TxHash, Error> {
        self.owner()?;
        let amount = parse_stars_amount(amount)?;
        let payload = self.contracts.send_ups_payload(to, amount)?;
        self.submit(&payload).await
    }

    /// Send MOVE, typed as a decimal amount
    pub async fn transfer(&self, to: &Address, amount: &str) -> Result<TxHash, Error> {
        self.owner()?;
        let octas = parse_move_amount(amount)?;
        let payload = self.contracts.transfer_tokens_payload(to, octas)?;
        self.submit(&payload).await
    }
}
