//! The wallet is an external collaborator: it holds keys, signs and submits.
//! We only hand it payloads and read back what it says.

use crate::address::Address;
use crate::contracts::EntryFunctionPayload;
use crate::error::{Error, ErrorKind, TxFailure};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Installed,
    NotDetected,
}

/// What a wallet reports about the connected account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: Address,
    pub public_key: Option<String>,
}

/// A browser-style wallet
#[async_trait]
pub trait Wallet: Send + Sync {
    fn name(&self) -> &str;

    fn ready_state(&self) -> ReadyState;

    async fn connect(&self) -> Result<AccountInfo, Error>;

    async fn disconnect(&self) -> Result<(), Error>;

    /// The connected account, if any
    async fn account(&self) -> Option<AccountInfo>;

    /// Sign and submit. The wallet answers with an object that should carry
    /// `hash` or `transactionHash`. Failures come back as free-form text.
    async fn sign_and_submit_transaction(
        &self,
        payload: &EntryFunctionPayload,
    ) -> Result<Value, String>;
}

/// The hash of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHash(pub String);

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The registry of known wallets and the one that is connected
#[derive(Default)]
pub struct WalletBridge {
    wallets: Vec<Arc<dyn Wallet>>,
    connected: RwLock<Option<(Arc<dyn Wallet>, AccountInfo)>>,
}

impl WalletBridge {
    pub fn new() -> WalletBridge {
        WalletBridge::default()
    }

    pub fn register(&mut self, wallet: Arc<dyn Wallet>) {
        self.wallets.push(wallet);
    }

    /// Installed wallets
    pub fn available(&self) -> Vec<String> {
        self.by_state(ReadyState::Installed)
    }

    /// Wallets we know of that are not installed
    pub fn not_installed(&self) -> Vec<String> {
        self.by_state(ReadyState::NotDetected)
    }

    fn by_state(&self, state: ReadyState) -> Vec<String> {
        self.wallets
            .iter()
            .filter(|w| w.ready_state() == state)
            .map(|w| w.name().to_owned())
            .collect()
    }

    pub async fn connect(&self, name: &str) -> Result<AccountInfo, Error> {
        let wallet = self
            .wallets
            .iter()
            .find(|w| w.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| -> Error { ErrorKind::WalletNotFound(name.to_owned()).into() })?;

        if wallet.ready_state() != ReadyState::Installed {
            return Err(ErrorKind::WalletNotInstalled(wallet.name().to_owned()).into());
        }

        let info = wallet.connect().await?;
        tracing::info!("Connected {} as {}", wallet.name(), info.address);
        *self.connected.write() = Some((wallet, info.clone()));
        Ok(info)
    }

    pub async fn disconnect(&self) -> Result<(), Error> {
        let current = self.connected.write().take();
        if let Some((wallet, info)) = current {
            wallet.disconnect().await?;
            tracing::info!("Disconnected {} ({})", wallet.name(), info.address);
        }
        Ok(())
    }

    pub fn account(&self) -> Option<AccountInfo> {
        self.connected.read().as_ref().map(|(_, info)| info.clone())
    }

    pub fn wallet_name(&self) -> Option<String> {
        self.connected
            .read()
            .as_ref()
            .map(|(w, _)| w.name().to_owned())
    }

    /// Hand a payload to the connected wallet and get the transaction hash
    pub async fn sign_and_submit(&self, payload: &EntryFunctionPayload) -> Result<TxHash, Error> {
        let wallet = match self.connected.read().as_ref() {
            Some((wallet, _)) => wallet.clone(),
            None => return Err(ErrorKind::WalletNotConnected.into()),
        };

        tracing::debug!("Submitting {} via {}", payload.function(), wallet.name());

        let response = wallet
            .sign_and_submit_transaction(payload)
            .await
            .map_err(|message| -> Error {
                ErrorKind::Submission(TxFailure::classify(&message)).into()
            })?;

        let hash = extract_hash(&response)?;
        tracing::info!("Submitted {}: {}", payload.function(), hash);
        Ok(hash)
    }
}

fn extract_hash(response: &Value) -> Result<TxHash, Error> {
    ["hash", "transactionHash"]
        .iter()
        .find_map(|k| response.get(k).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(|s| TxHash(s.to_owned()))
        .ok_or_else(|| ErrorKind::Submission(TxFailure::NoHash).into())
}
