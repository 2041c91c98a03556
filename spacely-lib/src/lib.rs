//! Client library for the Spacely contracts on the Movement network:
//! profiles, events, chat, POAPs and UPS (stars).
//!
//! Chain reads go through the view gateway and are decoded into typed values.
//! Writes are built as entry function payloads and handed to a wallet.

#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::uninlined_format_args)]

pub mod address;
pub mod chat;
pub mod contacts;
pub mod contracts;
pub mod decode;
mod error;
pub mod globals;
pub mod indexer;
pub mod misc;
pub mod people;
pub mod poap;
pub mod poller;
mod profile;
pub mod session;
pub mod settings;
pub mod space;
pub mod status;
pub mod storage;
mod tasks;
pub mod ups;
pub mod view;
pub mod wallet;

#[macro_use]
extern crate lazy_static;

pub use address::Address;
pub use contracts::{Contracts, EntryFunction, EntryFunctionPayload};
pub use error::{Error, ErrorKind, TxFailure};
pub use globals::{Globals, GLOBALS};
pub use profile::Profile;
pub use settings::Settings;
pub use storage::Storage;

use indexer::{HttpGraphql, Indexer};
use people::People;
use std::sync::Arc;
use std::time::Duration;
use view::{ViewGateway, ViewGatewayConfig};

pub const USER_AGENT: &str = concat!("spacely/", env!("CARGO_PKG_VERSION"));

/// The state that the program is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    Offline,
    Online,
    ShuttingDown,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Initializing => write!(f, "Initializing"),
            RunState::Offline => write!(f, "Offline"),
            RunState::Online => write!(f, "Online"),
            RunState::ShuttingDown => write!(f, "Shutting Down"),
        }
    }
}

/// Initialize the library: open storage for the current profile and set up
/// the gateway, contracts, indexer and pollers from the stored settings.
pub fn init() -> Result<(), Error> {
    let profile = Profile::current()?;
    tracing::debug!("Using profile directory {}", profile.profile_dir.display());
    let storage = Storage::open(&profile.lmdb_dir)?;
    init_with_storage(storage)
}

/// Like `init`, but with storage that is already open
pub fn init_with_storage(storage: Storage) -> Result<(), Error> {
    let settings = Settings::load(&storage);

    let gateway = Arc::new(ViewGateway::new(ViewGatewayConfig::from_storage(&storage))?);
    let contracts = Contracts::new(gateway.clone(), &settings.module_address);

    let indexer = if settings.use_indexer && !settings.offline {
        let graphql = HttpGraphql::new(
            &settings.indexer_url,
            Duration::from_secs(settings.view_timeout_sec),
            settings.set_user_agent,
        )?;
        Some(Indexer::new(Arc::new(graphql)))
    } else {
        None
    };

    let runstate = GLOBALS.read_runstate.clone();
    let people = People::new(
        contracts.clone(),
        GLOBALS.pictures.clone(),
        settings.profile_poll(),
        runstate.clone(),
    );
    let chat = chat::Chat::new(
        contracts.clone(),
        indexer.clone(),
        settings.messages_poll(),
        settings.conversations_poll(),
        runstate.clone(),
    );
    let events = space::Events::new(contracts.clone(), settings.events_poll(), runstate.clone());
    let ups = ups::Ups::new(contracts.clone(), settings.ups_poll(), runstate);

    let already = || -> Error { ErrorKind::Internal("init called twice".to_owned()).into() };
    GLOBALS.storage.set(storage).map_err(|_| already())?;
    GLOBALS.gateway.set(gateway).map_err(|_| already())?;
    GLOBALS.contracts.set(contracts).map_err(|_| already())?;
    GLOBALS.indexer.set(indexer).map_err(|_| already())?;
    GLOBALS.people.set(people).map_err(|_| already())?;
    GLOBALS.chat.set(chat).map_err(|_| already())?;
    GLOBALS.events.set(events).map_err(|_| already())?;
    GLOBALS.ups.set(ups).map_err(|_| already())?;

    Ok(())
}

/// Act as this account for background work such as the unread count
pub fn set_account(account: Option<Address>) {
    let mut current = GLOBALS.account.write();
    if *current != account {
        GLOBALS.unread_dms.send_replace(None);
    }
    *current = account;
}

/// Run the background tasks until shutdown is requested
pub async fn run() {
    let offline = match GLOBALS.db() {
        Ok(storage) => storage.read_setting_offline(),
        Err(e) => {
            tracing::error!("{}", e);
            return;
        }
    };
    let _ = GLOBALS.write_runstate.send(if offline {
        RunState::Offline
    } else {
        RunState::Online
    });

    tasks::start_background_tasks();

    let mut read_runstate = GLOBALS.read_runstate.clone();
    let _ = read_runstate
        .wait_for(|runstate| *runstate == RunState::ShuttingDown)
        .await;
}

/// Stop background tasks and pollers, and flush storage
pub fn shutdown() -> Result<(), Error> {
    let _ = GLOBALS.write_runstate.send(RunState::ShuttingDown);

    if let Ok(storage) = GLOBALS.db() {
        storage.sync()?;
    }

    tracing::info!("Spacely shutdown complete");
    Ok(())
}
