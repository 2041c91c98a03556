use crate::address::Address;
use crate::chat::Chat;
use crate::contracts::Contracts;
use crate::error::{Error, ErrorKind};
use crate::indexer::Indexer;
use crate::people::{People, PictureCache};
use crate::space::Events;
use crate::status::StatusQueue;
use crate::storage::Storage;
use crate::ups::Ups;
use crate::view::ViewGateway;
use crate::RunState;
use parking_lot::RwLock as PRwLock;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// Global data shared between threads. Access via the static ref `GLOBALS`.
pub struct Globals {
    /// This is a watch channel for making changes to the RunState.
    pub write_runstate: watch::Sender<RunState>,

    /// This is a watch channel for watching for changes to the RunState.
    ///
    /// Synchronous code can `borrow()` and dereference to see the current Runstate.
    pub read_runstate: watch::Receiver<RunState>,

    /// LMDB storage, set up by `init()`
    pub storage: OnceLock<Storage>,

    /// The view gateway, shared so its stats and sinbin are global
    pub gateway: OnceLock<Arc<ViewGateway>>,

    pub contracts: OnceLock<Contracts>,

    /// `None` if the indexer is turned off
    pub indexer: OnceLock<Option<Indexer>>,

    pub people: OnceLock<People>,
    pub chat: OnceLock<Chat>,
    pub events: OnceLock<Events>,
    pub ups: OnceLock<Ups>,

    /// Profile pictures seen so far this run
    pub pictures: Arc<PictureCache>,

    /// Status messages for the user
    pub status_queue: PRwLock<StatusQueue>,

    /// The account we act as, if any
    pub account: PRwLock<Option<Address>>,

    /// Unread direct messages of that account, `None` until first read
    pub unread_dms: watch::Sender<Option<usize>>,
}

lazy_static! {
    /// A static reference to global data shared between threads.
    pub static ref GLOBALS: Globals = {
        // We start in the Initializing state
        let (write_runstate, read_runstate) = watch::channel(RunState::Initializing);

        Globals {
            write_runstate,
            read_runstate,
            storage: OnceLock::new(),
            gateway: OnceLock::new(),
            contracts: OnceLock::new(),
            indexer: OnceLock::new(),
            people: OnceLock::new(),
            chat: OnceLock::new(),
            events: OnceLock::new(),
            ups: OnceLock::new(),
            pictures: Arc::new(PictureCache::new()),
            status_queue: PRwLock::new(StatusQueue::new(
                "Welcome to Spacely. Status messages will appear here.".to_owned()
            )),
            account: PRwLock::new(None),
            unread_dms: watch::channel(None).0,
        }
    };
}

fn get<'a, T>(cell: &'a OnceLock<T>, what: &'static str) -> Result<&'a T, Error> {
    cell.get()
        .ok_or_else(|| ErrorKind::NotInitialized(what).into())
}

impl Globals {
    pub fn db(&self) -> Result<&Storage, Error> {
        get(&self.storage, "Storage")
    }

    pub fn gateway(&self) -> Result<&Arc<ViewGateway>, Error> {
        get(&self.gateway, "View gateway")
    }

    pub fn contracts(&self) -> Result<&Contracts, Error> {
        get(&self.contracts, "Contracts")
    }

    /// The indexer, if it is set up and turned on
    pub fn indexer(&self) -> Option<&Indexer> {
        self.indexer.get().and_then(|i| i.as_ref())
    }

    pub fn people(&self) -> Result<&People, Error> {
        get(&self.people, "People")
    }

    pub fn chat(&self) -> Result<&Chat, Error> {
        get(&self.chat, "Chat")
    }

    pub fn events(&self) -> Result<&Events, Error> {
        get(&self.events, "Events")
    }

    pub fn ups(&self) -> Result<&Ups, Error> {
        get(&self.ups, "Ups")
    }

    /// Tell the user something through the status queue
    pub fn status(&self, text: String) {
        tracing::info!("{}", text);
        self.status_queue.write().write(text);
    }

    /// Report a failure through the status queue
    pub fn status_error(&self, context: &str, e: &Error) {
        let text = match &e.kind {
            ErrorKind::Submission(failure) => format!("{}: {}", context, failure.user_message()),
            kind => format!("{}: {}", context, kind),
        };
        tracing::error!("{}", e);
        self.status_queue.write().write(text);
    }
}
