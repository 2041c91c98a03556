use crate::address::Address;
use crate::contracts::Contracts;
use crate::RunState;
use crate::GLOBALS;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

const TICK: u64 = 500;

pub(crate) fn start_background_tasks() {
    tracing::info!("Starting general background tasks");

    tokio::task::spawn(async move {
        let mut read_runstate = GLOBALS.read_runstate.clone();
        read_runstate.mark_unchanged();
        if *read_runstate.borrow() == RunState::ShuttingDown {
            return;
        }

        let sleep_future = tokio::time::sleep(Duration::from_millis(TICK));
        tokio::pin!(sleep_future);
        let mut tick: usize = 0;

        loop {
            tokio::select! {
                _ = &mut sleep_future => {
                    sleep_future.as_mut().reset(Instant::now() + Duration::from_millis(TICK))
                },
                _ = read_runstate.wait_for(|runstate| *runstate == RunState::ShuttingDown) => break,
            }

            tick += 1;

            if *read_runstate.borrow() == RunState::Online {
                do_online_tasks(tick).await;
            }

            do_debug_tasks(tick).await;
        }

        tracing::info!("Stopping general background tasks");
    });
}

async fn do_online_tasks(tick: usize) {
    // Update GLOBALS.unread_dms on the first tick, then every 20 ticks
    if tick == 1 || tick % 20 == 0 {
        let account = GLOBALS.account.read().clone();
        if let (Some(account), Ok(contracts)) = (account, GLOBALS.contracts()) {
            update_unread_dms(contracts, &account, &GLOBALS.unread_dms).await;
        }
    }
}

async fn update_unread_dms(
    contracts: &Contracts,
    account: &Address,
    unread: &watch::Sender<Option<usize>>,
) {
    match contracts.get_unread_count(account).await {
        Ok(n) => {
            let n = usize::try_from(n).unwrap_or(usize::MAX);
            unread.send_if_modified(|current| {
                let changed = *current != Some(n);
                *current = Some(n);
                changed
            });
        }
        Err(e) if e.is_transient() => tracing::warn!("Unread count: {}", e),
        Err(e) => GLOBALS.status_error("Could not read unread messages", &e),
    }
}

async fn do_debug_tasks(tick: usize) {
    if tick % 20 == 0 {
        if let Ok(gateway) = GLOBALS.gateway() {
            tracing::debug!(target: "view", "DEBUG VIEW STATS: {}", gateway.stats());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::people::test::{alice, MockChain};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_update_unread_dms() {
        let chain = Arc::new(MockChain::default());
        let contracts = chain.contracts();
        let (unread, mut watcher) = watch::channel(None);

        chain.answer("chat::get_unread_count", vec![json!("3")]);
        update_unread_dms(&contracts, &alice(), &unread).await;
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), Some(3));

        // The same count again wakes nobody
        update_unread_dms(&contracts, &alice(), &unread).await;
        assert!(!watcher.has_changed().unwrap());

        // A failed read keeps the last count
        chain.reject("chat::get_unread_count", 503);
        update_unread_dms(&contracts, &alice(), &unread).await;
        assert_eq!(*watcher.borrow(), Some(3));

        chain.reject("chat::get_unread_count", 400);
        update_unread_dms(&contracts, &alice(), &unread).await;
        assert_eq!(*watcher.borrow(), Some(3));
        assert!(GLOBALS
            .status_queue
            .read()
            .read_all()
            .iter()
            .any(|m| m.text.starts_with("Could not read unread messages")));

        let calls = chain.calls.lock();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].function, "0x1::chat::get_unread_count");
        assert_eq!(calls[0].arguments, vec![json!(alice().as_str())]);
    }
}
