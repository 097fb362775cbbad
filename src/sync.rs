use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::account::Account;
use crate::ledger::LedgerClient;

/// Fixed refresh cadence for the dashboard.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Owns the authoritative local account snapshot and keeps it fresh.
///
/// A background task polls the ledger on a fixed interval and forwards raw
/// field maps over a channel; [`AccountSync::pump`] merges them into the
/// snapshot on the caller's side. The task awaits each fetch before sleeping
/// again, so ticks never overlap and merge order is completion order.
///
/// `shutdown` (and `Drop`) abort the task. A fetch that loses the race
/// against teardown has nowhere to write: its send fails on the closed
/// channel and the loop exits.
pub struct AccountSync {
    account: Account,
    updates: mpsc::UnboundedReceiver<Map<String, Value>>,
    poller: JoinHandle<()>,
}

impl AccountSync {
    /// Seed the snapshot and arm the polling loop at the standard interval.
    pub fn start(account: Account, client: LedgerClient) -> Self {
        Self::start_at(account, client, POLL_INTERVAL)
    }

    pub fn start_at(account: Account, client: LedgerClient, interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // The loop is keyed by the id captured here; account ids never change.
        let id = account.id.clone();
        let poller = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match client.fetch(&id).await {
                    Ok(patch) => {
                        if tx.send(patch).is_err() {
                            break;
                        }
                    }
                    // Skip the tick; the prior snapshot stays in force until
                    // the next one.
                    Err(err) => debug!("ledger poll skipped: {err:#}"),
                }
            }
        });

        Self {
            account,
            updates: rx,
            poller,
        }
    }

    /// The latest merged snapshot. Always defined.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Merge any polled updates that have arrived since the last call.
    /// Returns true if the snapshot changed, so the caller knows to redraw.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(patch) = self.updates.try_recv() {
            self.account.merge(patch);
            changed = true;
        }
        changed
    }

    /// Stop polling. No further requests are issued; a tick already in
    /// flight is discarded, never applied.
    pub fn shutdown(&mut self) {
        self.poller.abort();
    }
}

impl Drop for AccountSync {
    fn drop(&mut self) {
        self.poller.abort();
    }
}
