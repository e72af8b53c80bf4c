//! Live queries: standing per-view subscriptions over the store.
//!
//! A [`Subscription`] subscribes to the store's change feed before its first
//! evaluation, so no write between "read" and "listen" is missed. Every
//! relevant change triggers a full re-evaluation of the view and the whole
//! [`Snapshot`] replaces the previous one. Changes that queue up while an
//! evaluation runs are coalesced into a single re-evaluation.
//!
//! Subscriptions are released when their handle is dropped, or all at once
//! through [`LiveQueries::shutdown`].

mod subscription;
mod view;

use std::sync::Arc;

use curbside_db::{SharedStore, StoreChange};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

pub use subscription::Subscription;
pub use view::{RequestView, Snapshot, ViewScope};

/// Factory for live subscriptions against one store.
pub struct LiveQueries {
    store: SharedStore,
    shutdown: CancellationToken,
    /// One clone per running evaluation task.
    alive: Arc<()>,
}

impl LiveQueries {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            shutdown: CancellationToken::new(),
            alive: Arc::new(()),
        }
    }

    /// Open a standing query for `scope`. Must be called inside a tokio
    /// runtime. The first snapshot arrives through [`Subscription::next`].
    pub fn subscribe(&self, scope: ViewScope) -> Subscription {
        let feed = self.store.changes();
        let (tx, rx) = watch::channel(None);
        let cancel = self.shutdown.child_token();

        tokio::spawn(evaluate(
            self.store.clone(),
            scope,
            feed,
            tx,
            cancel.clone(),
            Arc::clone(&self.alive),
        ));
        tracing::debug!(?scope, "Live subscription opened");

        Subscription {
            snapshots: rx,
            _guard: cancel.drop_guard(),
        }
    }

    /// Number of evaluation tasks still running.
    pub fn active(&self) -> usize {
        Arc::strong_count(&self.alive) - 1
    }

    /// Cancel every subscription.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn evaluate(
    store: SharedStore,
    scope: ViewScope,
    mut feed: broadcast::Receiver<StoreChange>,
    tx: watch::Sender<Option<Snapshot>>,
    cancel: CancellationToken,
    _alive: Arc<()>,
) {
    if !deliver(&store, scope, &tx).await {
        return;
    }

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = feed.recv() => received,
        };

        let mut dirty = match received {
            Ok(change) => scope.watches(change),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!(?scope, skipped = n, "Change feed lagged, re-evaluating");
                true
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let mut closed = false;
        loop {
            match feed.try_recv() {
                Ok(change) => dirty |= scope.watches(change),
                Err(broadcast::error::TryRecvError::Lagged(_)) => dirty = true,
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Closed) => {
                    closed = true;
                    break;
                }
            }
        }

        if dirty && !deliver(&store, scope, &tx).await {
            break;
        }
        if closed {
            break;
        }
    }

    tracing::debug!(?scope, "Live subscription released");
}

/// Evaluate and publish one snapshot. Returns `false` once nobody is
/// listening any more.
async fn deliver(
    store: &SharedStore,
    scope: ViewScope,
    tx: &watch::Sender<Option<Snapshot>>,
) -> bool {
    match scope.project(store.as_ref()).await {
        Ok(snapshot) => tx.send(Some(snapshot)).is_ok(),
        Err(e) => {
            tracing::warn!(?scope, error = %e, "Live view evaluation failed");
            !tx.is_closed()
        }
    }
}
