use tokio::sync::watch;
use tokio_util::sync::DropGuard;

use super::view::Snapshot;

/// Handle to a standing view query.
///
/// Holds the latest snapshot and wakes on each re-evaluation. Dropping the
/// handle cancels the evaluation task.
pub struct Subscription {
    pub(super) snapshots: watch::Receiver<Option<Snapshot>>,
    pub(super) _guard: DropGuard,
}

impl Subscription {
    /// Wait for the next snapshot. Intermediate snapshots a slow reader
    /// missed are skipped. Returns `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Snapshot> {
        loop {
            self.snapshots.changed().await.ok()?;
            if let Some(snapshot) = self.snapshots.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }
}
