use condo_core::stats::{CountQuery, DashboardCounts};
use condo_core::{ChangeEvent, Table};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardState {
    pub counts: DashboardCounts,
    pub loading: bool,
}

/// The four dashboard counters, recomputed on any write to the tables they
/// count.
pub struct DashboardStats {
    state: watch::Receiver<DashboardState>,
    task: JoinHandle<()>,
}

impl DashboardStats {
    pub fn spawn(backend: Arc<dyn Backend>) -> Self {
        let changes = Table::DASHBOARD.map(|table| backend.subscribe(table));
        let (tx, state) = watch::channel(DashboardState {
            counts: DashboardCounts::default(),
            loading: true,
        });
        let task = tokio::spawn(follow_counts(backend, changes, tx));
        Self { state, task }
    }

    pub fn watch(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    pub fn counts(&self) -> DashboardCounts {
        self.state.borrow().counts
    }
}

impl Drop for DashboardStats {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn follow_counts(
    backend: Arc<dyn Backend>,
    changes: [broadcast::Receiver<ChangeEvent>; 4],
    state: watch::Sender<DashboardState>,
) {
    let [mut packages, mut visitors, mut occurrences, mut profiles] = changes;
    recompute(backend.as_ref(), &state).await;
    loop {
        let received = tokio::select! {
            r = packages.recv() => r,
            r = visitors.recv() => r,
            r = occurrences.recv() => r,
            r = profiles.recv() => r,
        };
        if let Err(RecvError::Closed) = received {
            break;
        }
        recompute(backend.as_ref(), &state).await;
    }
}

/// Runs the four counts in parallel and publishes them together. A failed
/// count keeps its previous value.
async fn recompute(backend: &dyn Backend, state: &watch::Sender<DashboardState>) {
    let (pending, residents, visitors, open) = tokio::join!(
        backend.count(CountQuery::PendingPackages),
        backend.count(CountQuery::Residents),
        backend.count(CountQuery::VisitorsToday),
        backend.count(CountQuery::OpenOccurrences),
    );

    let previous = state.borrow().counts;
    let pick = |query: CountQuery, result: Result<u64, _>, last: u64| match result {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Error counting {}: {}", query.as_str(), e);
            last
        }
    };
    let counts = DashboardCounts {
        pending_packages: pick(CountQuery::PendingPackages, pending, previous.pending_packages),
        active_residents: pick(CountQuery::Residents, residents, previous.active_residents),
        visitors_today: pick(CountQuery::VisitorsToday, visitors, previous.visitors_today),
        open_occurrences: pick(CountQuery::OpenOccurrences, open, previous.open_occurrences),
    };
    state.send_replace(DashboardState {
        counts,
        loading: false,
    });
}
