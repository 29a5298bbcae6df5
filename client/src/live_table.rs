//! Live view of one table: a full read, then another full read on every
//! change event for that table or a table its rows are built from.

use condo_core::listing::OrderBy;
use condo_core::{ChangeEvent, Table};
use futures_util::future::select_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub struct TableState<T> {
    pub rows: Vec<T>,
    /// Set until the first read completes.
    pub loading: bool,
}

pub struct LiveTable<T = Value> {
    table: Table,
    state: watch::Receiver<TableState<T>>,
    task: JoinHandle<()>,
}

impl<T> LiveTable<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn spawn(backend: Arc<dyn Backend>, table: Table, order: OrderBy) -> Self {
        // Subscribe before the first read so no write falls in between.
        let changes = table
            .related()
            .iter()
            .map(|related| backend.subscribe(*related))
            .collect();
        let (tx, state) = watch::channel(TableState {
            rows: Vec::new(),
            loading: true,
        });
        let task = tokio::spawn(follow_table(backend, table, order, changes, tx));
        Self { table, state, task }
    }

    /// Newest first on the table's usual timestamp column.
    pub fn newest_first(backend: Arc<dyn Backend>, table: Table) -> Self {
        Self::spawn(backend, table, OrderBy::default_for(table))
    }
}

impl<T> LiveTable<T> {
    pub fn table(&self) -> Table {
        self.table
    }

    pub fn watch(&self) -> watch::Receiver<TableState<T>> {
        self.state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn rows(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.state.borrow().rows.clone()
    }
}

impl<T> Drop for LiveTable<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn follow_table<T: DeserializeOwned>(
    backend: Arc<dyn Backend>,
    table: Table,
    order: OrderBy,
    mut changes: Vec<broadcast::Receiver<ChangeEvent>>,
    state: watch::Sender<TableState<T>>,
) {
    refetch(backend.as_ref(), table, &order, &state).await;
    loop {
        let (received, _, _) = select_all(changes.iter_mut().map(|rx| Box::pin(rx.recv()))).await;
        match received {
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("{} view skipped {} change events", table, skipped);
            }
            Err(RecvError::Closed) => break,
        }
        refetch(backend.as_ref(), table, &order, &state).await;
    }
}

/// A failed read keeps the rows of the last successful one.
async fn refetch<T: DeserializeOwned>(
    backend: &dyn Backend,
    table: Table,
    order: &OrderBy,
    state: &watch::Sender<TableState<T>>,
) {
    match read_rows(backend, table, order).await {
        Ok(rows) => {
            state.send_replace(TableState { rows, loading: false });
        }
        Err(e) => {
            tracing::error!("Error fetching {}: {}", table, e);
            state.send_modify(|s| s.loading = false);
        }
    }
}

async fn read_rows<T: DeserializeOwned>(
    backend: &dyn Backend,
    table: Table,
    order: &OrderBy,
) -> Result<Vec<T>, ClientError> {
    backend
        .fetch_rows(table, order)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(ClientError::from))
        .collect()
}
