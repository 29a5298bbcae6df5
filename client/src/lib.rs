//! Realtime client for the condominium API: session resolution, live table
//! views, dashboard counters and the write forms, over an injected
//! [`Backend`].

pub mod backend;
pub mod config;
pub mod error;
pub mod forms;
pub mod http_backend;
pub mod live_table;
pub mod notify;
pub mod session;
pub mod stats;

pub use backend::{Backend, ChangeHub, Identity};
pub use config::ClientConfig;
pub use error::ClientError;
pub use forms::Forms;
pub use http_backend::HttpBackend;
pub use live_table::{LiveTable, TableState};
pub use notify::Toast;
pub use session::{SessionState, SessionStore};
pub use stats::DashboardStats;
