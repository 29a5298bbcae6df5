//! Domain model shared by the condominium backend and its realtime client.

pub mod access;
pub mod error;
pub mod listing;
pub mod mutation;
pub mod session;
pub mod stats;
pub mod table;
pub mod types;

pub use access::{Capability, Route, RouteAccess};
pub use error::{DomainError, DomainResult};
pub use table::{ChangeEvent, ChangeKind, Table};
pub use types::Role;
