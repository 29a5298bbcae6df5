//! Logical tables and the change events published for them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    UserRoles,
    Packages,
    Visitors,
    Reservations,
    Notices,
    Occurrences,
    OccurrenceEvents,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::Profiles,
        Table::UserRoles,
        Table::Packages,
        Table::Visitors,
        Table::Reservations,
        Table::Notices,
        Table::Occurrences,
        Table::OccurrenceEvents,
    ];

    /// Tables whose writes change the dashboard counters.
    pub const DASHBOARD: [Table; 4] = [
        Table::Packages,
        Table::Visitors,
        Table::Occurrences,
        Table::Profiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::UserRoles => "user_roles",
            Table::Packages => "packages",
            Table::Visitors => "visitors",
            Table::Reservations => "reservations",
            Table::Notices => "notices",
            Table::Occurrences => "occurrences",
            Table::OccurrenceEvents => "occurrence_events",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        Table::ALL
            .into_iter()
            .find(|t| t.as_str() == value)
            .ok_or_else(|| DomainError::InvalidValue {
                field: "table",
                value: value.to_string(),
            })
    }

    /// Key prefix of rows of this table in the single DynamoDB table.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Table::Profiles => "PROFILE#",
            Table::UserRoles => "ROLE#",
            Table::Packages => "PACKAGE#",
            Table::Visitors => "VISITOR#",
            Table::Reservations => "RESERVATION#",
            Table::Notices => "NOTICE#",
            Table::Occurrences => "OCCURRENCE#",
            Table::OccurrenceEvents => "EVENT#",
        }
    }

    /// Tables whose writes change the rows read from this one. Occurrence
    /// rows embed their timeline, which lives in `occurrence_events`.
    pub fn related(&self) -> &'static [Table] {
        match self {
            Table::Occurrences => &[Table::Occurrences, Table::OccurrenceEvents],
            Table::Profiles => &[Table::Profiles],
            Table::UserRoles => &[Table::UserRoles],
            Table::Packages => &[Table::Packages],
            Table::Visitors => &[Table::Visitors],
            Table::Reservations => &[Table::Reservations],
            Table::Notices => &[Table::Notices],
            Table::OccurrenceEvents => &[Table::OccurrenceEvents],
        }
    }

    /// Default ordering column used by list views.
    pub fn default_order(&self) -> &'static str {
        match self {
            Table::Packages => "received_at",
            Table::Visitors => "entry_at",
            Table::Reservations => "date",
            _ => "created_at",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Maps DynamoDB stream event names.
    pub fn from_stream(event_name: &str) -> Option<Self> {
        match event_name {
            "INSERT" => Some(ChangeKind::Insert),
            "MODIFY" => Some(ChangeKind::Update),
            "REMOVE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// "Something changed in `table`". Consumers re-read the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub change: ChangeKind,
}

impl ChangeEvent {
    pub fn new(table: Table, change: ChangeKind) -> Self {
        Self { table, change }
    }

    /// Builds the event for a stream record; `None` for rows that are not
    /// application data (websocket connections, unknown entities).
    pub fn from_stream(event_name: &str, entity_type: Option<&str>) -> Option<Self> {
        let change = ChangeKind::from_stream(event_name)?;
        let table = Table::parse(entity_type?).ok()?;
        Some(Self { table, change })
    }
}

/// Messages pushed by the server over the websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    TableChanged(ChangeEvent),
    Pong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAction {
    Subscribe,
    Unsubscribe,
    Ping,
}

/// Messages sent by clients over the websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub action: ClientAction,
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl ClientMessage {
    pub fn subscribe(tables: impl IntoIterator<Item = Table>) -> Self {
        Self {
            action: ClientAction::Subscribe,
            tables: tables.into_iter().collect(),
        }
    }
}
