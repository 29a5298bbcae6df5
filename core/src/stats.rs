use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// One of the four count-only dashboard queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountQuery {
    PendingPackages,
    Residents,
    VisitorsToday,
    OpenOccurrences,
}

impl CountQuery {
    pub const ALL: [CountQuery; 4] = [
        CountQuery::PendingPackages,
        CountQuery::Residents,
        CountQuery::VisitorsToday,
        CountQuery::OpenOccurrences,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CountQuery::PendingPackages => "pending_packages",
            CountQuery::Residents => "residents",
            CountQuery::VisitorsToday => "visitors_today",
            CountQuery::OpenOccurrences => "open_occurrences",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        CountQuery::ALL
            .into_iter()
            .find(|q| q.as_str() == value)
            .ok_or_else(|| DomainError::InvalidValue {
                field: "count",
                value: value.to_string(),
            })
    }
}

/// Start of the current UTC day, the lower bound of "today's visitors".
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub pending_packages: u64,
    pub active_residents: u64,
    pub visitors_today: u64,
    pub open_occurrences: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}
