//! Count-only queries behind the dashboard cards.

use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, Utc};
use condo_core::stats::{start_of_day, CountQuery, DashboardCounts};
use condo_core::types::{OccurrenceStatus, PackageStatus};
use condo_core::Table;
use std::collections::HashMap;

use crate::error::ApiError;

#[derive(Debug, PartialEq)]
pub struct CountFilter {
    pub expression: &'static str,
    pub names: Option<HashMap<String, String>>,
    pub values: HashMap<String, AttributeValue>,
}

impl CountFilter {
    pub fn for_query(query: CountQuery, now: DateTime<Utc>) -> Self {
        let entity = |table: Table| (":type".to_string(), AttributeValue::S(table.as_str().to_string()));
        let status_name = || Some(HashMap::from([("#status".to_string(), "status".to_string())]));

        match query {
            CountQuery::PendingPackages => Self {
                expression: "entity_type = :type AND #status = :status",
                names: status_name(),
                values: HashMap::from([
                    entity(Table::Packages),
                    (
                        ":status".to_string(),
                        AttributeValue::S(PackageStatus::Pending.as_str().to_string()),
                    ),
                ]),
            },
            CountQuery::Residents => Self {
                expression: "entity_type = :type",
                names: None,
                values: HashMap::from([entity(Table::Profiles)]),
            },
            CountQuery::VisitorsToday => Self {
                expression: "entity_type = :type AND entry_at >= :since",
                names: None,
                values: HashMap::from([
                    entity(Table::Visitors),
                    (
                        ":since".to_string(),
                        AttributeValue::S(start_of_day(now).to_rfc3339()),
                    ),
                ]),
            },
            CountQuery::OpenOccurrences => Self {
                expression: "entity_type = :type AND #status <> :status",
                names: status_name(),
                values: HashMap::from([
                    entity(Table::Occurrences),
                    (
                        ":status".to_string(),
                        AttributeValue::S(OccurrenceStatus::Resolved.as_str().to_string()),
                    ),
                ]),
            },
        }
    }
}

/// Number of rows matching `query`; no row data is transferred.
pub async fn count(client: &DynamoClient, table_name: &str, query: CountQuery) -> Result<u64, ApiError> {
    let filter = CountFilter::for_query(query, Utc::now());
    let mut total: u64 = 0;
    let mut start_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let result = client
            .scan()
            .table_name(table_name)
            .select(Select::Count)
            .filter_expression(filter.expression)
            .set_expression_attribute_names(filter.names.clone())
            .set_expression_attribute_values(Some(filter.values.clone()))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await?;

        total += u64::try_from(result.count).unwrap_or_default();
        start_key = result.last_evaluated_key;
        if start_key.is_none() {
            break;
        }
    }

    tracing::info!("Count {}: {}", query.as_str(), total);
    Ok(total)
}

/// The four dashboard counters, queried in parallel.
pub async fn dashboard_stats(client: &DynamoClient, table_name: &str) -> Result<DashboardCounts, ApiError> {
    let (pending_packages, active_residents, visitors_today, open_occurrences) = tokio::try_join!(
        count(client, table_name, CountQuery::PendingPackages),
        count(client, table_name, CountQuery::Residents),
        count(client, table_name, CountQuery::VisitorsToday),
        count(client, table_name, CountQuery::OpenOccurrences),
    )?;

    Ok(DashboardCounts {
        pending_packages,
        active_residents,
        visitors_today,
        open_occurrences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn visitors_today_starts_at_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 15, 30, 0).unwrap();
        let filter = CountFilter::for_query(CountQuery::VisitorsToday, now);
        assert_eq!(
            filter.values[":since"],
            AttributeValue::S("2024-05-17T00:00:00+00:00".into())
        );
        assert_eq!(filter.values[":type"], AttributeValue::S("visitors".into()));
    }

    #[test]
    fn open_occurrences_exclude_resolved() {
        let filter = CountFilter::for_query(CountQuery::OpenOccurrences, Utc::now());
        assert!(filter.expression.contains("<>"));
        assert_eq!(filter.values[":status"], AttributeValue::S("resolvida".into()));
        assert!(filter.names.is_some());
    }

    #[test]
    fn residents_count_every_profile() {
        let filter = CountFilter::for_query(CountQuery::Residents, Utc::now());
        assert_eq!(filter.expression, "entity_type = :type");
        assert!(filter.names.is_none());
    }
}
