//! Full ordered reads of one logical table, as consumed by live views.

use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::listing::OrderBy;
use condo_core::{Capability, Table};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::{notices, occurrences, packages, profiles, reservations, roles, visitors};

/// Capability needed to read every row of `table`.
pub fn read_capability(table: Table) -> Capability {
    match table {
        Table::Profiles | Table::UserRoles => Capability::ManagePeople,
        Table::Packages => Capability::ViewPackages,
        Table::Visitors => Capability::ViewVisitors,
        Table::Reservations => Capability::ViewReservations,
        Table::Notices => Capability::ViewNotices,
        Table::Occurrences | Table::OccurrenceEvents => Capability::ViewOccurrences,
    }
}

fn to_values<T: Serialize>(rows: Vec<T>) -> Result<Vec<Value>, ApiError> {
    rows.into_iter()
        .map(|row| {
            serde_json::to_value(row).map_err(|e| ApiError::Backend(format!("failed to serialize row: {}", e)))
        })
        .collect()
}

pub async fn list_table(
    client: &DynamoClient,
    table_name: &str,
    table: Table,
    order: &OrderBy,
) -> Result<Vec<Value>, ApiError> {
    let mut rows = match table {
        Table::Profiles => to_values(profiles::list_profiles(client, table_name).await?)?,
        Table::UserRoles => to_values(roles::list_roles(client, table_name).await?)?,
        Table::Packages => to_values(packages::list_packages(client, table_name).await?)?,
        Table::Visitors => to_values(visitors::list_visitors(client, table_name).await?)?,
        Table::Reservations => to_values(reservations::list_reservations(client, table_name).await?)?,
        Table::Notices => to_values(notices::list_notices(client, table_name).await?)?,
        Table::Occurrences => to_values(occurrences::list_occurrences(client, table_name).await?)?,
        Table::OccurrenceEvents => to_values(occurrences::list_events(client, table_name).await?)?,
    };

    order.sort(&mut rows);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use condo_core::Role;

    #[test]
    fn doorman_reads_match_the_route_table() {
        let readable: Vec<_> = Table::ALL
            .into_iter()
            .filter(|t| Role::Doorman.can(read_capability(*t)))
            .collect();
        assert_eq!(readable, vec![Table::Packages, Table::Visitors]);
    }

    #[test]
    fn only_managers_read_people_tables() {
        assert!(!Role::Resident.can(read_capability(Table::Profiles)));
        assert!(Role::Manager.can(read_capability(Table::UserRoles)));
    }
}
