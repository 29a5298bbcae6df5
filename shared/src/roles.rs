use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::types::Role;
use condo_core::Table;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::items::{self, Item};
use crate::store;

/// Row of the `user_roles` table. One per identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role: Role,
}

pub fn to_item(assignment: &RoleAssignment) -> Item {
    let mut item = items::new_item(Table::UserRoles, &assignment.user_id);
    items::put_s(&mut item, "user_id", assignment.user_id.as_str());
    items::put_s(&mut item, "role", assignment.role.as_str());
    item
}

pub fn from_item(item: &Item) -> Result<RoleAssignment, ApiError> {
    Ok(RoleAssignment {
        user_id: items::s(item, "user_id")?,
        role: items::parsed(item, "role", Role::parse)?,
    })
}

pub async fn get_role(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<Role>, ApiError> {
    let item = store::get_row(client, table_name, Table::UserRoles, user_id).await?;
    Ok(item.map(|i| from_item(&i)).transpose()?.map(|a| a.role))
}

pub async fn list_roles(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<RoleAssignment>, ApiError> {
    store::scan_entity(client, table_name, Table::UserRoles)
        .await?
        .iter()
        .map(from_item)
        .collect()
}
