//! Role checks for writes and reads.

use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::{Capability, Role};

use crate::error::ApiError;
use crate::roles;

/// Resolves the caller's role and checks it grants `capability`.
pub async fn authorize(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    capability: Capability,
) -> Result<Role, ApiError> {
    let role = roles::get_role(client, table_name, user_id).await?;
    check(role, capability)
}

pub fn check(role: Option<Role>, capability: Capability) -> Result<Role, ApiError> {
    match role {
        Some(role) if role.can(capability) => Ok(role),
        Some(role) => {
            tracing::info!("Role {} lacks {:?}", role, capability);
            Err(ApiError::Forbidden(format!(
                "Access denied for role {}",
                role.label()
            )))
        }
        None => Err(ApiError::Forbidden("No role assigned to this account".to_string())),
    }
}
