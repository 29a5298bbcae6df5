use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::session::Session;

use crate::error::ApiError;
use crate::{profiles, roles};

/// Profile and role of `user_id`, fetched concurrently. Either may be
/// missing for an identity whose rows were never written.
pub async fn resolve_session(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    email: Option<&str>,
) -> Result<Session, ApiError> {
    let (profile, role) = tokio::try_join!(
        profiles::get_profile(client, table_name, user_id),
        roles::get_role(client, table_name, user_id),
    )?;

    let email = email
        .map(str::to_string)
        .or_else(|| profile.as_ref().map(|p| p.email.clone()))
        .unwrap_or_default();

    Ok(Session {
        user_id: user_id.to_string(),
        email,
        profile,
        role,
    })
}
