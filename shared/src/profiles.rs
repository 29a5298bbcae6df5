use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::types::{Person, Profile, Role, UpdateProfileRequest};
use condo_core::Table;

use crate::error::ApiError;
use crate::items::{self, Item};
use crate::{roles, store};

pub fn to_item(profile: &Profile) -> Item {
    let mut item = items::new_item(Table::Profiles, &profile.user_id);
    items::put_s(&mut item, "user_id", profile.user_id.as_str());
    items::put_s(&mut item, "full_name", profile.full_name.as_str());
    items::put_s(&mut item, "email", profile.email.as_str());
    items::put_s(&mut item, "phone", profile.phone.as_str());
    items::put_opt_s(&mut item, "avatar_url", profile.avatar_url.as_deref());
    items::put_s(&mut item, "unit", profile.unit.as_str());
    items::put_s(&mut item, "block", profile.block.as_str());
    items::put_time(&mut item, "created_at", profile.created_at);
    item
}

pub fn from_item(item: &Item) -> Result<Profile, ApiError> {
    Ok(Profile {
        user_id: items::s(item, "user_id")?,
        full_name: items::s_or_default(item, "full_name"),
        email: items::s_or_default(item, "email"),
        phone: items::s_or_default(item, "phone"),
        avatar_url: items::opt_s(item, "avatar_url"),
        unit: items::s_or_default(item, "unit"),
        block: items::s_or_default(item, "block"),
        created_at: items::time(item, "created_at")?,
    })
}

pub async fn get_profile(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<Profile>, ApiError> {
    store::get_row(client, table_name, Table::Profiles, user_id)
        .await?
        .map(|item| from_item(&item))
        .transpose()
}

/// Profile of the caller, required by writes that copy its name or unit.
pub async fn require_profile(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Profile, ApiError> {
    get_profile(client, table_name, user_id)
        .await?
        .ok_or(ApiError::NotFound("Profile"))
}

pub async fn update_profile(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    req: UpdateProfileRequest,
) -> Result<Profile, ApiError> {
    req.validate()?;
    // Confirms the row exists before writing.
    let current = require_profile(client, table_name, user_id).await?;
    if req.is_empty() {
        return Ok(current);
    }

    let mut fields = Vec::new();
    if let Some(name) = req.full_name {
        fields.push(("full_name", AttributeValue::S(name.trim().to_string())));
    }
    if let Some(phone) = req.phone {
        fields.push(("phone", AttributeValue::S(phone)));
    }
    if let Some(unit) = req.unit {
        fields.push(("unit", AttributeValue::S(unit)));
    }
    if let Some(block) = req.block {
        fields.push(("block", AttributeValue::S(block)));
    }
    if let Some(avatar_url) = req.avatar_url {
        fields.push(("avatar_url", AttributeValue::S(avatar_url)));
    }

    store::update_row(client, table_name, Table::Profiles, user_id, fields, None).await?;
    tracing::info!("Profile updated: {}", user_id);

    require_profile(client, table_name, user_id).await
}

pub async fn list_profiles(client: &DynamoClient, table_name: &str) -> Result<Vec<Profile>, ApiError> {
    store::scan_entity(client, table_name, Table::Profiles)
        .await?
        .iter()
        .map(from_item)
        .collect()
}

/// Profiles joined with their role; a profile without a role row is listed
/// as a resident.
pub async fn list_people(client: &DynamoClient, table_name: &str) -> Result<Vec<Person>, ApiError> {
    let (profiles, assignments) = tokio::try_join!(
        list_profiles(client, table_name),
        roles::list_roles(client, table_name),
    )?;
    Ok(join_people(profiles, assignments))
}

fn join_people(profiles: Vec<Profile>, assignments: Vec<roles::RoleAssignment>) -> Vec<Person> {
    profiles
        .into_iter()
        .map(|profile| {
            let role = assignments
                .iter()
                .find(|a| a.user_id == profile.user_id)
                .map(|a| a.role)
                .unwrap_or(Role::Resident);
            Person { profile, role }
        })
        .collect()
}
