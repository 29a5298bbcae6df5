use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::Utc;
use condo_core::types::{CreatePackageRequest, Package, PackageKind, PackageStatus, PickupRequest};
use condo_core::Table;

use crate::error::ApiError;
use crate::items::{self, Item};
use crate::store;

pub fn to_item(package: &Package) -> Item {
    let mut item = items::new_item(Table::Packages, &package.id);
    items::put_s(&mut item, "type", package.kind.as_str());
    items::put_s(&mut item, "description", package.description.as_str());
    items::put_s(&mut item, "resident_name", package.resident_name.as_str());
    items::put_s(&mut item, "unit", package.unit.as_str());
    items::put_s(&mut item, "block", package.block.as_str());
    items::put_s(&mut item, "status", package.status.as_str());
    items::put_time(&mut item, "received_at", package.received_at);
    if let Some(at) = package.picked_up_at {
        items::put_time(&mut item, "picked_up_at", at);
    }
    items::put_opt_s(&mut item, "picked_up_by", package.picked_up_by.as_deref());
    items::put_opt_s(&mut item, "created_by", package.created_by.as_deref());
    item
}

pub fn from_item(item: &Item) -> Result<Package, ApiError> {
    Ok(Package {
        id: items::s(item, "id")?,
        kind: items::parsed(item, "type", PackageKind::parse)?,
        description: items::s_or_default(item, "description"),
        resident_name: items::s_or_default(item, "resident_name"),
        unit: items::s_or_default(item, "unit"),
        block: items::s_or_default(item, "block"),
        status: items::parsed(item, "status", PackageStatus::parse)?,
        received_at: items::time(item, "received_at")?,
        picked_up_at: items::opt_time(item, "picked_up_at"),
        picked_up_by: items::opt_s(item, "picked_up_by"),
        created_by: items::opt_s(item, "created_by"),
    })
}

pub async fn get_package(client: &DynamoClient, table_name: &str, id: &str) -> Result<Package, ApiError> {
    let item = store::get_row(client, table_name, Table::Packages, id)
        .await?
        .ok_or(ApiError::NotFound("Package"))?;
    from_item(&item)
}

pub async fn list_packages(client: &DynamoClient, table_name: &str) -> Result<Vec<Package>, ApiError> {
    store::scan_entity(client, table_name, Table::Packages)
        .await?
        .iter()
        .map(from_item)
        .collect()
}

pub async fn create_package(
    client: &DynamoClient,
    table_name: &str,
    created_by: &str,
    req: CreatePackageRequest,
) -> Result<Package, ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let package = Package::receive(id, req, Some(created_by.to_string()), Utc::now())?;

    store::put_new(client, table_name, to_item(&package)).await?;
    tracing::info!("Package registered: {} for {}/{}", package.id, package.block, package.unit);
    Ok(package)
}

/// `pendente -> retirada`; timestamp and actor land in the same write.
pub async fn confirm_pickup(
    client: &DynamoClient,
    table_name: &str,
    id: &str,
    req: PickupRequest,
) -> Result<Package, ApiError> {
    let mut package = get_package(client, table_name, id).await?;
    let previous = package.status;
    package.confirm_pickup(req.picked_up_by.filter(|b| !b.trim().is_empty()), Utc::now())?;

    let mut fields = vec![("status", AttributeValue::S(package.status.as_str().to_string()))];
    if let Some(at) = package.picked_up_at {
        fields.push(("picked_up_at", AttributeValue::S(at.to_rfc3339())));
    }
    if let Some(by) = &package.picked_up_by {
        fields.push(("picked_up_by", AttributeValue::S(by.clone())));
    }

    store::update_row(client, table_name, Table::Packages, id, fields, Some(previous.as_str())).await?;
    tracing::info!("Package picked up: {}", id);
    Ok(package)
}

/// `pendente -> devolvida`.
pub async fn mark_returned(client: &DynamoClient, table_name: &str, id: &str) -> Result<Package, ApiError> {
    let mut package = get_package(client, table_name, id).await?;
    let previous = package.status;
    package.mark_returned()?;

    store::update_row(
        client,
        table_name,
        Table::Packages,
        id,
        vec![("status", AttributeValue::S(package.status.as_str().to_string()))],
        Some(previous.as_str()),
    )
    .await?;
    tracing::info!("Package returned: {}", id);
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> Package {
        Package::receive(
            "p-1".into(),
            CreatePackageRequest {
                block: "A".into(),
                unit: "101".into(),
                resident_name: "Ana Souza".into(),
                kind: PackageKind::Bag,
                description: "Mercado".into(),
            },
            Some("u-porteiro".into()),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn pending_rows_carry_no_pickup_attributes() {
        let item = to_item(&package());
        assert!(!item.contains_key("picked_up_at"));
        assert!(!item.contains_key("picked_up_by"));
        assert_eq!(items::opt_s(&item, "type").as_deref(), Some("sacola"));
        assert_eq!(items::opt_s(&item, "status").as_deref(), Some("pendente"));
    }

    #[test]
    fn picked_up_row_reads_back() {
        let mut p = package();
        p.confirm_pickup(Some("Vizinho".into()), Utc::now()).unwrap();
        let back = from_item(&to_item(&p)).unwrap();
        assert_eq!(back.status, PackageStatus::PickedUp);
        assert_eq!(back.picked_up_by.as_deref(), Some("Vizinho"));
        assert!(back.picked_up_at.is_some());
    }
}
