use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::Utc;
use condo_core::types::{
    CreateReservationRequest, Profile, Reservation, ReservationDecision, ReservationStatus,
};
use condo_core::Table;

use crate::error::ApiError;
use crate::items::{self, Item};
use crate::store;

pub fn to_item(reservation: &Reservation) -> Item {
    let mut item = items::new_item(Table::Reservations, &reservation.id);
    items::put_s(&mut item, "space", reservation.space.as_str());
    items::put_s(&mut item, "date", reservation.date.as_str());
    items::put_s(&mut item, "start_time", reservation.start_time.as_str());
    items::put_s(&mut item, "end_time", reservation.end_time.as_str());
    items::put_s(&mut item, "requested_by", reservation.requested_by.as_str());
    items::put_s(&mut item, "resident_name", reservation.resident_name.as_str());
    items::put_s(&mut item, "unit", reservation.unit.as_str());
    items::put_s(&mut item, "block", reservation.block.as_str());
    items::put_s(&mut item, "status", reservation.status.as_str());
    items::put_opt_s(&mut item, "notes", reservation.notes.as_deref());
    items::put_time(&mut item, "created_at", reservation.created_at);
    item
}

pub fn from_item(item: &Item) -> Result<Reservation, ApiError> {
    Ok(Reservation {
        id: items::s(item, "id")?,
        space: items::s_or_default(item, "space"),
        date: items::s_or_default(item, "date"),
        start_time: items::s_or_default(item, "start_time"),
        end_time: items::s_or_default(item, "end_time"),
        requested_by: items::s_or_default(item, "requested_by"),
        resident_name: items::s_or_default(item, "resident_name"),
        unit: items::s_or_default(item, "unit"),
        block: items::s_or_default(item, "block"),
        status: items::parsed(item, "status", ReservationStatus::parse)?,
        notes: items::opt_s(item, "notes"),
        created_at: items::time(item, "created_at")?,
    })
}

pub async fn list_reservations(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<Reservation>, ApiError> {
    store::scan_entity(client, table_name, Table::Reservations)
        .await?
        .iter()
        .map(from_item)
        .collect()
}

/// New `pendente` reservation carrying the requester's name and unit.
pub async fn request_reservation(
    client: &DynamoClient,
    table_name: &str,
    requester: &Profile,
    req: CreateReservationRequest,
) -> Result<Reservation, ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let reservation = Reservation::request(id, req, requester, Utc::now())?;

    store::put_new(client, table_name, to_item(&reservation)).await?;
    tracing::info!(
        "Reservation requested: {} ({} on {})",
        reservation.id,
        reservation.space,
        reservation.date
    );
    Ok(reservation)
}

pub async fn decide_reservation(
    client: &DynamoClient,
    table_name: &str,
    id: &str,
    decision: ReservationDecision,
) -> Result<Reservation, ApiError> {
    let item = store::get_row(client, table_name, Table::Reservations, id)
        .await?
        .ok_or(ApiError::NotFound("Reservation"))?;
    let mut reservation = from_item(&item)?;
    let previous = reservation.status;
    reservation.decide(decision)?;

    store::update_row(
        client,
        table_name,
        Table::Reservations,
        id,
        vec![("status", AttributeValue::S(reservation.status.as_str().to_string()))],
        Some(previous.as_str()),
    )
    .await?;
    tracing::info!("Reservation {}: {}", id, reservation.status);
    Ok(reservation)
}
