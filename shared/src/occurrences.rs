//! Occurrences and their append-only timeline.
//!
//! The occurrence row is `PK = SK = OCCURRENCE#<id>`; each timeline event
//! lives in the same partition under `SK = EVENT#<created_at>#<uuid>`, so a
//! single query returns an occurrence with its full history.

use aws_sdk_dynamodb::types::{AttributeValue, TransactWriteItem};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{SecondsFormat, Utc};
use condo_core::types::{
    CreateOccurrenceRequest, Occurrence, OccurrenceEvent, OccurrenceKind, OccurrenceStatus, Profile,
};
use condo_core::{Capability, Role, Table};
use std::collections::HashMap;

use crate::error::ApiError;
use crate::items::{self, Item};
use crate::store;

pub fn to_item(occurrence: &Occurrence) -> Item {
    let mut item = items::new_item(Table::Occurrences, &occurrence.id);
    items::put_s(&mut item, "type", occurrence.kind.as_str());
    items::put_s(&mut item, "title", occurrence.title.as_str());
    items::put_s(&mut item, "description", occurrence.description.as_str());
    items::put_s(&mut item, "requested_by", occurrence.requested_by.as_str());
    items::put_s(&mut item, "resident_name", occurrence.resident_name.as_str());
    items::put_s(&mut item, "unit", occurrence.unit.as_str());
    items::put_s(&mut item, "block", occurrence.block.as_str());
    items::put_s(&mut item, "status", occurrence.status.as_str());
    items::put_time(&mut item, "created_at", occurrence.created_at);
    item
}

pub fn from_item(item: &Item) -> Result<Occurrence, ApiError> {
    Ok(Occurrence {
        id: items::s(item, "id")?,
        kind: items::parsed(item, "type", OccurrenceKind::parse)?,
        title: items::s_or_default(item, "title"),
        description: items::s_or_default(item, "description"),
        requested_by: items::s_or_default(item, "requested_by"),
        resident_name: items::s_or_default(item, "resident_name"),
        unit: items::s_or_default(item, "unit"),
        block: items::s_or_default(item, "block"),
        status: items::parsed(item, "status", OccurrenceStatus::parse)?,
        created_at: items::time(item, "created_at")?,
        timeline: Vec::new(),
    })
}

pub fn event_to_item(event: &OccurrenceEvent) -> Item {
    let event_id = uuid::Uuid::new_v4().to_string();
    let mut item = Item::new();
    items::put_s(&mut item, "PK", items::key(Table::Occurrences, &event.occurrence_id));
    items::put_s(
        &mut item,
        "SK",
        format!(
            "{}{}#{}",
            Table::OccurrenceEvents.key_prefix(),
            event.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            event_id
        ),
    );
    items::put_s(&mut item, "entity_type", Table::OccurrenceEvents.as_str());
    items::put_s(&mut item, "id", event_id);
    items::put_s(&mut item, "occurrence_id", event.occurrence_id.as_str());
    items::put_s(&mut item, "action", event.action.as_str());
    items::put_s(&mut item, "by", event.by.as_str());
    items::put_time(&mut item, "created_at", event.created_at);
    item
}

pub fn event_from_item(item: &Item) -> Result<OccurrenceEvent, ApiError> {
    Ok(OccurrenceEvent {
        occurrence_id: items::s(item, "occurrence_id")?,
        action: items::s_or_default(item, "action"),
        by: items::s_or_default(item, "by"),
        created_at: items::time(item, "created_at")?,
    })
}

/// Attaches events to their occurrences, oldest first.
fn assemble(mut occurrences: Vec<Occurrence>, events: Vec<OccurrenceEvent>) -> Vec<Occurrence> {
    let mut by_occurrence: HashMap<String, Vec<OccurrenceEvent>> = HashMap::new();
    for event in events {
        by_occurrence.entry(event.occurrence_id.clone()).or_default().push(event);
    }
    for occurrence in &mut occurrences {
        if let Some(mut timeline) = by_occurrence.remove(&occurrence.id) {
            timeline.sort_by_key(|e| e.created_at);
            occurrence.timeline = timeline;
        }
    }
    occurrences
}

pub async fn get_occurrence(
    client: &DynamoClient,
    table_name: &str,
    id: &str,
) -> Result<Occurrence, ApiError> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk")
        .expression_attribute_values(":pk", AttributeValue::S(items::key(Table::Occurrences, id)))
        .send()
        .await?;

    let rows = result.items.unwrap_or_default();
    let mut occurrence = None;
    let mut events = Vec::new();
    for item in &rows {
        match items::opt_s(item, "entity_type").as_deref() {
            Some("occurrences") => occurrence = Some(from_item(item)?),
            Some("occurrence_events") => events.push(event_from_item(item)?),
            _ => {}
        }
    }

    let occurrence = occurrence.ok_or(ApiError::NotFound("Occurrence"))?;
    assemble(vec![occurrence], events)
        .pop()
        .ok_or(ApiError::NotFound("Occurrence"))
}

pub async fn list_occurrences(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<Occurrence>, ApiError> {
    let (occurrences, events) = tokio::try_join!(
        store::scan_entity(client, table_name, Table::Occurrences),
        list_events(client, table_name),
    )?;
    let occurrences = occurrences.iter().map(from_item).collect::<Result<Vec<_>, _>>()?;
    Ok(assemble(occurrences, events))
}

pub async fn list_events(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<OccurrenceEvent>, ApiError> {
    store::scan_entity(client, table_name, Table::OccurrenceEvents)
        .await?
        .iter()
        .map(event_from_item)
        .collect()
}

/// Writes the occurrence and its opening event together.
pub async fn open_occurrence(
    client: &DynamoClient,
    table_name: &str,
    requester: &Profile,
    req: CreateOccurrenceRequest,
) -> Result<Occurrence, ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let occurrence = Occurrence::open(id, req, requester, Utc::now())?;

    let mut writes: Vec<TransactWriteItem> = vec![store::create_once(table_name, to_item(&occurrence))?];
    for event in &occurrence.timeline {
        writes.push(store::create_once(table_name, event_to_item(event))?);
    }

    client
        .transact_write_items()
        .set_transact_items(Some(writes))
        .send()
        .await?;

    tracing::info!("Occurrence opened: {} ({})", occurrence.id, occurrence.kind);
    Ok(occurrence)
}

/// Manager status change. The timeline is left untouched.
pub async fn set_status(
    client: &DynamoClient,
    table_name: &str,
    id: &str,
    status: OccurrenceStatus,
) -> Result<Occurrence, ApiError> {
    let mut occurrence = get_occurrence(client, table_name, id).await?;
    let previous = occurrence.status;
    occurrence.set_status(status)?;

    store::update_row(
        client,
        table_name,
        Table::Occurrences,
        id,
        vec![("status", AttributeValue::S(status.as_str().to_string()))],
        Some(previous.as_str()),
    )
    .await?;
    tracing::info!("Occurrence {}: {} -> {}", id, previous, status);
    Ok(occurrence)
}

/// Managers may reply to any occurrence, residents only to their own.
pub fn may_reply(occurrence: &Occurrence, user_id: &str, role: Option<Role>) -> bool {
    role.is_some_and(|r| r.can(Capability::ManageOccurrence)) || occurrence.requested_by == user_id
}

/// Appends one timeline event authored by `author`.
pub async fn reply(
    client: &DynamoClient,
    table_name: &str,
    id: &str,
    author: &Profile,
    role: Option<Role>,
    message: &str,
) -> Result<OccurrenceEvent, ApiError> {
    let mut occurrence = get_occurrence(client, table_name, id).await?;
    if !may_reply(&occurrence, &author.user_id, role) {
        return Err(ApiError::Forbidden(
            "Only managers or the requester can reply".to_string(),
        ));
    }

    let event = occurrence.reply(message, &author.full_name, Utc::now())?.clone();
    store::put_new(client, table_name, event_to_item(&event)).await?;
    tracing::info!("Occurrence {} reply by {}", id, author.user_id);
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use condo_core::types::OCCURRENCE_OPENED_ACTION;

    fn requester() -> Profile {
        Profile {
            user_id: "u-1".into(),
            full_name: "Ana Souza".into(),
            email: "ana@example.com".into(),
            phone: String::new(),
            avatar_url: None,
            unit: "101".into(),
            block: "A".into(),
            created_at: Utc::now(),
        }
    }

    fn opened() -> Occurrence {
        Occurrence::open(
            "o-1".into(),
            CreateOccurrenceRequest {
                kind: OccurrenceKind::Noise,
                title: "Noise".into(),
                description: "Loud music".into(),
            },
            &requester(),
            Utc.with_ymd_and_hms(2024, 4, 1, 22, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn events_share_the_occurrence_partition() {
        let occ = opened();
        let event = event_to_item(&occ.timeline[0]);
        assert_eq!(items::opt_s(&event, "PK").as_deref(), Some("OCCURRENCE#o-1"));
        let sk = items::opt_s(&event, "SK").unwrap();
        assert!(sk.starts_with("EVENT#2024-04-01T22:00:00.000000Z#"));
        assert_eq!(event_from_item(&event).unwrap().action, OCCURRENCE_OPENED_ACTION);
    }

    #[test]
    fn timelines_are_grouped_and_ordered() {
        let occ = from_item(&to_item(&opened())).unwrap();
        assert!(occ.timeline.is_empty());
        let t0 = occ.created_at;
        let events = vec![
            OccurrenceEvent {
                occurrence_id: "o-1".into(),
                action: "Second".into(),
                by: "Síndico".into(),
                created_at: t0 + Duration::minutes(5),
            },
            OccurrenceEvent {
                occurrence_id: "o-1".into(),
                action: OCCURRENCE_OPENED_ACTION.into(),
                by: "Ana Souza".into(),
                created_at: t0,
            },
            OccurrenceEvent {
                occurrence_id: "other".into(),
                action: "Elsewhere".into(),
                by: "x".into(),
                created_at: t0,
            },
        ];
        let assembled = assemble(vec![occ], events);
        let actions: Vec<_> = assembled[0].timeline.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec![OCCURRENCE_OPENED_ACTION, "Second"]);
    }

    #[test]
    fn only_manager_or_requester_may_reply() {
        let occ = opened();
        assert!(may_reply(&occ, "u-1", Some(Role::Resident)));
        assert!(may_reply(&occ, "u-other", Some(Role::Manager)));
        assert!(!may_reply(&occ, "u-other", Some(Role::Resident)));
        assert!(!may_reply(&occ, "u-other", None));
    }
}
