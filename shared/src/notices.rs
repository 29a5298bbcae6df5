use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::Utc;
use condo_core::types::{CreateNoticeRequest, Notice, NoticeKind, Profile};
use condo_core::Table;

use crate::error::ApiError;
use crate::items::{self, Item};
use crate::store;

pub fn to_item(notice: &Notice) -> Item {
    let mut item = items::new_item(Table::Notices, &notice.id);
    items::put_s(&mut item, "title", notice.title.as_str());
    items::put_s(&mut item, "content", notice.content.as_str());
    items::put_s(&mut item, "type", notice.kind.as_str());
    items::put_opt_s(&mut item, "date", notice.date.as_deref());
    items::put_opt_s(&mut item, "location", notice.location.as_deref());
    items::put_s(&mut item, "author_id", notice.author_id.as_str());
    items::put_s(&mut item, "author_name", notice.author_name.as_str());
    items::put_bool(&mut item, "is_new", notice.is_new);
    items::put_time(&mut item, "created_at", notice.created_at);
    item
}

pub fn from_item(item: &Item) -> Result<Notice, ApiError> {
    Ok(Notice {
        id: items::s(item, "id")?,
        title: items::s_or_default(item, "title"),
        content: items::s_or_default(item, "content"),
        kind: items::parsed(item, "type", NoticeKind::parse)?,
        date: items::opt_s(item, "date"),
        location: items::opt_s(item, "location"),
        author_id: items::s_or_default(item, "author_id"),
        author_name: items::s_or_default(item, "author_name"),
        is_new: items::bool_or(item, "is_new", false),
        created_at: items::time(item, "created_at")?,
    })
}

pub async fn list_notices(client: &DynamoClient, table_name: &str) -> Result<Vec<Notice>, ApiError> {
    store::scan_entity(client, table_name, Table::Notices)
        .await?
        .iter()
        .map(from_item)
        .collect()
}

pub async fn publish_notice(
    client: &DynamoClient,
    table_name: &str,
    author: &Profile,
    req: CreateNoticeRequest,
) -> Result<Notice, ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let notice = Notice::publish(id, req, author, Utc::now())?;

    store::put_new(client, table_name, to_item(&notice)).await?;
    tracing::info!("Notice published: {} ({})", notice.id, notice.kind);
    Ok(notice)
}

pub async fn delete_notice(client: &DynamoClient, table_name: &str, id: &str) -> Result<(), ApiError> {
    if store::get_row(client, table_name, Table::Notices, id).await?.is_none() {
        return Err(ApiError::NotFound("Notice"));
    }
    store::delete_row(client, table_name, Table::Notices, id).await?;
    tracing::info!("Notice deleted: {}", id);
    Ok(())
}
