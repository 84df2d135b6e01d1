// Record append, read, list, soft-delete and purge (spec.md §3, §4.3–§4.5).

use sea_orm::TransactionTrait;
use serde_json::Value;

use crate::db::{client, write_lock};
use crate::errors::{Error, Result};
use crate::hash;
use crate::identifiers::validate_record_name;
use crate::state::{AppState, RecordListPage};
use crate::storage::StorageAdapter;
use crate::table::records::{self, NewRecord, RecordRow};
use crate::table::streams;

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct AppendInput<'a> {
    pub stream_id: i64,
    pub stream_path: &'a str,
    pub pod_name: &'a str,
    pub name: &'a str,
    pub content: Vec<u8>,
    pub content_type: String,
    pub is_binary: bool,
    pub user_id: &'a str,
    pub headers: Value,
    pub ext: &'a str,
}

/// The append algorithm (spec.md §4.3): validate, serialize against
/// concurrent appenders to the same stream, derive index/hash from the
/// current tip, optionally offload large binary content to external
/// storage, insert, invalidate caches.
pub async fn append(
    state: &AppState,
    storage: Option<&(dyn StorageAdapter + Send + Sync)>,
    input: AppendInput<'_>,
) -> Result<RecordRow> {
    validate_record_name(input.name)?;
    if streams::get_by_path(
        input.pod_name,
        &format!("{}/{}", input.stream_path.trim_end_matches('/'), input.name),
    )
    .await?
    .is_some()
    {
        return Err(Error::NameConflict(format!(
            "a stream named '{}' already exists in this stream",
            input.name
        )));
    }

    let _guard = write_lock().await;
    let client = client().await;
    let txn = client.begin().await.map_err(crate::db::map_db_err)?;

    let previous = records::lock_latest(&txn, input.stream_id).await?;
    let index = previous.as_ref().map(|p| p.index + 1).unwrap_or(0);
    let previous_hash = previous.as_ref().map(|p| p.hash.clone());

    let content_hash = hash::content_hash(&input.content);
    let size = input.content.len() as i64;
    let timestamp_iso = now_iso();
    let record_hash = hash::record_hash(
        previous_hash.as_deref(),
        &content_hash,
        input.user_id,
        &timestamp_iso,
    );

    let cfg = crate::config::get_config();
    let (stored_content, storage_id) = if cfg.external_storage_enabled
        && input.is_binary
        && size as usize >= cfg.external_storage_binary_threshold_bytes
    {
        match storage {
            Some(adapter) => {
                let id = adapter
                    .store(
                        input.pod_name,
                        input.stream_path,
                        input.name,
                        &content_hash,
                        &input.content,
                        input.ext,
                    )
                    .await?;
                (vec![], Some(id))
            }
            None => (input.content, None),
        }
    } else {
        (input.content, None)
    };

    let full_path = format!(
        "{}/{}",
        input.stream_path.trim_end_matches('/'),
        input.name
    );

    let inserted = records::insert(
        &txn,
        NewRecord {
            stream_id: input.stream_id,
            index,
            content: stored_content,
            content_type: &input.content_type,
            is_binary: input.is_binary,
            size,
            name: input.name,
            path: &full_path,
            content_hash: &content_hash,
            hash: &record_hash,
            previous_hash: previous_hash.as_deref(),
            user_id: input.user_id,
            storage: storage_id.as_deref(),
            headers: &input.headers,
            created_at: now_millis(),
        },
    )
    .await?;

    txn.commit().await.map_err(crate::db::map_db_err)?;

    state.invalidate_record(input.stream_id, input.name);

    Ok(inserted)
}

/// Latest non-tombstoned record named `name` (spec.md §4.1, §4.4).
pub async fn latest_by_name(
    state: &AppState,
    stream_id: i64,
    name: &str,
) -> Result<Option<RecordRow>> {
    let cache_key = format!("record:{stream_id}:{name}");
    if let Some(r) = state.single_records_cache.get(&cache_key) {
        return Ok(Some(r));
    }
    let rows = records::find_by_name(stream_id, name).await?;
    let found = rows.into_iter().find(|r| !r.deleted);
    if let Some(ref r) = found {
        state.single_records_cache.set(cache_key, r.clone());
    }
    Ok(found)
}

/// `?i=k` single-index read; negative `k` counts back from the tip
/// (spec.md §4.4).
pub async fn by_index(stream_id: i64, index: i64) -> Result<Option<RecordRow>> {
    let resolved = if index < 0 {
        let total = records::count(stream_id).await?;
        let actual = total + index;
        if actual < 0 {
            return Ok(None);
        }
        actual
    } else {
        index
    };
    records::find_by_index(stream_id, resolved).await
}

/// `?i=a:b` range read; `a`/`b` may be negative, resolved against the
/// current record count the same way `by_index` resolves a lone negative
/// index (spec.md §4.4).
pub async fn by_range(stream_id: i64, start: i64, end: i64) -> Result<Vec<RecordRow>> {
    let total = records::count(stream_id).await?;
    let resolve = |i: i64| -> i64 {
        if i < 0 {
            total + i
        } else {
            i
        }
    };
    let start = resolve(start).max(0);
    let end = resolve(end).min(total);
    records::find_range(stream_id, start, end).await
}

fn dedup_latest_per_name(rows: Vec<RecordRow>) -> Vec<RecordRow> {
    use std::collections::HashMap;
    let mut by_name: HashMap<String, RecordRow> = HashMap::new();
    for row in rows {
        by_name
            .entry(row.name.clone())
            .and_modify(|existing| {
                if row.index > existing.index {
                    *existing = row.clone();
                }
            })
            .or_insert(row);
    }
    let mut out: Vec<RecordRow> = by_name.into_values().collect();
    out.sort_by_key(|r| r.index);
    out
}

/// Paginated list over a single stream (spec.md §4.4): `limit`/`after`
/// (negative `after` resolves the same way as a negative index), optional
/// `unique` dedup keeping only the highest index per name.
pub async fn list(
    state: &AppState,
    stream_id: i64,
    limit: Option<i64>,
    after: Option<i64>,
    unique: bool,
) -> Result<RecordListPage> {
    let cfg = crate::config::get_config();
    let limit = limit.unwrap_or(cfg.list_default_limit).min(cfg.list_max_limit).max(1);
    let after = after.unwrap_or(-1);

    let cache_key = format!("list:{stream_id}:{limit}:{after}:{unique}");
    if let Some(page) = state.record_lists_cache.get(&cache_key) {
        return Ok(page);
    }

    let total = records::count(stream_id).await?;
    let after_resolved = if after < 0 { total + after } else { after };

    let rows = records::list_after(stream_id, after_resolved, limit + 1).await?;
    let has_more = rows.len() as i64 > limit;
    let mut rows: Vec<RecordRow> = rows.into_iter().take(limit as usize).collect();
    if unique {
        rows = dedup_latest_per_name(rows);
    }
    rows.retain(|r| !r.deleted);

    let page = RecordListPage {
        records: rows,
        total,
        has_more,
    };
    state.record_lists_cache.set(cache_key, page.clone());
    Ok(page)
}

/// Recursive list across a stream and every descendant, ordered by
/// `created_at` ascending (spec.md §4.4). Permission filtering happens in
/// the caller, which has the requester's identity.
pub async fn list_recursive(stream_ids: &[i64]) -> Result<Vec<RecordRow>> {
    records::list_all_for_streams_ordered_by_created_at(stream_ids).await
}

/// Soft-delete: appends a tombstone record named `<name>.deleted.<ts>`
/// whose content records the deletion (spec.md §4.5). The original row and
/// the hash chain are left untouched.
pub async fn soft_delete(
    state: &AppState,
    stream_id: i64,
    stream_path: &str,
    pod_name: &str,
    name: &str,
    deleted_by: &str,
) -> Result<RecordRow> {
    let existing = latest_by_name(state, stream_id, name)
        .await?
        .ok_or_else(|| Error::RecordNotFound(name.to_string()))?;

    let deleted_at = now_millis();
    let tombstone_name = format!("{name}.deleted.{deleted_at}");
    let content = serde_json::json!({
        "deleted": true,
        "originalName": name,
        "deletedAt": deleted_at,
        "deletedBy": deleted_by,
    });

    let record = append(
        state,
        None,
        AppendInput {
            stream_id,
            stream_path,
            pod_name,
            name: &tombstone_name,
            content: serde_json::to_vec(&content).unwrap_or_default(),
            content_type: "application/json".to_string(),
            is_binary: false,
            user_id: deleted_by,
            headers: serde_json::json!({}),
            ext: "json",
        },
    )
    .await?;

    table_mark_deleted(stream_id, &existing.name, existing.index).await?;
    state.invalidate_record(stream_id, name);

    Ok(record)
}

async fn table_mark_deleted(stream_id: i64, name: &str, index: i64) -> Result<()> {
    use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

    use crate::table::entity::records::{ActiveModel, Column, Entity};

    let _guard = write_lock().await;
    let client = client().await;
    let Some(model) = Entity::find()
        .filter(Column::StreamId.eq(stream_id))
        .filter(Column::Name.eq(name))
        .filter(Column::Index.eq(index))
        .one(client)
        .await
        .map_err(crate::db::map_db_err)?
    else {
        return Ok(());
    };
    let mut active: ActiveModel = model.into();
    active.deleted = Set(true);
    active.update(client).await.map_err(crate::db::map_db_err)?;
    Ok(())
}

/// Purge (spec.md §4.5): scrubs content for every row with `name`,
/// preserving `hash` so chain verification still succeeds, and removes the
/// backing blob(s) when content was stored externally.
pub async fn purge(
    state: &AppState,
    stream_id: i64,
    stream_path: &str,
    pod_name: &str,
    name: &str,
    storage: Option<&(dyn StorageAdapter + Send + Sync)>,
) -> Result<()> {
    let rows = records::find_by_name(stream_id, name).await?;
    if rows.is_empty() {
        return Err(Error::RecordNotFound(name.to_string()));
    }

    if let Some(adapter) = storage {
        for row in &rows {
            if let Some(storage_id) = &row.storage {
                let ext = row
                    .content_type
                    .rsplit('/')
                    .next()
                    .unwrap_or("bin")
                    .to_string();
                adapter
                    .delete(pod_name, stream_path, name, storage_id, &ext, true)
                    .await?;
            }
        }
    }

    records::purge_by_name(stream_id, name, rows).await?;
    state.invalidate_record(stream_id, name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_highest_index_per_name() {
        let mk = |name: &str, index: i64| RecordRow {
            id: index,
            stream_id: 1,
            index,
            content: vec![],
            content_type: "text/plain".into(),
            is_binary: false,
            size: 0,
            name: name.into(),
            path: format!("/{name}"),
            content_hash: "h".into(),
            hash: "h".into(),
            previous_hash: None,
            user_id: "alice".into(),
            storage: None,
            headers: serde_json::json!({}),
            deleted: false,
            purged: false,
            created_at: index,
        };
        let rows = vec![mk("a", 0), mk("a", 2), mk("b", 1), mk("a", 1)];
        let deduped = dedup_latest_per_name(rows);
        assert_eq!(deduped.len(), 2);
        let a = deduped.iter().find(|r| r.name == "a").unwrap();
        assert_eq!(a.index, 2);
    }
}
