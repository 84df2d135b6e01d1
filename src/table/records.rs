// Record table access (spec.md §3, §4.3, §4.4, §4.5).
//
// The append path's serialization point (spec.md §4.3 step 3, §5) is
// implemented here as `SELECT ... FOR UPDATE` inside the caller's
// transaction for postgres/mysql backends; sqlite instead relies on
// `db::write_lock()` held by the caller around the whole append.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Schema, Set, ConnectionTrait, Statement, DbBackend,
};

use super::entity::records::{ActiveModel, Column, Entity, Model};
use crate::db::{client, map_db_err};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct RecordRow {
    pub id: i64,
    pub stream_id: i64,
    pub index: i64,
    pub content: Vec<u8>,
    pub content_type: String,
    pub is_binary: bool,
    pub size: i64,
    pub name: String,
    pub path: String,
    pub content_hash: String,
    pub hash: String,
    pub previous_hash: Option<String>,
    pub user_id: String,
    pub storage: Option<String>,
    pub headers: serde_json::Value,
    pub deleted: bool,
    pub purged: bool,
    pub created_at: i64,
}

impl From<Model> for RecordRow {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            stream_id: m.stream_id,
            index: m.index,
            content: m.content,
            content_type: m.content_type,
            is_binary: m.is_binary,
            size: m.size,
            name: m.name,
            path: m.path,
            content_hash: m.content_hash,
            hash: m.hash,
            previous_hash: m.previous_hash,
            user_id: m.user_id,
            storage: m.storage,
            headers: serde_json::from_str(&m.headers).unwrap_or(serde_json::Value::Null),
            deleted: m.deleted,
            purged: m.purged,
            created_at: m.created_at,
        }
    }
}

pub async fn create_table() -> Result<()> {
    let client = client().await;
    let builder = client.get_database_backend();
    let schema = Schema::new(builder);
    let stmt = schema.create_table_from_entity(Entity).if_not_exists().take();
    client.execute(builder.build(&stmt)).await.map_err(map_db_err)?;
    Ok(())
}

/// The row lock that makes concurrent appenders to the same stream
/// serialize (spec.md §4.3 step 3, §5). On sqlite this degenerates to a
/// plain read since the caller already holds the process-wide write lock.
pub async fn lock_latest(txn: &DatabaseTransaction, stream_id: i64) -> Result<Option<RecordRow>> {
    let backend = txn.get_database_backend();
    if backend == DbBackend::Sqlite {
        let model = Entity::find()
            .filter(Column::StreamId.eq(stream_id))
            .order_by(Column::Index, Order::Desc)
            .one(txn)
            .await
            .map_err(map_db_err)?;
        return Ok(model.map(RecordRow::from));
    }

    let sql = match backend {
        DbBackend::Postgres => {
            "SELECT * FROM records WHERE stream_id = $1 ORDER BY \"index\" DESC LIMIT 1 FOR UPDATE"
        }
        _ => "SELECT * FROM records WHERE stream_id = ? ORDER BY `index` DESC LIMIT 1 FOR UPDATE",
    };
    let stmt = Statement::from_sql_and_values(backend, sql, [stream_id.into()]);
    let model = Entity::find()
        .from_raw_sql(stmt)
        .one(txn)
        .await
        .map_err(map_db_err)?;
    Ok(model.map(RecordRow::from))
}

#[allow(clippy::too_many_arguments)]
pub struct NewRecord<'a> {
    pub stream_id: i64,
    pub index: i64,
    pub content: Vec<u8>,
    pub content_type: &'a str,
    pub is_binary: bool,
    pub size: i64,
    pub name: &'a str,
    pub path: &'a str,
    pub content_hash: &'a str,
    pub hash: &'a str,
    pub previous_hash: Option<&'a str>,
    pub user_id: &'a str,
    pub storage: Option<&'a str>,
    pub headers: &'a serde_json::Value,
    pub created_at: i64,
}

pub async fn insert(txn: &DatabaseTransaction, new: NewRecord<'_>) -> Result<RecordRow> {
    let model = ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        stream_id: Set(new.stream_id),
        index: Set(new.index),
        content: Set(new.content),
        content_type: Set(new.content_type.to_string()),
        is_binary: Set(new.is_binary),
        size: Set(new.size),
        name: Set(new.name.to_string()),
        path: Set(new.path.to_string()),
        content_hash: Set(new.content_hash.to_string()),
        hash: Set(new.hash.to_string()),
        previous_hash: Set(new.previous_hash.map(|s| s.to_string())),
        user_id: Set(new.user_id.to_string()),
        storage: Set(new.storage.map(|s| s.to_string())),
        headers: Set(new.headers.to_string()),
        deleted: Set(false),
        purged: Set(false),
        created_at: Set(new.created_at),
    };
    let inserted = model.insert(txn).await.map_err(map_db_err)?;
    Ok(inserted.into())
}

/// All records with `name`, newest index first (spec.md §4.4, §4.5).
pub async fn find_by_name(stream_id: i64, name: &str) -> Result<Vec<RecordRow>> {
    let client = client().await;
    let models = Entity::find()
        .filter(Column::StreamId.eq(stream_id))
        .filter(Column::Name.eq(name))
        .order_by(Column::Index, Order::Desc)
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(RecordRow::from).collect())
}

pub async fn find_by_index(stream_id: i64, index: i64) -> Result<Option<RecordRow>> {
    let client = client().await;
    let model = Entity::find()
        .filter(Column::StreamId.eq(stream_id))
        .filter(Column::Index.eq(index))
        .one(client)
        .await
        .map_err(map_db_err)?;
    Ok(model.map(RecordRow::from))
}

pub async fn find_range(stream_id: i64, start_inclusive: i64, end_exclusive: i64) -> Result<Vec<RecordRow>> {
    if end_exclusive <= start_inclusive {
        return Ok(vec![]);
    }
    let client = client().await;
    let models = Entity::find()
        .filter(Column::StreamId.eq(stream_id))
        .filter(Column::Index.gte(start_inclusive))
        .filter(Column::Index.lt(end_exclusive))
        .order_by_asc(Column::Index)
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(RecordRow::from).collect())
}

pub async fn list_after(stream_id: i64, after_index: i64, limit: i64) -> Result<Vec<RecordRow>> {
    let client = client().await;
    let models = Entity::find()
        .filter(Column::StreamId.eq(stream_id))
        .filter(Column::Index.gt(after_index))
        .order_by_asc(Column::Index)
        .limit(limit as u64)
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(RecordRow::from).collect())
}

pub async fn list_all_ordered_by_index(stream_id: i64) -> Result<Vec<RecordRow>> {
    let client = client().await;
    let models = Entity::find()
        .filter(Column::StreamId.eq(stream_id))
        .order_by_asc(Column::Index)
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(RecordRow::from).collect())
}

pub async fn list_all_for_streams_ordered_by_created_at(stream_ids: &[i64]) -> Result<Vec<RecordRow>> {
    if stream_ids.is_empty() {
        return Ok(vec![]);
    }
    let client = client().await;
    let models = Entity::find()
        .filter(Column::StreamId.is_in(stream_ids.to_vec()))
        .filter(Column::Deleted.eq(false))
        .filter(Column::Purged.eq(false))
        .order_by_asc(Column::CreatedAt)
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(RecordRow::from).collect())
}

pub async fn delete_all_for_streams(stream_ids: &[i64]) -> Result<()> {
    if stream_ids.is_empty() {
        return Ok(());
    }
    let client = client().await;
    Entity::delete_many()
        .filter(Column::StreamId.is_in(stream_ids.to_vec()))
        .exec(client)
        .await
        .map_err(map_db_err)?;
    Ok(())
}

pub async fn count(stream_id: i64) -> Result<i64> {
    let client = client().await;
    let n = Entity::find()
        .filter(Column::StreamId.eq(stream_id))
        .count(client)
        .await
        .map_err(map_db_err)?;
    Ok(n as i64)
}

/// Overwrite every row with `name` in place for §4.5 purge, preserving
/// `hash` so chain verification still succeeds.
pub async fn purge_by_name(stream_id: i64, name: &str, rows: Vec<RecordRow>) -> Result<()> {
    let client = client().await;
    for row in rows {
        let Some(model) = Entity::find_by_id(row.id).one(client).await.map_err(map_db_err)? else {
            continue;
        };
        if model.stream_id != stream_id || model.name != name {
            continue;
        }
        let mut active: ActiveModel = model.into();
        active.content = Set(vec![]);
        active.deleted = Set(true);
        active.purged = Set(true);
        active.content_hash = Set("purged".to_string());
        active.size = Set(0);
        active.storage = Set(None);
        active.update(client).await.map_err(map_db_err)?;
    }
    Ok(())
}
