// Fixed-window rate limit bucket storage, the "postgres" adapter of
// spec.md §4.11 (the in-memory sliding-window adapter lives entirely in
// `crate::rate_limit` and never touches this table).

use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Schema, Set, ConnectionTrait,
};

use super::entity::rate_limits::{ActiveModel, Column, Entity, Model};
use crate::db::{client, map_db_err, write_lock};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct Bucket {
    pub id: i64,
    pub count: i64,
    pub window_start: i64,
    pub window_end: i64,
}

impl From<Model> for Bucket {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            count: m.count,
            window_start: m.window_start,
            window_end: m.window_end,
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

/// Atomically increments the bucket for `(identifier, action, window_start)`,
/// creating it if absent. Returns the post-increment count.
pub async fn increment(
    identifier: &str,
    action: &str,
    window_start: i64,
    window_end: i64,
) -> Result<i64> {
    let _lock = write_lock().await;
    let client = client().await;
    let existing = Entity::find()
        .filter(Column::Identifier.eq(identifier))
        .filter(Column::Action.eq(action))
        .filter(Column::WindowStart.eq(window_start))
        .one(client)
        .await
        .map_err(map_db_err)?;

    match existing {
        Some(model) => {
            let new_count = model.count + 1;
            let mut active: ActiveModel = model.into();
            active.count = Set(new_count);
            active.update(client).await.map_err(map_db_err)?;
            Ok(new_count)
        }
        None => {
            let active = ActiveModel {
                id: sea_orm::ActiveValue::NotSet,
                identifier: Set(identifier.to_string()),
                action: Set(action.to_string()),
                count: Set(1),
                window_start: Set(window_start),
                window_end: Set(window_end),
            };
            active.insert(client).await.map_err(map_db_err)?;
            Ok(1)
        }
    }
}

pub async fn get(identifier: &str, action: &str, window_start: i64) -> Result<Option<Bucket>> {
    let client = client().await;
    let model = Entity::find()
        .filter(Column::Identifier.eq(identifier))
        .filter(Column::Action.eq(action))
        .filter(Column::WindowStart.eq(window_start))
        .one(client)
        .await
        .map_err(map_db_err)?;
    Ok(model.map(Bucket::from))
}

pub async fn cleanup_older_than(cutoff: i64) -> Result<u64> {
    let _lock = write_lock().await;
    let client = client().await;
    let res = Entity::delete_many()
        .filter(Column::WindowEnd.lt(cutoff))
        .exec(client)
        .await
        .map_err(map_db_err)?;
    Ok(res.rows_affected)
}
