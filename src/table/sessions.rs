// Opaque session storage (spec.md §3); the core only ever reads `user_id`
// and `pod_scope` back out, never issues or refreshes tokens itself.

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Schema, Set, ConnectionTrait};

use super::entity::sessions::{ActiveModel, Column, Entity, Model};
use crate::db::{client, map_db_err, write_lock};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token_id: String,
    pub user_id: String,
    pub pod_scope: Option<String>,
    pub expires_at: i64,
}

impl From<Model> for SessionRecord {
    fn from(m: Model) -> Self {
        Self {
            token_id: m.token_id,
            user_id: m.user_id,
            pod_scope: m.pod_scope,
            expires_at: m.expires_at,
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

pub async fn upsert(
    token_id: &str,
    user_id: &str,
    pod_scope: Option<&str>,
    expires_at: i64,
    now: i64,
) -> Result<()> {
    let _lock = write_lock().await;
    let client = client().await;
    let active = ActiveModel {
        token_id: Set(token_id.to_string()),
        user_id: Set(user_id.to_string()),
        pod_scope: Set(pod_scope.map(|s| s.to_string())),
        expires_at: Set(expires_at),
        created_at: Set(now),
    };
    Entity::insert(active)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(Column::TokenId)
                .update_columns([Column::UserId, Column::PodScope, Column::ExpiresAt])
                .to_owned(),
        )
        .exec(client)
        .await
        .map_err(map_db_err)?;
    Ok(())
}

pub async fn get(token_id: &str) -> Result<Option<SessionRecord>> {
    let client = client().await;
    let model = Entity::find()
        .filter(Column::TokenId.eq(token_id))
        .one(client)
        .await
        .map_err(map_db_err)?;
    Ok(model.map(SessionRecord::from))
}

pub async fn delete(token_id: &str) -> Result<()> {
    let _lock = write_lock().await;
    let client = client().await;
    Entity::delete_many()
        .filter(Column::TokenId.eq(token_id))
        .exec(client)
        .await
        .map_err(map_db_err)?;
    Ok(())
}
