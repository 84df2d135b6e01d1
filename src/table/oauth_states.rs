// Opaque OAuth state storage (spec.md §3); the identity-provider flow
// itself is out of core scope (spec.md §1).

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Schema, Set, ConnectionTrait};

use super::entity::oauth_states::{ActiveModel, Column, Entity, Model};
use crate::db::{client, map_db_err, write_lock};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct OAuthStateRecord {
    pub state: String,
    pub redirect_uri: String,
    pub expires_at: i64,
}

impl From<Model> for OAuthStateRecord {
    fn from(m: Model) -> Self {
        Self {
            state: m.state,
            redirect_uri: m.redirect_uri,
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

pub async fn insert(state: &str, redirect_uri: &str, expires_at: i64, now: i64) -> Result<()> {
    let _lock = write_lock().await;
    let client = client().await;
    let active = ActiveModel {
        state: Set(state.to_string()),
        redirect_uri: Set(redirect_uri.to_string()),
        expires_at: Set(expires_at),
        created_at: Set(now),
    };
    Entity::insert(active).exec(client).await.map_err(map_db_err)?;
    Ok(())
}

pub async fn take(state: &str) -> Result<Option<OAuthStateRecord>> {
    let _lock = write_lock().await;
    let client = client().await;
    let model = Entity::find()
        .filter(Column::State.eq(state))
        .one(client)
        .await
        .map_err(map_db_err)?;
    if model.is_some() {
        Entity::delete_many()
            .filter(Column::State.eq(state))
            .exec(client)
            .await
            .map_err(map_db_err)?;
    }
    Ok(model.map(OAuthStateRecord::from))
}
