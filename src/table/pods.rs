// Pod table access, grounded on the teacher's `infra/src/table/organizations.rs`.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Schema, Set, ConnectionTrait};

use super::entity::pods::{ActiveModel, Column, Entity, Model};
use crate::db::{client, map_db_err, write_lock};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct PodRecord {
    pub name: String,
    pub owner_user_id: String,
    pub metadata: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Model> for PodRecord {
    fn from(m: Model) -> Self {
        Self {
            name: m.name,
            owner_user_id: m.owner_user_id,
            metadata: serde_json::from_str(&m.metadata).unwrap_or(serde_json::Value::Null),
            created_at: m.created_at,
            updated_at: m.updated_at,
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

pub async fn create(name: &str, owner_user_id: &str, now: i64) -> Result<PodRecord> {
    let _lock = write_lock().await;
    let client = client().await;
    let model = ActiveModel {
        name: Set(name.to_string()),
        owner_user_id: Set(owner_user_id.to_string()),
        metadata: Set("{}".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Entity::insert(model).exec(client).await.map_err(map_db_err)?;
    get(name).await
}

pub async fn get(name: &str) -> Result<PodRecord> {
    let client = client().await;
    let model = Entity::find()
        .filter(Column::Name.eq(name))
        .one(client)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| crate::errors::Error::PodNotFound(name.to_string()))?;
    Ok(model.into())
}

pub async fn try_get(name: &str) -> Result<Option<PodRecord>> {
    let client = client().await;
    let model = Entity::find()
        .filter(Column::Name.eq(name))
        .one(client)
        .await
        .map_err(map_db_err)?;
    Ok(model.map(PodRecord::from))
}

pub async fn delete(name: &str) -> Result<()> {
    let _lock = write_lock().await;
    let client = client().await;
    Entity::delete_many()
        .filter(Column::Name.eq(name))
        .exec(client)
        .await
        .map_err(map_db_err)?;
    Ok(())
}

pub async fn list_for_owner(owner_user_id: &str) -> Result<Vec<PodRecord>> {
    let client = client().await;
    let models = Entity::find()
        .filter(Column::OwnerUserId.eq(owner_user_id))
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(PodRecord::from).collect())
}
