// Stream table access (spec.md §3, §4.2).

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Schema, Set,
    ConnectionTrait,
};

use super::entity::streams::{ActiveModel, Column, Entity, Model};
use crate::db::{client, map_db_err, write_lock};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub id: i64,
    pub pod_name: String,
    pub name: String,
    pub path: String,
    pub parent_id: Option<i64>,
    pub user_id: String,
    pub access_permission: String,
    pub metadata: serde_json::Value,
    pub has_schema: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Model> for StreamRecord {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            pod_name: m.pod_name,
            name: m.name,
            path: m.path,
            parent_id: m.parent_id,
            user_id: m.user_id,
            access_permission: m.access_permission,
            metadata: serde_json::from_str(&m.metadata).unwrap_or(serde_json::Value::Null),
            has_schema: m.has_schema,
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

pub struct NewStream<'a> {
    pub pod_name: &'a str,
    pub parent_id: Option<i64>,
    pub name: &'a str,
    pub path: &'a str,
    pub user_id: &'a str,
    pub access_permission: &'a str,
    pub now: i64,
}

pub async fn insert(new: NewStream<'_>) -> Result<StreamRecord> {
    let _lock = write_lock().await;
    let client = client().await;
    let model = ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        pod_name: Set(new.pod_name.to_string()),
        parent_id: Set(new.parent_id),
        name: Set(new.name.to_string()),
        path: Set(new.path.to_string()),
        user_id: Set(new.user_id.to_string()),
        access_permission: Set(new.access_permission.to_string()),
        metadata: Set("{}".to_string()),
        has_schema: Set(false),
        created_at: Set(new.now),
        updated_at: Set(new.now),
    };
    let inserted = model.insert(client).await.map_err(map_db_err)?;
    Ok(inserted.into())
}

pub async fn get_by_id(id: i64) -> Result<Option<StreamRecord>> {
    let client = client().await;
    let model = Entity::find_by_id(id).one(client).await.map_err(map_db_err)?;
    Ok(model.map(StreamRecord::from))
}

pub async fn get_by_path(pod_name: &str, path: &str) -> Result<Option<StreamRecord>> {
    let client = client().await;
    let model = Entity::find()
        .filter(Column::PodName.eq(pod_name))
        .filter(Column::Path.eq(path))
        .one(client)
        .await
        .map_err(map_db_err)?;
    Ok(model.map(StreamRecord::from))
}

pub async fn list_children(pod_name: &str, parent_id: Option<i64>) -> Result<Vec<StreamRecord>> {
    let client = client().await;
    let mut query = Entity::find().filter(Column::PodName.eq(pod_name));
    query = match parent_id {
        Some(id) => query.filter(Column::ParentId.eq(id)),
        None => query.filter(Column::ParentId.is_null()),
    };
    let models = query
        .order_by_asc(Column::Name)
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(StreamRecord::from).collect())
}

pub async fn list_descendants(pod_name: &str, path_prefix: &str) -> Result<Vec<StreamRecord>> {
    let client = client().await;
    let like = format!("{path_prefix}/%");
    let models = Entity::find()
        .filter(Column::PodName.eq(pod_name))
        .filter(
            Condition::any()
                .add(Column::Path.eq(path_prefix))
                .add(Column::Path.like(like)),
        )
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(StreamRecord::from).collect())
}

pub async fn list_all_for_pod(pod_name: &str) -> Result<Vec<StreamRecord>> {
    let client = client().await;
    let models = Entity::find()
        .filter(Column::PodName.eq(pod_name))
        .all(client)
        .await
        .map_err(map_db_err)?;
    Ok(models.into_iter().map(StreamRecord::from).collect())
}

pub async fn set_has_schema(id: i64, has_schema: bool, now: i64) -> Result<()> {
    let _lock = write_lock().await;
    let client = client().await;
    let Some(model) = Entity::find_by_id(id).one(client).await.map_err(map_db_err)? else {
        return Ok(());
    };
    let mut active: ActiveModel = model.into();
    active.has_schema = Set(has_schema);
    active.updated_at = Set(now);
    active.update(client).await.map_err(map_db_err)?;
    Ok(())
}

pub async fn set_access_permission(id: i64, access_permission: &str, now: i64) -> Result<()> {
    let _lock = write_lock().await;
    let client = client().await;
    let Some(model) = Entity::find_by_id(id).one(client).await.map_err(map_db_err)? else {
        return Ok(());
    };
    let mut active: ActiveModel = model.into();
    active.access_permission = Set(access_permission.to_string());
    active.updated_at = Set(now);
    active.update(client).await.map_err(map_db_err)?;
    Ok(())
}

pub async fn delete_many(ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let _lock = write_lock().await;
    let client = client().await;
    Entity::delete_many()
        .filter(Column::Id.is_in(ids.to_vec()))
        .exec(client)
        .await
        .map_err(map_db_err)?;
    Ok(())
}

pub async fn delete_all_for_pod(pod_name: &str) -> Result<()> {
    let _lock = write_lock().await;
    let client = client().await;
    Entity::delete_many()
        .filter(Column::PodName.eq(pod_name))
        .exec(client)
        .await
        .map_err(map_db_err)?;
    Ok(())
}
