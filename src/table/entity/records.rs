use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub stream_id: i64,
    pub index: i64,
    /// Empty when `storage` is set: content lives externally (spec.md §4.7).
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
    /// JSON array of `{name, value}` for the server's allow-listed headers.
    pub headers: String,
    pub deleted: bool,
    pub purged: bool,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
