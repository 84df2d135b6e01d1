use sea_orm::entity::prelude::*;

/// Opaque to the core (spec.md §3): the session/JWT issuance subsystem is an
/// external collaborator. This table exists only so the core can store the
/// handful of fields it is handed (`user_id`, scope, expiry) without
/// depending on that subsystem's schema.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token_id: String,
    pub user_id: String,
    pub pod_scope: Option<String>,
    pub expires_at: i64,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
