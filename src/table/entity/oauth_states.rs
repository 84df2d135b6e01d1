use sea_orm::entity::prelude::*;

/// Opaque to the core (spec.md §3): holds the short-lived CSRF/PKCE state
/// the external OAuth identity provider round-trips through the
/// out-of-scope client-registration endpoints (spec.md §1).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub state: String,
    pub redirect_uri: String,
    pub expires_at: i64,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
