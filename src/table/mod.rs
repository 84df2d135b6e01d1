pub mod entity;
pub mod oauth_states;
pub mod pods;
pub mod rate_limits;
pub mod records;
pub mod sessions;
pub mod streams;

use crate::errors::Result;

pub async fn create_all_tables() -> Result<()> {
    pods::create_table().await?;
    streams::create_table().await?;
    records::create_table().await?;
    rate_limits::create_table().await?;
    sessions::create_table().await?;
    oauth_states::create_table().await?;
    Ok(())
}
