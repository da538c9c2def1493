use crate::core::{domain::UserId, errors::StoreError};

#[async_trait::async_trait]
pub trait PermissionOracle: std::fmt::Debug + Send + Sync {
    async fn has_capability(&self, user_id: UserId, capability: &str) -> Result<bool, StoreError>;
}
