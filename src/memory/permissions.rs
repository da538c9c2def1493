use std::collections::HashSet;

use dashmap::DashMap;

use crate::core::{domain::UserId, errors::StoreError, traits::permissions::PermissionOracle};

#[derive(Debug, Default)]
pub struct StaticPermissions {
    allow_all: bool,
    grants: DashMap<UserId, HashSet<String>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::default()
        }
    }

    pub fn grant(&self, user_id: UserId, capability: &str) {
        self.grants
            .entry(user_id)
            .or_default()
            .insert(capability.to_string());
    }
}

#[async_trait::async_trait]
impl PermissionOracle for StaticPermissions {
    async fn has_capability(&self, user_id: UserId, capability: &str) -> Result<bool, StoreError> {
        Ok(self.allow_all
            || self
                .grants
                .get(&user_id)
                .is_some_and(|grants| grants.contains(capability)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CAP_MANAGE_TEST_CASES, CAP_SUBMIT};

    #[tokio::test]
    async fn test_grants_are_per_user() {
        let permissions = StaticPermissions::new();
        permissions.grant(5, CAP_SUBMIT);

        assert!(permissions.has_capability(5, CAP_SUBMIT).await.unwrap());
        assert!(!permissions.has_capability(5, CAP_MANAGE_TEST_CASES).await.unwrap());
        assert!(!permissions.has_capability(6, CAP_SUBMIT).await.unwrap());
        assert!(
            StaticPermissions::allow_all()
                .has_capability(6, CAP_SUBMIT)
                .await
                .unwrap()
        );
    }
}
