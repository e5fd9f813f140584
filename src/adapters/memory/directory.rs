//! In-memory stand-ins for the identity and catalog services.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::chat::{ProductSummary, ProfileSummary};
use crate::domain::foundation::{DomainError, ErrorCode, ProductId, UserId};
use crate::ports::{ProductCatalog, ProfileReader};

/// Profiles keyed by user id, with a switch to simulate an outage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileDirectory {
    profiles: Arc<RwLock<HashMap<UserId, ProfileSummary>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: ProfileSummary) {
        self.profiles.write().await.insert(profile.id.clone(), profile);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileReader for InMemoryProfileDirectory {
    async fn find_summaries(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, ProfileSummary>, DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                "profile service unavailable",
            ));
        }
        let profiles = self.profiles.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| profiles.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

/// Products keyed by id, with a switch to simulate an outage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductSummary>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product: ProductSummary) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductSummary>, DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                "catalog service unavailable",
            ));
        }
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn profile_lookup_omits_unknown_ids() {
        let directory = InMemoryProfileDirectory::new();
        let bea = UserId::new("B1").unwrap();
        directory.insert(ProfileSummary::new(bea.clone(), "Bea")).await;

        let found = directory
            .find_summaries(&[bea.clone(), UserId::new("ghost").unwrap()])
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[&bea].display_name, "Bea");
    }

    #[tokio::test]
    async fn outage_switch_fails_lookups() {
        let catalog = InMemoryProductCatalog::new();
        catalog.set_unavailable(true);

        let result = catalog.find_products(&[ProductId::new("P1").unwrap()]).await;

        assert!(result.is_err());
    }
}
