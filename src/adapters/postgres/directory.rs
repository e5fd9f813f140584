//! Read-only lookups against marketplace-owned tables.
//!
//! `profiles (id, display_name, store_name)` and `products (id, name, seller_id)`
//! belong to the identity and catalog services; this crate never writes them
//! and its migrations do not create them.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::chat::{ProductSummary, ProfileSummary};
use crate::domain::foundation::{DomainError, ProductId, UserId};
use crate::ports::{ProductCatalog, ProfileReader};

use super::conversation_repository::db_error;

/// Batch profile lookups from the `profiles` table.
#[derive(Clone)]
pub struct PostgresProfileReader {
    pool: PgPool,
}

impl PostgresProfileReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileReader for PostgresProfileReader {
    async fn find_summaries(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, ProfileSummary>, DomainError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, display_name, store_name
            FROM profiles
            WHERE id = ANY($1)
            "#,
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load profiles", e))?;

        let mut profiles = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .try_get("id")
                .map_err(|e| db_error("Failed to get id", e))?;
            let display_name: String = row
                .try_get("display_name")
                .map_err(|e| db_error("Failed to get display_name", e))?;
            let store_name: Option<String> = row
                .try_get("store_name")
                .map_err(|e| db_error("Failed to get store_name", e))?;

            let Ok(user_id) = UserId::new(id) else {
                continue;
            };
            let mut profile = ProfileSummary::new(user_id.clone(), display_name);
            if let Some(store_name) = store_name.filter(|s| !s.trim().is_empty()) {
                profile = profile.with_store_name(store_name);
            }
            profiles.insert(user_id, profile);
        }
        Ok(profiles)
    }
}

/// Batch product lookups from the `products` table.
#[derive(Clone)]
pub struct PostgresProductCatalog {
    pool: PgPool,
}

impl PostgresProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PostgresProductCatalog {
    async fn find_products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductSummary>, DomainError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, name, seller_id
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load products", e))?;

        let mut products = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .try_get("id")
                .map_err(|e| db_error("Failed to get id", e))?;
            let name: String = row
                .try_get("name")
                .map_err(|e| db_error("Failed to get name", e))?;
            let seller_id: String = row
                .try_get("seller_id")
                .map_err(|e| db_error("Failed to get seller_id", e))?;

            match (ProductId::new(id), UserId::new(seller_id)) {
                (Ok(id), Ok(seller_id)) => {
                    products.insert(
                        id.clone(),
                        ProductSummary {
                            id,
                            name,
                            seller_id,
                        },
                    );
                }
                _ => tracing::warn!("skipping product row with empty id or seller"),
            }
        }
        Ok(products)
    }
}
