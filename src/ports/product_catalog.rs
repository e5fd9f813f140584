//! ProductCatalog port - product data owned by the catalog service.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::chat::ProductSummary;
use crate::domain::foundation::{DomainError, ProductId};

/// Batch lookup of product name and recorded seller.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Summaries for the given ids. Unknown products are absent.
    async fn find_products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductSummary>, DomainError>;
}
