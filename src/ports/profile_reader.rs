//! ProfileReader port - display projections from the identity service.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::chat::ProfileSummary;
use crate::domain::foundation::{DomainError, UserId};

/// Batch lookup of user display info.
///
/// Callers substitute `ProfileSummary::unknown` for missing ids and for a
/// failed call; a profile outage never fails a listing.
#[async_trait]
pub trait ProfileReader: Send + Sync {
    /// Summaries for the given ids. Unknown ids are simply absent.
    async fn find_summaries(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, ProfileSummary>, DomainError>;
}
