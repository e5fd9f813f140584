//! Chat command and query handlers.

mod list_conversations;
mod list_messages;
mod resolve_conversation;
mod send_message;

pub use list_conversations::{ListConversationsHandler, ListConversationsQuery};
pub use list_messages::{ListMessagesHandler, ListMessagesQuery};
pub use resolve_conversation::{
    ResolveConversationCommand, ResolveConversationHandler, ResolvedConversation,
};
pub use send_message::{SendMessageCommand, SendMessageHandler};

use std::collections::HashMap;

use crate::domain::chat::ProfileSummary;
use crate::domain::foundation::UserId;
use crate::ports::ProfileReader;

/// Batch-resolves display info for `ids`, one call per page.
///
/// Never fails: ids the reader cannot resolve, or every id when the reader is
/// unavailable, map to the `Unknown` placeholder.
pub(crate) async fn lookup_profiles(
    reader: &dyn ProfileReader,
    ids: &[UserId],
) -> HashMap<UserId, ProfileSummary> {
    let mut found = match reader.find_summaries(ids).await {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(error = %err, count = ids.len(), "profile lookup failed, using placeholders");
            HashMap::new()
        }
    };

    for id in ids {
        if !found.contains_key(id) {
            found.insert(id.clone(), ProfileSummary::unknown(id.clone()));
        }
    }
    found
}

/// Distinct ids in first-seen order.
pub(crate) fn distinct<'a, T, I>(items: I) -> Vec<T>
where
    T: Clone + Eq + std::hash::Hash + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert((*item).clone()))
        .cloned()
        .collect()
}
