//! Paginated search-and-fetch against the remote mail store.
//!
//! One page of a run lists up to `batch_size` message ids; each id is
//! then fetched in full, because matching needs both headers and body.
//! The loop stops when the store stops returning a continuation token or
//! when `max_pages` pages have been scanned — the page cap is the
//! engine's only backpressure bound against pathologically large
//! mailboxes.

use tracing::debug;

use crate::config::FetchBounds;
use crate::error::TransportError;
use crate::gmail::client::{FetchedMessage, MailStore};

/// Fetch every message matching `query`, page by page, message by
/// message, within `bounds`. Any transport failure aborts this run and
/// surfaces to the caller; there are no retries.
pub async fn fetch_all(
    store: &dyn MailStore,
    query: &str,
    bounds: FetchBounds,
) -> Result<Vec<FetchedMessage>, TransportError> {
    let batch_size = bounds.batch_size.max(1);
    let max_pages = bounds.max_pages.max(1);

    let mut messages = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = store
            .list(query, batch_size, page_token.as_deref())
            .await?;
        pages += 1;

        debug!(
            page = pages,
            ids = page.ids.len(),
            has_more = page.next_page_token.is_some(),
            "Fetched search page"
        );

        for id in &page.ids {
            messages.push(store.get(id).await?);
        }

        page_token = page.next_page_token;
        if page_token.is_none() || pages >= max_pages {
            break;
        }
    }

    Ok(messages)
}
