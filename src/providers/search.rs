use std::sync::Arc;

use crate::error::AppError;
use super::provider::{MailService, MessageRef, RawMessage, SearchCriteria};

/// Largest page `users.messages.list` will return.
pub const MAX_PAGE_SIZE: u32 = 500;

pub struct PaginatedSearcher {
    service: Arc<dyn MailService>,
}

impl PaginatedSearcher {
    pub fn new(service: Arc<dyn MailService>) -> Self {
        Self { service }
    }

    /// Collect up to `max_results` refs, following continuation tokens.
    ///
    /// Any page failing fails the whole search; an empty mailbox is `Ok(vec![])`.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<MessageRef>, AppError> {
        let max = criteria.max_results as usize;
        tracing::info!(
            query = %criteria.query,
            mailbox = %criteria.mailbox,
            max_results = max,
            "Beginning search"
        );

        let mut results: Vec<MessageRef> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_size = (max - results.len()).min(MAX_PAGE_SIZE as usize) as u32;
            let page = self
                .service
                .list_messages(
                    &criteria.mailbox,
                    &criteria.query,
                    page_size,
                    page_token.as_deref(),
                )
                .await?;

            tracing::debug!(received = page.messages.len(), "Received page of messages");
            results.extend(page.messages);

            match page.next_page_token {
                Some(token) if results.len() < max => page_token = Some(token),
                _ => break,
            }
        }

        results.truncate(max);
        tracing::info!(total = results.len(), "Search finished");
        Ok(results)
    }

    pub async fn fetch_raw(&self, mailbox: &str, id: &str) -> Result<RawMessage, AppError> {
        self.service.get_raw_message(mailbox, id).await
    }
}
