use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{future, stream, StreamExt};

use crate::config::Config;
use crate::error::AppError;
use crate::model::{BatchReport, NormalizedMessage, SkipReason, SkippedMessage};
use crate::providers::provider::{MailService, MessageRef, SearchCriteria};
use crate::providers::search::PaginatedSearcher;
use crate::services::normalizer::MessageNormalizer;

/// Shared stop signal. Once tripped no new fetch is started.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Search, then fetch and normalize every match with bounded concurrency.
pub struct Pipeline {
    searcher: PaginatedSearcher,
    normalizer: Arc<MessageNormalizer>,
    criteria: SearchCriteria,
    remove_quoted: bool,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        service: Arc<dyn MailService>,
        normalizer: Arc<MessageNormalizer>,
        config: &Config,
    ) -> Self {
        Self {
            searcher: PaginatedSearcher::new(service),
            normalizer,
            criteria: SearchCriteria {
                mailbox: config.mailbox.clone(),
                query: config.query.clone(),
                max_results: config.max_results,
            },
            remove_quoted: config.remove_quoted,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Records come back in search order. A failed search or an auth failure
    /// on any fetch aborts the run; other per-message failures are skipped.
    pub async fn run(&self, cancel: &CancellationFlag) -> Result<BatchReport, AppError> {
        let refs = self.searcher.search(&self.criteria).await?;
        tracing::info!(matches = refs.len(), "Search complete");

        let mut report = BatchReport::default();
        let mut outcomes = pin!(stream::iter(refs)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|message| self.process(message))
            .buffered(self.concurrency));

        while let Some((id, outcome)) = outcomes.next().await {
            match outcome {
                Ok(record) => report.messages.push(record),
                Err(e) if e.is_fatal() => {
                    tracing::error!(%id, error = %e, "Aborting run");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(%id, error = %e, "Skipping message");
                    report.skipped.push(skipped(id, &e));
                }
            }
        }

        if cancel.is_cancelled() {
            tracing::warn!(completed = report.messages.len(), "Run cancelled");
        }
        tracing::info!(
            normalized = report.messages.len(),
            skipped = report.skipped.len(),
            "Run finished"
        );
        Ok(report)
    }

    async fn process(&self, message: MessageRef) -> (String, Result<NormalizedMessage, AppError>) {
        let outcome = self.fetch_and_normalize(&message.id).await;
        (message.id, outcome)
    }

    async fn fetch_and_normalize(&self, id: &str) -> Result<NormalizedMessage, AppError> {
        let raw = self.searcher.fetch_raw(&self.criteria.mailbox, id).await?;

        let normalizer = Arc::clone(&self.normalizer);
        let remove_quoted = self.remove_quoted;
        tokio::task::spawn_blocking(move || normalizer.normalize(&raw, remove_quoted))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("normalize task failed: {}", e)))?
    }
}

fn skipped(id: String, error: &AppError) -> SkippedMessage {
    let reason = match error {
        AppError::NotFound(_) => SkipReason::NotFound,
        AppError::MalformedMessage { .. } => SkipReason::MalformedMessage,
        AppError::Transport(_) => SkipReason::TransportError,
        _ => SkipReason::Internal,
    };
    SkippedMessage {
        id,
        reason,
        detail: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reasons() {
        let s = skipped("a".into(), &AppError::NotFound("a".into()));
        assert_eq!(s.reason, SkipReason::NotFound);

        let s = skipped("b".into(), &AppError::Transport("timed out".into()));
        assert_eq!(s.reason, SkipReason::TransportError);
        assert!(s.detail.contains("timed out"));

        let s = skipped(
            "c".into(),
            &AppError::MalformedMessage { id: "c".into(), reason: "x".into() },
        );
        assert_eq!(s.reason, SkipReason::MalformedMessage);
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::default();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
