//! Background worker that applies queued click increments.
//!
//! Runs until every [`crate::domain::click_event::ClickSender`] is dropped, then finishes
//! the clicks still in the queue before returning. Server shutdown relies on this to
//! drain pending clicks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info};

use crate::application::services::DynLinkService;
use crate::domain::click_event::ClickEvent;

/// Retries after the first failed attempt.
const MAX_RETRIES: usize = 3;

pub async fn run_click_worker(
    mut rx: mpsc::Receiver<ClickEvent>,
    links: Arc<DynLinkService>,
    concurrency: usize,
) {
    let limiter = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    info!(concurrency, "Click worker started");

    while let Some(event) = rx.recv().await {
        let Ok(permit) = limiter.clone().acquire_owned().await else {
            break;
        };

        let links = links.clone();
        tasks.spawn(async move {
            let _permit = permit;
            apply_click(&links, &event).await;
        });

        while tasks.try_join_next().is_some() {}
    }

    while tasks.join_next().await.is_some() {}

    info!("Click worker stopped, queue drained");
}

async fn apply_click(links: &DynLinkService, event: &ClickEvent) {
    let strategy = ExponentialBackoff::from_millis(5)
        .max_delay(Duration::from_millis(200))
        .map(jitter)
        .take(MAX_RETRIES);

    let result = Retry::spawn(strategy, move || links.increment_click(&event.code)).await;

    match result {
        Ok(true) => debug!(code = %event.code, "Click recorded"),
        Ok(false) => debug!(code = %event.code, "Click for unknown code ignored"),
        Err(e) => {
            error!(code = %event.code, error = %e, "Failed to record click, dropping");
            metrics::counter!("click_increment_failures_total").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{LinkCacheTtl, LinkService};
    use crate::domain::click_event::ClickSender;
    use crate::domain::repositories::{LinkRepository, MockLinkRepository, StoreError};
    use crate::infrastructure::cache::NullCache;
    use crate::utils::code_generator::ShortcodeGenerator;

    fn links(repo: MockLinkRepository) -> Arc<DynLinkService> {
        let repository: Arc<dyn LinkRepository> = Arc::new(repo);
        Arc::new(LinkService::new(
            repository,
            Arc::new(NullCache::new()),
            Arc::new(ShortcodeGenerator::new("0123456789abcdef0123456789abcdef").unwrap()),
            LinkCacheTtl::default(),
        ))
    }

    #[tokio::test]
    async fn test_worker_applies_every_queued_click() {
        let mut repo = MockLinkRepository::new();
        repo.expect_increment_clicks()
            .times(5)
            .returning(|_| Ok(true));

        let (sender, rx) = ClickSender::channel(16);
        for _ in 0..5 {
            assert!(sender.record("abc123XY"));
        }
        drop(sender);

        run_click_worker(rx, links(repo), 2).await;
    }

    #[tokio::test]
    async fn test_worker_retries_then_gives_up() {
        let mut repo = MockLinkRepository::new();
        repo.expect_increment_clicks()
            .times(MAX_RETRIES + 1)
            .returning(|_| Err(StoreError::Backend("connection reset".into())));

        let (sender, rx) = ClickSender::channel(4);
        sender.record("abc123XY");
        drop(sender);

        run_click_worker(rx, links(repo), 1).await;
    }

    #[tokio::test]
    async fn test_worker_recovers_after_transient_failure() {
        let mut repo = MockLinkRepository::new();
        let mut seq = mockall::Sequence::new();
        repo.expect_increment_clicks()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::Backend("timeout".into())));
        repo.expect_increment_clicks()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));

        let (sender, rx) = ClickSender::channel(4);
        sender.record("abc123XY");
        drop(sender);

        run_click_worker(rx, links(repo), 1).await;
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_retried() {
        let mut repo = MockLinkRepository::new();
        repo.expect_increment_clicks()
            .times(1)
            .returning(|_| Ok(false));

        let (sender, rx) = ClickSender::channel(4);
        sender.record("missing1");
        drop(sender);

        run_click_worker(rx, links(repo), 1).await;
    }
}
