//! Worker abstraction and registry
//!
//! A Worker wraps one external data source behind a uniform "answer this
//! query" contract. Failures and timeouts are outcomes, never errors: a
//! worker must not crash the request it is serving.

use crate::models::{WorkerKind, WorkerOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub mod data;
pub mod web;

pub use data::DataWorker;
pub use web::WebWorker;

/// Uniform capability contract across worker kinds.
#[async_trait]
pub trait Worker: Send + Sync {
    fn kind(&self) -> WorkerKind;

    /// Answer a query within `timeout`. `context` carries earlier results
    /// when the worker runs late in a sequential plan.
    async fn answer(
        &self,
        query: &str,
        context: Option<&str>,
        timeout: Duration,
    ) -> WorkerOutcome;
}

/// Registry for looking up workers by kind. Workers are stateless and
/// shared freely across concurrent requests.
pub struct WorkerRegistry {
    workers: HashMap<WorkerKind, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.kind(), worker);
    }

    pub fn get(&self, kind: WorkerKind) -> Option<Arc<dyn Worker>> {
        self.workers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<WorkerKind> {
        self.workers.keys().copied().collect()
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a worker's inner future with its deadline. Dropping the future on
/// timeout cancels the pending collaborator call.
pub(crate) async fn with_deadline<F>(timeout: Duration, fut: F) -> WorkerOutcome
where
    F: std::future::Future<Output = std::result::Result<String, String>> + Send,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(text)) => WorkerOutcome::Ok { text },
        Ok(Err(reason)) => WorkerOutcome::Failed { reason },
        Err(_) => WorkerOutcome::Timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoWorker;

    #[async_trait]
    impl Worker for EchoWorker {
        fn kind(&self) -> WorkerKind {
            WorkerKind::Data
        }

        async fn answer(
            &self,
            query: &str,
            _context: Option<&str>,
            timeout: Duration,
        ) -> WorkerOutcome {
            with_deadline(timeout, async move { Ok(query.to_string()) }).await
        }
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let mut registry = WorkerRegistry::new();
        registry.register(Arc::new(EchoWorker));

        assert!(registry.get(WorkerKind::Data).is_some());
        assert!(registry.get(WorkerKind::Web).is_none());
        assert_eq!(registry.kinds(), vec![WorkerKind::Data]);
    }

    #[tokio::test]
    async fn test_deadline_turns_slow_work_into_timeout() {
        let outcome = with_deadline(Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("too late".to_string())
        })
        .await;
        assert_eq!(outcome, WorkerOutcome::Timeout);
    }
}
