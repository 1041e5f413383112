//! Producer Handle: the process's single live broker connection.
//!
//! Lazily initialized on first use; concurrent initializers are serialized
//! so exactly one connection is ever created. Held explicitly by whatever
//! publishes, never a global.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::TransportError;
use crate::nats::NatsTransport;
use crate::transport::Transport;

pub struct ProducerHandle {
    url: String,
    cell: OnceCell<Arc<dyn Transport>>,
}

impl ProducerHandle {
    /// Handle that will connect to the given NATS URL on first use.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cell: OnceCell::new(),
        }
    }

    /// Handle seeded with an already-connected transport. Used in tests and
    /// anywhere the connection is established ahead of time.
    pub fn preconnected(transport: Arc<dyn Transport>) -> Self {
        Self {
            url: String::new(),
            cell: OnceCell::new_with(Some(transport)),
        }
    }

    /// Get the live transport, connecting if necessary. Idempotent; callers
    /// racing on first use are serialized and share the one connection.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn Transport>, TransportError> {
        let url = self.url.clone();
        self.ensure_ready_with(|| async move {
            let transport = NatsTransport::connect(&url).await?;
            info!(url = %url, "Producer transport connected");
            Ok(Arc::new(transport) as Arc<dyn Transport>)
        })
        .await
    }

    /// Same init-once contract with a caller-supplied connect routine.
    pub async fn ensure_ready_with<F, Fut>(
        &self,
        init: F,
    ) -> Result<Arc<dyn Transport>, TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Transport>, TransportError>>,
    {
        self.cell.get_or_try_init(init).await.cloned()
    }

    /// The transport, if `ensure_ready` has already succeeded.
    pub fn get(&self) -> Option<Arc<dyn Transport>> {
        self.cell.get().cloned()
    }

    /// Whether the connection has been established.
    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_ensure_ready_initializes_once_under_concurrency() {
        let handle = Arc::new(ProducerHandle::new("nats://unused:4222"));
        let connects = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let handle = Arc::clone(&handle);
            let connects = Arc::clone(&connects);
            tasks.push(tokio::spawn(async move {
                handle
                    .ensure_ready_with(|| async move {
                        connects.fetch_add(1, Ordering::SeqCst);
                        Ok(Arc::new(InMemoryTransport::new()) as Arc<dyn Transport>)
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn test_failed_init_can_be_retried() {
        let handle = ProducerHandle::new("nats://unused:4222");

        let err = handle
            .ensure_ready_with(|| async {
                Err(TransportError::ConnectionFailed("refused".to_string()))
            })
            .await;
        assert!(err.is_err());
        assert!(!handle.is_ready());

        handle
            .ensure_ready_with(|| async {
                Ok(Arc::new(InMemoryTransport::new()) as Arc<dyn Transport>)
            })
            .await
            .unwrap();
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn test_preconnected_is_ready_immediately() {
        let transport = Arc::new(InMemoryTransport::new());
        let handle = ProducerHandle::preconnected(transport);
        assert!(handle.is_ready());
        assert!(handle.get().is_some());
    }
}
