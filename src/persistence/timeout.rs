use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{BackendError, PersistedRecord, PersistenceService};
use crate::object::Model;

/// A `PersistenceService` wrapper that bounds every backend call.
///
/// A stalled call fails with [`BackendError::Timeout`] instead of holding
/// its queue slot forever.
pub struct TimeoutPersistence<P> {
    inner: P,
    limit: Duration,
}

impl<P> TimeoutPersistence<P> {
    pub fn new(inner: P, limit: Duration) -> Self {
        TimeoutPersistence { inner, limit }
    }

    /// Access the inner backend.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    async fn bounded<T, F>(&self, operation: &'static str, space: &str, call: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                let after_ms = self.limit.as_millis() as u64;
                warn!(operation, space, after_ms, "backend call timed out");
                Err(BackendError::Timeout {
                    operation,
                    space: space.to_string(),
                    after_ms,
                })
            }
        }
    }
}

#[async_trait]
impl<P: PersistenceService> PersistenceService for TimeoutPersistence<P> {
    async fn list_spaces(&self) -> Result<Vec<String>, BackendError> {
        self.bounded("list_spaces", "*", self.inner.list_spaces()).await
    }

    async fn list_objects(&self, space: &str) -> Result<Option<Vec<String>>, BackendError> {
        self.bounded("list_objects", space, self.inner.list_objects(space))
            .await
    }

    async fn create_object(
        &self,
        space: &str,
        id: &str,
        model: &Model,
    ) -> Result<bool, BackendError> {
        self.bounded("create_object", space, self.inner.create_object(space, id, model))
            .await
    }

    async fn read_object(&self, space: &str, id: &str) -> Result<Option<Model>, BackendError> {
        self.bounded("read_object", space, self.inner.read_object(space, id))
            .await
    }

    async fn update_object(
        &self,
        space: &str,
        id: &str,
        model: &Model,
    ) -> Result<bool, BackendError> {
        self.bounded("update_object", space, self.inner.update_object(space, id, model))
            .await
    }

    async fn delete_object(&self, space: &str, id: &str) -> Result<bool, BackendError> {
        self.bounded("delete_object", space, self.inner.delete_object(space, id))
            .await
    }

    async fn read_record(
        &self,
        space: &str,
        id: &str,
    ) -> Result<Option<PersistedRecord>, BackendError> {
        self.bounded("read_record", space, self.inner.read_record(space, id))
            .await
    }
}

/// Builder trait for wrapping a backend with a per-call timeout.
pub trait WithTimeout: Sized {
    fn with_timeout(self, limit: Duration) -> TimeoutPersistence<Self> {
        TimeoutPersistence::new(self, limit)
    }
}

impl<T: PersistenceService> WithTimeout for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;

    struct Stalled;

    #[async_trait]
    impl PersistenceService for Stalled {
        async fn list_spaces(&self) -> Result<Vec<String>, BackendError> {
            std::future::pending().await
        }

        async fn list_objects(&self, _space: &str) -> Result<Option<Vec<String>>, BackendError> {
            std::future::pending().await
        }

        async fn create_object(&self, _: &str, _: &str, _: &Model) -> Result<bool, BackendError> {
            std::future::pending().await
        }

        async fn read_object(&self, _: &str, _: &str) -> Result<Option<Model>, BackendError> {
            std::future::pending().await
        }

        async fn update_object(&self, _: &str, _: &str, _: &Model) -> Result<bool, BackendError> {
            std::future::pending().await
        }

        async fn delete_object(&self, _: &str, _: &str) -> Result<bool, BackendError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_call_times_out() {
        let backend = Stalled.with_timeout(Duration::from_millis(10));
        let err = backend.read_object("mct", "a").await.unwrap_err();
        assert_eq!(
            err,
            BackendError::Timeout {
                operation: "read_object",
                space: "mct".into(),
                after_ms: 10,
            }
        );
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let backend = InMemoryPersistence::new(["mct"]).with_timeout(Duration::from_secs(1));
        assert_eq!(backend.list_spaces().await.unwrap(), vec!["mct"]);
        assert_eq!(backend.inner().list_objects("mct").await.unwrap(), Some(vec![]));
    }
}
