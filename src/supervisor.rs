//! Process-wide lifecycle supervision.
//!
//! The supervisor owns the one cancellation scope every component shares.
//! It tracks two kinds of lifecycles: tasks (the consumer pool) that run
//! until they finish, and resources (database pools, the browser) that must
//! be closed once nothing uses them anymore.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Error, Result};

/// A resource that must be shut down explicitly.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    fn name(&self) -> &str;

    async fn close(&self) -> Result<()>;
}

pub struct Supervisor {
    token: CancellationToken,
    tasks: JoinSet<(String, Result<()>)>,
    resources: Vec<Arc<dyn Lifecycle>>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: JoinSet::new(),
            resources: Vec::new(),
        }
    }

    /// The shared cancellation scope.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the scope: stop admitting work and start draining.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Register a resource to close on shutdown. Resources close in reverse
    /// registration order, after every task has exited.
    pub fn start(&mut self, resource: Arc<dyn Lifecycle>) {
        info!(resource = resource.name(), "resource registered");
        self.resources.push(resource);
    }

    /// Run a task under supervision. A task that fails cancels the scope.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let token = self.token.clone();
        self.tasks.spawn(async move {
            let result = task.await;
            if let Err(ref e) = result {
                error!(task = %name, "task failed: {e}, cancelling");
                token.cancel();
            }
            (name, result)
        });
    }

    /// Wait until every task has exited, then close every resource.
    ///
    /// Returns the first task or close error, if any.
    pub async fn await_closed(mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => info!(task = %name, "task exited"),
                Ok((_, Err(e))) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!("task panicked or was aborted: {e}");
                    self.token.cancel();
                    first_error.get_or_insert(Error::Other(format!("task join error: {e}")));
                }
            }
        }

        self.token.cancel();

        for resource in self.resources.iter().rev() {
            if let Err(e) = resource.close().await {
                warn!(resource = resource.name(), "close failed: {e}");
                first_error.get_or_insert(e);
            }
        }

        info!("all lifecycles closed");
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Lifecycle for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn close(&self) -> Result<()> {
            self.log.lock().unwrap().push(self.name.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn resources_close_in_reverse_order_after_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut supervisor = Supervisor::new();
        for name in ["broker", "store", "browser"] {
            supervisor.start(Arc::new(Recorder {
                name: name.to_string(),
                log: Arc::clone(&log),
            }));
        }

        let task_log = Arc::clone(&log);
        let token = supervisor.token();
        supervisor.spawn("pool", async move {
            token.cancelled().await;
            task_log.lock().unwrap().push("pool".to_string());
            Ok(())
        });

        supervisor.cancel();
        supervisor.await_closed().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["pool", "browser", "store", "broker"]
        );
    }

    #[tokio::test]
    async fn failing_task_cancels_scope() {
        let mut supervisor = Supervisor::new();
        let token = supervisor.token();

        supervisor.spawn("broken", async { Err(Error::Broker("channel lost".to_string())) });
        let waiter = supervisor.token();
        supervisor.spawn("waiter", async move {
            waiter.cancelled().await;
            Ok(())
        });

        let result = supervisor.await_closed().await;
        assert!(matches!(result, Err(Error::Broker(_))));
        assert!(token.is_cancelled());
    }
}
