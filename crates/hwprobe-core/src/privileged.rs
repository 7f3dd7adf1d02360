//! Reads through the privileged executor.

use crate::shell::CommandExecutor;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::Arc;
use tracing::debug;

/// Outcome of one privileged read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCompletion {
    pub path: String,
    /// File content, `None` when the read produced nothing usable.
    pub content: Option<String>,
    pub exit_code: Option<i32>,
}

/// An issued read, resolving exactly once.
pub type PendingRead = BoxFuture<'static, ReadCompletion>;

/// Quotes a path for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// The command used to read a path.
pub fn cat_command(path: &str) -> String {
    format!("cat {}", shell_quote(path))
}

/// Issues `cat <path>` through a [`CommandExecutor`].
#[derive(Clone)]
pub struct PrivilegedReader {
    executor: Arc<dyn CommandExecutor>,
}

impl PrivilegedReader {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }

    pub fn is_available(&self) -> bool {
        self.executor.is_available()
    }

    /// Issues a read; `None` if the executor could not be engaged.
    ///
    /// The command is sent before this returns, so issue order is submission
    /// order even if the futures are polled in another order.
    pub fn read_async(&self, path: &str) -> Option<PendingRead> {
        let handle = self.executor.execute(&cat_command(path))?;
        debug!("Privileged read issued for {}", path);

        let path = path.to_string();
        Some(
            async move {
                let output = handle.collect().await;
                let content = match output.exit_code {
                    Some(code) if code == 0 || !output.lines.is_empty() => Some(output.text()),
                    _ => None,
                };
                debug!(
                    "Privileged read of {} completed with {:?}",
                    path, output.exit_code
                );
                ReadCompletion {
                    path,
                    content,
                    exit_code: output.exit_code,
                }
            }
            .boxed(),
        )
    }

    /// Issues a read and waits for it.
    pub async fn read(&self, path: &str) -> Option<String> {
        self.read_async(path)?.await.content
    }
}
