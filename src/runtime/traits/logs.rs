// ABOUTME: Log access for container runtimes.
// ABOUTME: Used by the post-health log scan; stdout and stderr are always read together.

use crate::types::ContainerId;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type LogLineStream = Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>;

#[async_trait]
pub trait LogOps: Send + Sync {
    /// Finite stream of past output; never follows.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Lines from the end; `None` reads everything.
    pub tail: Option<u64>,
}

impl LogOptions {
    pub fn tail(n: u64) -> Self {
        Self { tail: Some(n) }
    }

    pub(crate) fn tail_param(&self) -> String {
        self.tail
            .map(|n| n.to_string())
            .unwrap_or_else(|| "all".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub content: String,
    pub stream: LogStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("log stream error: {0}")]
    StreamError(String),
}
