// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Unifies detection, connection and operation errors for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;
use super::traits::{ContainerError, ImageError};
use super::types::RuntimeType;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("cannot connect to {runtime} at {socket}: {source}"))]
    Connection {
        runtime: RuntimeType,
        socket: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("container operation failed: {source}"))]
    Container { source: ContainerError },

    #[snafu(display("image operation failed: {source}"))]
    Image { source: ImageError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    NoRuntimeFound,
    ConnectionFailed,
    ContainerOperation,
    ImageOperation,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Detection { .. } => RuntimeErrorKind::NoRuntimeFound,
            RuntimeError::Connection { .. } => RuntimeErrorKind::ConnectionFailed,
            RuntimeError::Container { .. } => RuntimeErrorKind::ContainerOperation,
            RuntimeError::Image { .. } => RuntimeErrorKind::ImageOperation,
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}

impl From<ContainerError> for RuntimeError {
    fn from(source: ContainerError) -> Self {
        RuntimeError::Container { source }
    }
}

impl From<ImageError> for RuntimeError {
    fn from(source: ImageError) -> Self {
        RuntimeError::Image { source }
    }
}
