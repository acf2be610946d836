// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Look up local images and pull missing ones.

use crate::types::{ImageId, ImageRef};
use async_trait::async_trait;

#[async_trait]
pub trait ImageOps: Send + Sync {
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError>;

    /// Local image id for `reference`, or `None` if it is not present.
    async fn image_id(&self, reference: &ImageRef) -> Result<Option<ImageId>, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
