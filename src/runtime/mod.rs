// ABOUTME: Container runtime access for the managed service.
// ABOUTME: Detects Docker/Podman and talks to it through bollard.

mod bollard;
mod detection;
mod error;
mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};
