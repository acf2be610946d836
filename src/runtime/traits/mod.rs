// ABOUTME: Capability traits for the container runtime that hosts the service.
// ABOUTME: ContainerOps, ImageOps and LogOps, combined as ServiceRuntime.

mod container;
mod image;
mod logs;
mod shared_types;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use image::{ImageError, ImageOps};
pub use logs::{LogError, LogLine, LogLineStream, LogOps, LogOptions, LogStream};
pub use shared_types::*;

/// Everything the pipeline needs from a runtime.
///
/// Blanket-implemented so any type providing the three capabilities
/// (the bollard client, or an in-memory fake) can be used behind `Arc<dyn ServiceRuntime>`.
pub trait ServiceRuntime: ContainerOps + ImageOps + LogOps {}

impl<T: ContainerOps + ImageOps + LogOps> ServiceRuntime for T {}
