// ABOUTME: Validated domain identifiers used across the release pipeline.
// ABOUTME: Phantom-typed container/image IDs plus tag, commit, service and image names, and deployment slots.

mod commit;
mod id;
mod image_ref;
mod service_name;
mod slot;
mod tag_name;

pub use commit::{CommitHash, CommitHashError};
pub use id::{ContainerId, ImageId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use service_name::{ServiceName, ServiceNameError};
pub use slot::Slot;
pub use tag_name::{TagName, TagNameError};
