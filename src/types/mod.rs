// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to keep container and image ids apart.

mod id;
mod image_ref;

pub use id::{ContainerId, Id, ImageId};
pub use image_ref::{ImageReference, ParseImageReferenceError};
