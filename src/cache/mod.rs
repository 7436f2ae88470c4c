//! Application-thread caches
//!
//! Both caches are owned by the [`RestServer`](crate::RestServer) and accessed
//! only from the drain step, so they are plain single-threaded maps. They live
//! as long as the loaded event; the host clears them when it loads another one.
//!
//! - [`RenderCache`]: list configuration to rendered list, memoized per slot
//! - [`ImageCache`]: request token to raw image bytes
pub mod image;
pub mod render;

pub use image::ImageCache;
pub use render::{RenderCache, SlotId, SlotKey, DEFAULT_SUFFIX_SPACE};

#[cfg(test)]
mod tests;
