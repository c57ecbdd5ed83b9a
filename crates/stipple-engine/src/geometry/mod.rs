//! Geometry utilities shared by renderables.
//!
//! - [`Aabb`]: world-space bounding volumes
//! - [`ContentHasher`]: deterministic 64-bit fingerprints over raw byte spans

mod aabb;
mod hash;

pub use aabb::Aabb;
pub use hash::{hash_bytes, ContentHasher, HASH_SEED};
