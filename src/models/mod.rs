//! Core data models for the ephemeral file store.
//!
//! These types are backend-agnostic: any storage implementation hands out
//! `Metadata` and consumes `Limits`.

pub mod limits;
pub mod metadata;

pub use limits::Limits;
pub use metadata::{Expiry, Metadata, MetadataRecord};
