//! Pluggable object storage for an ephemeral file-sharing service.
//!
//! Objects go in as byte streams, come back by key together with their
//! metadata, and expire on their own. `backends` defines the storage
//! contract and the local filesystem implementation; the HTTP layer in
//! `handlers` and `routes` is a thin surface over it.

pub mod backends;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
