//! HTTP handlers over a [`MetaStorageBackend`].

use crate::backends::MetaStorageBackend;
use std::{path::PathBuf, sync::Arc};

pub mod file_handlers;
pub mod health_handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn MetaStorageBackend>,

    /// Named directories probed by `/readyz`.
    pub storage_dirs: Vec<(&'static str, PathBuf)>,
}
