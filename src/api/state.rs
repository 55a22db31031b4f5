//! Application state for the API server

use crate::{Config, Resolver};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The resolver serving lookups
    pub resolver: Arc<Resolver>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(resolver: Arc<Resolver>, config: Arc<Config>) -> Self {
        Self { resolver, config }
    }
}
