use std::sync::Arc;
use std::time::Instant;

use crate::fetch::PageSource;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn PageSource>,
    pub cors_origin: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(source: Arc<dyn PageSource>, cors_origin: impl Into<String>) -> Self {
        Self {
            source,
            cors_origin: cors_origin.into(),
            started_at: Instant::now(),
        }
    }
}
