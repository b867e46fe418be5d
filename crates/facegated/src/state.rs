use crate::service::MatchService;
use std::sync::Arc;

/// Shared state handed to every handler; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchService>,
}

impl AppState {
    pub fn new(service: MatchService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
