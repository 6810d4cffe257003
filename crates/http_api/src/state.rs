use std::sync::Arc;

use relay_app::RefreshOrchestrator;

#[derive(Clone)]
pub struct HttpState {
    pub orchestrator: Arc<RefreshOrchestrator>,
}

impl HttpState {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>) -> Self {
        Self { orchestrator }
    }
}
