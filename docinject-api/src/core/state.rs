use docinject::AgentContext;
use std::sync::Arc;

/// Shared handler state: the collaborator context built at startup
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<AgentContext>,
}

impl AppState {
    pub fn new(context: AgentContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }
}
