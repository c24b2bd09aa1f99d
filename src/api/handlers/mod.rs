pub mod query;

use std::sync::Arc;

use crate::config::Config;
use crate::services::QueryService;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub query_service: Arc<QueryService>,
}
