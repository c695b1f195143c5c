use std::sync::Arc;

use crate::config::Config;
use crate::invoker::OcrInvoker;

/// Shared, read-only application state. Configuration is frozen at startup;
/// no mutable state crosses request boundaries.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub invoker: OcrInvoker,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let invoker = OcrInvoker::new(&config.ocr);
        Self { config, invoker }
    }
}
