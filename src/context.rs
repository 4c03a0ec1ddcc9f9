use std::sync::Arc;

use crate::config::themes::Palette;
use crate::config::{AppConfig, ConfigPaths};

/// Process-wide settings, built once in `cli::run` and handed to whichever
/// surface (server, one-shot command, terminal client) is started.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub paths: ConfigPaths,
}

impl AppContext {
    pub fn new(config: AppConfig, paths: ConfigPaths) -> Self {
        Self {
            config: Arc::new(config),
            paths,
        }
    }

    pub fn palette(&self) -> Palette {
        Palette::for_theme(self.config.theme)
    }
}
