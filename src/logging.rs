use std::fmt;
use std::str::FromStr;

use env_logger::Builder;
use log::{Level, LevelFilter};

use crate::config::LoggingConfig;

/// Initialise the global logger. `RUST_LOG` still overrides the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let level = LevelFilter::from_str(&config.level).unwrap_or(LevelFilter::Info);

    Builder::new()
        .filter_level(level)
        .filter_module("sqlx", LevelFilter::Warn) // Suppress sqlx Debug logs
        .parse_default_env()
        .init();
}

/// Log handle carrying a target and scope tags, passed down with each request.
#[derive(Debug, Clone)]
pub struct Logger {
    target: String,
    scope: Vec<(String, String)>,
}

impl Logger {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            scope: Vec::new(),
        }
    }

    pub fn with_scope(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.scope.push((key.to_string(), value.to_string()));
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn scope(&self) -> &[(String, String)] {
        &self.scope
    }

    pub fn scope_value(&self, key: &str) -> Option<&str> {
        self.scope
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn scope_prefix(&self) -> String {
        if self.scope.is_empty() {
            return String::new();
        }
        let tags: Vec<String> = self
            .scope
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        format!("[{}] ", tags.join(" "))
    }

    pub fn log(&self, level: Level, message: impl fmt::Display) {
        if log::log_enabled!(target: self.target.as_str(), level) {
            log::log!(target: self.target.as_str(), level, "{}{}", self.scope_prefix(), message);
        }
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, message);
    }
}
