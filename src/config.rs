use std::env;
use std::path::PathBuf;

/// Default storage root, relative to the working directory.
const DEFAULT_STORAGE_DIR: &str = "snippets";

/// Configuration for the snippet store and its CLI
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage root holding one history file per snippet (default: `./snippets`)
    pub storage_dir: PathBuf,

    /// Output format: "human" (default) or "json"
    pub output_format: String,

    /// Log level used when `RUST_LOG` is unset (default: "info")
    pub log_level: String,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        let storage_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_STORAGE_DIR);

        Config {
            storage_dir,
            output_format: "human".to_string(),
            log_level: "info".to_string(),
        }
    }

    pub fn get_storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }

    pub fn set_storage_dir(&mut self, dir: PathBuf) {
        self.storage_dir = dir;
    }

    pub fn get_output_format(&self) -> &str {
        &self.output_format
    }

    /// Set output format ("human" or "json")
    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    pub fn get_log_level(&self) -> &str {
        &self.log_level
    }

    pub fn set_log_level(&mut self, level: String) {
        self.log_level = level;
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `SNIPPET_STORE_DIR`: override storage root
    /// - `SNIPPET_STORE_OUTPUT_FORMAT`: "human" or "json"
    /// - `SNIPPET_STORE_LOG_LEVEL`: default log level
    pub fn from_env() -> Self {
        let mut config = Config::new();

        if let Ok(dir) = env::var("SNIPPET_STORE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        if let Ok(format) = env::var("SNIPPET_STORE_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        if let Ok(level) = env::var("SNIPPET_STORE_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.output_format, "human");
        assert_eq!(config.log_level, "info");
        assert!(config.storage_dir.ends_with("snippets"));
    }

    #[test]
    fn test_config_setters() {
        let mut config = Config::new();
        config.set_output_format("json".to_string());
        assert_eq!(config.get_output_format(), "json");

        config.set_log_level("debug".to_string());
        assert_eq!(config.get_log_level(), "debug");

        config.set_storage_dir(PathBuf::from("data"));
        assert!(config.get_storage_dir().ends_with("data"));
    }
}
