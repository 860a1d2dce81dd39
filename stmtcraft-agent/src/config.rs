//! Agent configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard ceiling on attempts per run
pub const MAX_ATTEMPTS: u32 = 3;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 120;

/// Configuration for a refinement run
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Directory holding `data/` and `custom_parser/`
    pub root: PathBuf,
    /// Model override; the provider's default when unset
    pub model: Option<String>,
    pub temperature: f32,
    /// Interpreter used to run generated parsers
    pub python: String,
    pub exec_timeout: Duration,
    /// Run `pytest -q` in the root after a success
    pub run_pytest: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            python: DEFAULT_PYTHON.to_string(),
            exec_timeout: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
            run_pytest: false,
        }
    }
}

impl AgentConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_exec_timeout(mut self, secs: u64) -> Self {
        self.exec_timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_pytest(mut self, enabled: bool) -> Self {
        self.run_pytest = enabled;
        self
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn parser_dir(&self) -> PathBuf {
        self.root.join("custom_parser")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.python, "python3");
        assert_eq!(config.exec_timeout, Duration::from_secs(120));
        assert!(config.model.is_none());
        assert!(!config.run_pytest);
    }

    #[test]
    fn test_builders_and_paths() {
        let config = AgentConfig::default()
            .with_root("/tmp/work")
            .with_model("llama-3.3-70b")
            .with_exec_timeout(5)
            .with_pytest(true);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/work/data"));
        assert_eq!(config.parser_dir(), PathBuf::from("/tmp/work/custom_parser"));
        assert_eq!(config.model.as_deref(), Some("llama-3.3-70b"));
        assert_eq!(config.exec_timeout.as_secs(), 5);
        assert!(config.run_pytest);
    }
}
