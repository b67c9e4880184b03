//! Serializable optimizer settings (requires the `config` feature).
//!
//! A config file names the backend and the solver limits:
//!
//! ```toml
//! backend = "branch-and-bound"
//!
//! [solver]
//! relative_gap = 0.0
//! time_limit = 30.0
//! ```
//!
//! Missing keys take their defaults, so an empty file is valid.

use crate::error::{QuadError, QuadResult};
use crate::optimizer::QuadOptimizer;
use crate::solver::{SolverBackend, SolverConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Backend choice plus solver limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub backend: SolverBackend,
    pub solver: SolverConfig,
}

impl OptimizerConfig {
    pub fn new(backend: SolverBackend, solver: SolverConfig) -> Self {
        Self { backend, solver }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(toml_str: &str) -> QuadResult<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| QuadError::invalid_config(format!("TOML: {}", e)))?;
        config.solver.validate()?;
        Ok(config)
    }

    /// Parse a JSON document.
    pub fn from_json_str(json_str: &str) -> QuadResult<Self> {
        let config: Self = serde_json::from_str(json_str)
            .map_err(|e| QuadError::invalid_config(format!("JSON: {}", e)))?;
        config.solver.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// - [`QuadError::IoRead`] if the file can't be read
    /// - [`QuadError::UnsupportedFormat`] for other extensions
    /// - [`QuadError::InvalidConfig`] for malformed contents or limits
    pub fn from_file(path: impl AsRef<Path>) -> QuadResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let contents = std::fs::read_to_string(path).map_err(|e| QuadError::io_read(path, e))?;

        debug!(target: "quadify::config", ?path, "Loading optimizer config");
        match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&contents),
            Some("json") => Self::from_json_str(&contents),
            _ => Err(QuadError::UnsupportedFormat { extension }),
        }
    }

    pub fn to_toml(&self) -> QuadResult<String> {
        toml::to_string_pretty(self).map_err(|e| QuadError::invalid_config(e.to_string()))
    }

    pub fn to_json(&self) -> QuadResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| QuadError::invalid_config(e.to_string()))
    }

    /// Create the optimizer these settings describe.
    pub fn build_optimizer(&self) -> QuadResult<QuadOptimizer> {
        QuadOptimizer::builder()
            .backend(self.backend)
            .config(self.solver.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_is_default() {
        let config = OptimizerConfig::from_toml_str("").unwrap();
        assert_eq!(config, OptimizerConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = OptimizerConfig::from_toml_str(
            r#"
            backend = "branch-and-bound"

            [solver]
            relative_gap = 0.0
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, SolverBackend::BranchAndBound);
        assert_eq!(config.solver.relative_gap, 0.0);
        assert_eq!(config.solver.seed, 42);
        assert_eq!(config.solver.time_limit, 60.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = OptimizerConfig::new(SolverBackend::Highs, SolverConfig::fast());
        let json = config.to_json().unwrap();
        assert!(json.contains("\"highs\""));
        assert_eq!(OptimizerConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = OptimizerConfig::new(SolverBackend::BranchAndBound, SolverConfig::exact());
        let toml_str = config.to_toml().unwrap();
        assert_eq!(OptimizerConfig::from_toml_str(&toml_str).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = OptimizerConfig::from_toml_str("[solver]\ntime_limit = -5.0\n").unwrap_err();
        assert!(matches!(err, QuadError::InvalidConfig { .. }));

        let err = OptimizerConfig::from_toml_str("backend = \"cplex\"\n").unwrap_err();
        assert!(matches!(err, QuadError::InvalidConfig { .. }));

        let err = OptimizerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, QuadError::InvalidConfig { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[solver]\nrelative_gap = 0.2").unwrap();
        let config = OptimizerConfig::from_file(file.path()).unwrap();
        assert!((config.solver.relative_gap - 0.2).abs() < 1e-12);

        let optimizer = config.build_optimizer().unwrap();
        assert_eq!(optimizer.solver_name(), "branch-and-bound");
    }

    #[test]
    fn test_from_file_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = OptimizerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, QuadError::UnsupportedFormat { .. }));
    }
}
