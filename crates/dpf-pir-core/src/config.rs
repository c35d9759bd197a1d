//! Deployment configuration shared by client and servers

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::messages::WIRE_VERSION;

/// Context string binding sealed Helper requests to this protocol
pub const DEFAULT_CONTEXT_INFO: &str = "dpf-pir/helper-request";

/// Separator used when retrieved records are joined into one string
pub const DEFAULT_DELIMITER: &str = ", ";

/// Public parameters both servers and the client must agree on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PirConfig {
    /// Number of records in the database
    pub num_elements: u64,
    /// Context string for sealing the Helper request
    #[serde(default = "default_context_info")]
    pub encryption_context_info: String,
    /// Separator for joined output
    #[serde(default = "default_delimiter")]
    pub joined_delimiter: String,
    /// Wire envelope version
    #[serde(default = "default_version")]
    pub version: u16,
}

fn default_context_info() -> String {
    DEFAULT_CONTEXT_INFO.to_string()
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_version() -> u16 {
    WIRE_VERSION
}

impl PirConfig {
    pub fn new(num_elements: u64) -> Self {
        Self {
            num_elements,
            encryption_context_info: default_context_info(),
            joined_delimiter: default_delimiter(),
            version: WIRE_VERSION,
        }
    }

    pub fn with_context_info(mut self, context_info: impl Into<String>) -> Self {
        self.encryption_context_info = context_info.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.joined_delimiter = delimiter.into();
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.num_elements == 0 {
            return Err(Error::InvalidArgument(
                "num_elements must be positive".to_string(),
            ));
        }
        if self.version != WIRE_VERSION {
            return Err(Error::VersionMismatch {
                expected: WIRE_VERSION,
                actual: self.version,
            });
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusKind;

    #[test]
    fn test_defaults() {
        let config = PirConfig::new(4);
        assert_eq!(config.encryption_context_info, DEFAULT_CONTEXT_INFO);
        assert_eq!(config.joined_delimiter, ", ");
        assert_eq!(config.version, WIRE_VERSION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: PirConfig = serde_json::from_str(r#"{"num_elements": 10}"#).unwrap();
        assert_eq!(config, PirConfig::new(10));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pir.json");
        let config = PirConfig::new(100).with_delimiter(" | ").with_context_info("test");
        config.save(&path).unwrap();
        assert_eq!(PirConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_zero_elements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pir.json");
        std::fs::write(&path, r#"{"num_elements": 0}"#).unwrap();
        assert_eq!(
            PirConfig::load(&path).unwrap_err().kind(),
            StatusKind::InvalidArgument
        );
    }
}
