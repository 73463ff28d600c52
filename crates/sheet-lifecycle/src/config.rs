//! Storage configuration

use std::path::PathBuf;

/// Where persisted sheets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// Expected variables:
    /// - SHEETS_DATA_DIR: directory holding `<uuid>.pdf` files
    ///   (default: `<temp dir>/sheets`)
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os("SHEETS_DATA_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("sheets"));
        Self { data_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir() {
        let config = StorageConfig::new("/srv/sheets");
        assert_eq!(config.data_dir, PathBuf::from("/srv/sheets"));
    }
}
