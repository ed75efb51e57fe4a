// syncrotron/src/config/mod.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, Result};

/// Keys that must be present for any operation other than `init`.
pub const REQUIRED_KEYS: [&str; 5] = ["host", "port", "user", "keypath", "db"];

/// Connection settings for the Synchrotron SFTP remote, loaded once per
/// invocation and passed by reference into subcommand handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub keypath: PathBuf,
    pub db: PathBuf,
}

/// Checks whether the config is valid, i.e. whether all required keys are
/// present. Values are not type-checked here; that happens when the mapping
/// is deserialised into [`Settings`].
pub fn validate(cfg: &serde_yaml::Mapping) -> bool {
    REQUIRED_KEYS
        .iter()
        .all(|key| cfg.contains_key(&serde_yaml::Value::from(*key)))
}

/// Reads settings from a YAML config file.
///
/// Fails with an I/O error if the file cannot be read, and with a
/// configuration error if the document is malformed, is missing a required
/// key, or carries a value of the wrong type.
pub fn read(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)?;
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("failed to parse {}: {}", path.display(), e)))?;

    if !validate(&mapping) {
        return Err(AppError::Config(format!(
            "config at {} is not valid; it must contain 'host', 'port', 'user', 'keypath' and 'db' fields",
            path.display()
        )));
    }

    serde_yaml::from_value(serde_yaml::Value::Mapping(mapping))
        .map_err(|e| AppError::Config(format!("failed to parse {}: {}", path.display(), e)))
}

/// Serialises settings to YAML and writes them to the given path, creating
/// missing parent directories. No partial-state guarantee on failure.
pub fn write(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let raw = serde_yaml::to_string(settings)
        .map_err(|e| AppError::Config(format!("failed to serialise config: {e}")))?;
    fs::write(path, raw)?;
    Ok(())
}

/// Expands a leading `~` to the current user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn full_mapping() -> serde_yaml::Mapping {
        let mut cfg = serde_yaml::Mapping::new();
        for key in REQUIRED_KEYS {
            cfg.insert(Value::from(key), Value::from("x"));
        }
        cfg
    }

    #[test]
    fn test_validate_all_keys_present() {
        assert!(validate(&full_mapping()));
    }

    #[test]
    fn test_validate_ignores_value_types() {
        let mut cfg = full_mapping();
        cfg.insert(Value::from("port"), Value::from(false));
        cfg.insert(Value::from("db"), Value::from(42));
        assert!(validate(&cfg));
    }

    #[test]
    fn test_validate_missing_key() {
        for key in REQUIRED_KEYS {
            let mut cfg = full_mapping();
            cfg.remove(&Value::from(key));
            assert!(!validate(&cfg), "expected invalid without '{key}'");
        }
    }

    #[test]
    fn test_read_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("as.yaml");
        let settings = Settings {
            host: "h".to_string(),
            port: 22,
            user: "u".to_string(),
            keypath: PathBuf::from("/k"),
            db: PathBuf::from("./files.db"),
        };

        write(&path, &settings).unwrap();
        assert_eq!(read(&path).unwrap(), settings);
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/as.yaml");
        let settings = Settings {
            host: "h".to_string(),
            port: 22,
            user: "u".to_string(),
            keypath: PathBuf::from("/k"),
            db: PathBuf::from("./files.db"),
        };

        write(&path, &settings).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = read(Path::new("/nonexistent/as.yaml")).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_read_missing_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("as.yaml");
        fs::write(&path, "host: h\nport: 22\nuser: u\n").unwrap();

        let err = read(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_read_wrong_type_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("as.yaml");
        fs::write(
            &path,
            "host: h\nport: not-a-number\nuser: u\nkeypath: /k\ndb: ./files.db\n",
        )
        .unwrap();

        let err = read(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/.as.yaml"), home.join(".as.yaml"));
        assert_eq!(expand_tilde("/etc/as.yaml"), PathBuf::from("/etc/as.yaml"));
        assert_eq!(expand_tilde("./files.db"), PathBuf::from("./files.db"));
    }
}
