use std::fs;
use std::path::{Path, PathBuf};

use privacy_guard_core::config::{ConfigError, GuardConfig};

const APP_DIR: &str = "PrivacyGuard";

/// `<config_dir>/PrivacyGuard/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.json"))
}

/// `<data_dir>/PrivacyGuard/models`, where model files are looked up when no
/// explicit path is given.
pub fn default_model_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR).join("models"))
}

/// Reads the configuration once at startup.
///
/// An explicit path must exist. Without one, the default location is used if
/// present; otherwise every value takes its default.
pub fn load_config(explicit: Option<&Path>) -> Result<GuardConfig, ConfigError> {
    match explicit {
        Some(path) => read_config(path),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => read_config(&path),
            None => {
                log::debug!("No configuration file, using defaults");
                Ok(GuardConfig::default())
            }
        },
    }
}

fn read_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Enrollment template: a JSON array of floats.
pub fn load_template(path: &Path) -> Result<Vec<f32>, ConfigError> {
    let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let template: Vec<f32> = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if template.is_empty() {
        return Err(ConfigError::Parse {
            path: path.display().to_string(),
            reason: "template is empty".into(),
        });
    }
    Ok(template)
}

/// The explicit path, or `name` inside the default model directory.
pub fn resolve_model(explicit: Option<&Path>, name: &str) -> Result<PathBuf, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_model_dir()
            .map(|dir| dir.join(name))
            .ok_or_else(|| ConfigError::Invalid {
                field: "model",
                reason: "no data directory on this platform; pass a model path".into(),
            })?,
    };
    if !path.exists() {
        return Err(ConfigError::Invalid {
            field: "model",
            reason: format!("model file not found: {}", path.display()),
        });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_explicit_config_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "config.json",
            r#"{"privacy": {"debounce_on_frames": 4}, "ui": {"headless": true}}"#,
        );
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.privacy.debounce_on_frames, 4);
        assert!(config.ui.headless);
        assert_eq!(config.camera, GuardConfig::default().camera);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.json")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_malformed_config_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "config.json", "{ not json");
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_template_loads_floats() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "me.json", "[0.5, -0.25, 1.0]");
        assert_eq!(load_template(&path).unwrap(), vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_empty_template_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "me.json", "[]");
        assert!(load_template(&path).is_err());
    }

    #[test]
    fn test_explicit_model_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let model = write(dir.path(), "m.onnx", "");
        assert_eq!(resolve_model(Some(&model), "ignored").unwrap(), model);
        assert!(resolve_model(Some(&dir.path().join("none.onnx")), "x").is_err());
    }

    #[test]
    fn test_default_paths_live_under_app_dir() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("PrivacyGuard/config.json"));
        }
        if let Some(dir) = default_model_dir() {
            assert!(dir.ends_with("PrivacyGuard/models"));
        }
    }
}
