use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Output formats the rasterizer can produce.
const SUPPORTED_OUTPUT_FORMATS: &[&str] = &["png"];

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.max_files == 0 {
        return Err(ConfigError::Validation {
            message: "maxFiles must be at least 1".to_string(),
        });
    }

    if !config.scale.is_finite() || config.scale <= 0.0 {
        return Err(ConfigError::Validation {
            message: format!("scale must be a positive number, got {}", config.scale),
        });
    }

    if config.thumbnail_size == 0 {
        return Err(ConfigError::Validation {
            message: "thumbnailSize must be at least 1".to_string(),
        });
    }

    if config.input_formats.is_empty() {
        return Err(ConfigError::Validation {
            message: "inputFormats must list at least one format".to_string(),
        });
    }

    if !SUPPORTED_OUTPUT_FORMATS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(&config.output_format))
    {
        return Err(ConfigError::Validation {
            message: format!("Unsupported output format: {}", config.output_format),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_empty_object_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config.max_files, 20);
        assert_eq!(config.output_format, "png");
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "maxSize": 1048576,
            "maxFiles": 5,
            "inputFormats": ["svg"],
            "outputFormat": "png",
            "scale": 3,
            "thumbnailSize": 128,
            "downloadDelayMs": 0,
            "texts": { "save": "SAVE" },
            "errors": { "corrupt": "Broken file" },
            "diagnostics": { "endpoint": "https://example.com/api/error", "limit": 2 }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.max_size, 1_048_576);
        assert_eq!(config.max_files, 5);
        assert_eq!(config.scale, 3.0);
        assert_eq!(config.thumbnail_size, 128);
        assert_eq!(config.download_delay_ms, 0);
        assert_eq!(config.texts.get("save").map(String::as_str), Some("SAVE"));
        assert_eq!(config.errors.corrupt, "Broken file");
        assert_eq!(
            config.diagnostics.endpoint.as_deref(),
            Some("https://example.com/api/error")
        );
        assert_eq!(config.diagnostics.limit, 2);
    }

    #[test]
    fn test_unknown_key_rejected_by_schema() {
        let result = load_config_from_str(r#"{ "maxFile": 3 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_zero_max_files_rejected() {
        let result = load_config_from_str(r#"{ "maxFiles": 0 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_output_rejected() {
        let result = load_config_from_str(r#"{ "outputFormat": "webp" }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_wrong_version_rejected() {
        match load_config_from_str(r#"{ "version": "2.0" }"#) {
            Err(ConfigError::Validation { message }) => {
                assert!(message.contains("2.0"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = load_config("/nonexistent/svgpng.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svgpng.json");
        std::fs::write(&path, r#"{ "scale": 1.5 }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.scale, 1.5);
    }
}
