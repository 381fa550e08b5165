//! Service configuration stored as TOML.
//!
//! Every section has defaults, so a config file only needs the values it
//! changes. Command line flags are applied on top by the binary.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glint_ocr::{EngineConfig, OcrLanguage, ProcessEngineOptions};
use serde::{Deserialize, Serialize};

use crate::batch_processor::BatchOptions;
use crate::visualization::VisualizationConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlintConfig {
    pub engine: EngineSettings,
    pub server: ServerSettings,
    pub batch: BatchSettings,
    pub visualization: VisualizationConfig,
}

/// Recognition engine and the helper process hosting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub language: OcrLanguage,
    pub word_breakdown: bool,
    /// Helper executable speaking the line protocol.
    pub program: String,
    pub args: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        let helper = ProcessEngineOptions::default();
        Self {
            language: engine.language,
            word_breakdown: engine.word_breakdown,
            program: helper.program,
            args: helper.args,
        }
    }
}

impl EngineSettings {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            language: self.language,
            word_breakdown: self.word_breakdown,
        }
    }

    pub fn process_options(&self) -> ProcessEngineOptions {
        ProcessEngineOptions {
            program: self.program.clone(),
            args: self.args.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub output_dir: PathBuf,
    pub visualize: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        let options = BatchOptions::default();
        Self {
            output_dir: options.output_dir,
            visualize: options.visualize,
        }
    }
}

impl BatchSettings {
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            output_dir: self.output_dir.clone(),
            visualize: self.visualize,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<GlintConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: GlintConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &GlintConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// `<platform config dir>/config.toml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "glint", "glint")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Loads `path` when given; otherwise the default location if it exists, else defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<GlintConfig> {
    if let Some(path) = path {
        return load_config(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => {
            tracing::debug!(path = %path.display(), "loading config");
            load_config(&path)
        }
        _ => Ok(GlintConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = GlintConfig::default();
        assert_eq!(config.engine.language, OcrLanguage::English);
        assert!(config.engine.word_breakdown);
        assert_eq!(config.engine.program, "glint-paddle-helper");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.batch.output_dir, PathBuf::from("output"));
        assert!(config.batch.visualize);
        assert_eq!(config.visualization.bbox_color, [0, 255, 0]);
        assert_eq!(config.visualization.font_path, None);
        assert!(config.visualization.show_text && config.visualization.show_confidence);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = GlintConfig::default();
        config.engine.language = OcrLanguage::Japanese;
        config.engine.args = vec!["--gpu".into()];
        config.server.port = 9000;
        config.visualization.font_path = Some(PathBuf::from("/fonts/DejaVuSans.ttf"));
        config.visualization.show_confidence = false;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("language = \"japan\""));
        let parsed: GlintConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[server]\nport = 9999\n\n[engine]\nlanguage = \"korean\"").unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.engine.language, OcrLanguage::Korean);
        assert!(config.engine.word_breakdown);
        assert_eq!(config.batch, BatchSettings::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = GlintConfig::default();
        save_config(&config, temp_file.path()).unwrap();
        assert_eq!(load_config(temp_file.path()).unwrap(), config);
    }

    #[test]
    fn test_load_config_errors() {
        assert!(load_config(Path::new("/nonexistent/path/config.toml")).is_err());
        assert!(load_or_default(Some(Path::new("/nonexistent/path/config.toml"))).is_err());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();
        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_engine_settings_conversions() {
        let settings = EngineSettings {
            language: OcrLanguage::Multilingual,
            word_breakdown: false,
            program: "python3".into(),
            args: vec!["helper.py".into()],
        };
        assert_eq!(settings.engine_config().language.code(), "multi");
        assert!(!settings.engine_config().word_breakdown);
        assert_eq!(settings.process_options().args, vec!["helper.py".to_string()]);
    }
}
