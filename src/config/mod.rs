//! Application Configuration
//!
//! Pipeline and engine settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Recognition engine settings
    pub engine: EngineConfig,
    /// Image pipeline settings
    pub pipeline: PipelineConfig,
    /// Output settings
    pub output: OutputConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            pipeline: PipelineConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Recognition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tessdata directory, or None to use the system default
    pub tessdata_dir: Option<PathBuf>,
    /// Trained language pack to load
    pub language: String,
    /// Resolution hint for in-memory region images, in dpi
    pub source_dpi: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tessdata_dir: None,
            language: "chi_sim".to_string(),
            source_dpi: 300,
        }
    }
}

/// Image pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum working width before card detection; larger inputs are shrunk
    pub max_width: u32,
    /// Maximum working height before card detection
    pub max_height: u32,
    /// Width of the rectified card image
    pub card_width: u32,
    /// Height of the rectified card image
    pub card_height: u32,
    /// Minimum contour area accepted as a card outline, in px^2
    pub min_card_area: f64,
    /// Upscale factor applied to field crops before recognition
    pub region_upscale: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_width: 1200,
            max_height: 800,
            card_width: 640,
            card_height: 400,
            min_card_area: 10_000.0,
            region_upscale: 3,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where the JSON report is written
    pub report_path: PathBuf,
    /// Directory for intermediate pipeline images, or None to skip dumping
    pub debug_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from("extraction-report.json"),
            debug_dir: None,
        }
    }
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "idcard-extract", "idcard-extract")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Engine defaults
        assert!(config.engine.tessdata_dir.is_none());
        assert_eq!(config.engine.language, "chi_sim");
        assert_eq!(config.engine.source_dpi, 300);

        // Pipeline defaults
        assert_eq!(config.pipeline.max_width, 1200);
        assert_eq!(config.pipeline.max_height, 800);
        assert_eq!(config.pipeline.card_width, 640);
        assert_eq!(config.pipeline.card_height, 400);
        assert!((config.pipeline.min_card_area - 10_000.0).abs() < f64::EPSILON);
        assert_eq!(config.pipeline.region_upscale, 3);

        // Output defaults
        assert_eq!(
            config.output.report_path,
            PathBuf::from("extraction-report.json")
        );
        assert!(config.output.debug_dir.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.engine.language, parsed.engine.language);
        assert_eq!(config.pipeline.card_width, parsed.pipeline.card_width);
        assert_eq!(config.output.report_path, parsed.output.report_path);
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.engine.tessdata_dir = Some(PathBuf::from("/usr/share/tessdata"));
        config.engine.language = "chi_sim+eng".to_string();
        config.pipeline.region_upscale = 4;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            parsed.engine.tessdata_dir,
            Some(PathBuf::from("/usr/share/tessdata"))
        );
        assert_eq!(parsed.engine.language, "chi_sim+eng");
        assert_eq!(parsed.pipeline.region_upscale, 4);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();

        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.engine.language, loaded.engine.language);
        assert_eq!(config.pipeline.min_card_area, loaded.pipeline.min_card_area);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
