//! Video configuration file

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Startup video settings, stored as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// Back the visible and hidden pages with backend surfaces
    pub video_memory: bool,
    /// Window pixels per page pixel
    pub scale: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            title: "Sole Survivor".to_string(),
            width: 640,
            height: 400,
            vsync: true,
            video_memory: true,
            scale: 1,
        }
    }
}

impl VideoConfig {
    /// Save config to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load config from a JSON file; absent fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GfxError;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("survivor-gfx-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save");
        let config = VideoConfig {
            width: 320,
            height: 200,
            scale: 3,
            video_memory: false,
            ..VideoConfig::default()
        };
        config.save(&path).expect("save");
        let loaded = VideoConfig::load(&path).expect("load");
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{ "width": 800, "vsync": false }"#).expect("write");
        let loaded = VideoConfig::load(&path).expect("load");
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.width, 800);
        assert!(!loaded.vsync);
        assert_eq!(loaded.height, 400);
        assert!(loaded.video_memory);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = VideoConfig::load(temp_path("missing")).expect_err("missing file");
        assert!(matches!(err, GfxError::Io(_)));
    }

    #[test]
    fn test_malformed_file_is_json_error() {
        let path = temp_path("bad");
        fs::write(&path, "{ width: ").expect("write");
        let err = VideoConfig::load(&path).expect_err("bad json");
        let _ = fs::remove_file(&path);
        assert!(matches!(err, GfxError::Json(_)));
    }
}
