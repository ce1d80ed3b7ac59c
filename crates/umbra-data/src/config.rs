// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loading render settings from RON.

use std::path::Path;
use thiserror::Error;
use umbra_core::renderer::RenderSettings;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The contents are not valid settings.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Parses [`RenderSettings`] from RON text. Missing fields keep their defaults.
pub fn parse_render_settings(text: &str) -> Result<RenderSettings, ConfigError> {
    Ok(ron::from_str(text)?)
}

/// Reads and parses a RON settings file.
pub fn load_render_settings(path: impl AsRef<Path>) -> Result<RenderSettings, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let settings = parse_render_settings(&text)?;
    log::info!("Loaded render settings from {}", path.display());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = parse_render_settings("(hiz_culling: false, cluster_workers: 2)").unwrap();
        assert!(!settings.hiz_culling);
        assert_eq!(settings.cluster_workers, 2);
        assert!(settings.transparency);
        assert!(settings.skybox.is_none());
    }

    #[test]
    fn test_skybox_settings() {
        let text = r#"(
            skybox: Some((
                zenith: (r: 0.1, g: 0.2, b: 0.6, a: 1.0),
                horizon: (r: 0.7, g: 0.8, b: 0.9, a: 1.0),
            )),
        )"#;
        let settings = parse_render_settings(text).unwrap();
        let skybox = settings.skybox.unwrap();
        assert_eq!(skybox.zenith.b, 0.6);
    }

    #[test]
    fn test_malformed_settings_error() {
        assert!(matches!(
            parse_render_settings("(hiz_culling: 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            load_render_settings("/definitely/not/here.ron"),
            Err(ConfigError::Io(_))
        ));
    }
}
