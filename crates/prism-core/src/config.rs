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

//! Render settings, persisted as RON.
//!
//! Every field has a default, so a settings file only needs to spell out what
//! it changes. Unknown fields are ignored.

use crate::error::ConfigError;
use crate::layers::DEFAULT_LAYER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How a render queue orders meshes inside a layer bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QueueOrdering {
    /// Meshes are inserted next to those sharing their shader and geometry,
    /// keeping same-shader and same-VBO runs contiguous.
    #[default]
    Sorted,
    /// Meshes are appended in registration order.
    Insertion,
}

/// Configuration of one drawer pass of the render technique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    /// Pass name, used in logs and diagnostics.
    pub name: String,
    /// Layers drawn by this pass. Empty means every layer.
    pub layers: Vec<String>,
    /// Lowest sort priority drawn by this pass, inclusive.
    pub min_priority: Option<i32>,
    /// Highest sort priority drawn by this pass, inclusive.
    pub max_priority: Option<i32>,
    /// Shader that replaces every mesh shader in this pass.
    pub override_shader: Option<String>,
    /// Per-shader replacements, by shader name. Ignored when `override_shader` is set.
    pub shader_overrides: BTreeMap<String, String>,
}

impl PassConfig {
    /// A pass drawing every layer with the meshes' own shaders.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            name: "Main".to_string(),
            layers: Vec::new(),
            min_priority: None,
            max_priority: None,
            override_shader: None,
            shader_overrides: BTreeMap::new(),
        }
    }
}

/// Settings of a render context and the scenes it renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Number of frames the GPU may still be working on; released GPU objects
    /// are kept alive for that many frames.
    pub frames_in_flight: u32,
    /// Tags meshes that fail to draw so tools can highlight them.
    pub debug_mode: bool,
    /// Lets editor cameras take part in main camera selection.
    pub editor_mode: bool,
    /// Mesh ordering inside render queues.
    pub queue_ordering: QueueOrdering,
    /// Attempts made to drain pending resources when closing the context.
    pub close_retry_limit: u32,
    /// Pause between two drain attempts, in milliseconds.
    pub close_retry_interval_ms: u64,
    /// Clear color of the black screen fallback and of each frame.
    pub clear_color: [f32; 4],
    /// Render layers, in draw order.
    pub layers: Vec<String>,
    /// Passes of the render technique, in draw order.
    pub technique: Vec<PassConfig>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            debug_mode: false,
            editor_mode: false,
            queue_ordering: QueueOrdering::Sorted,
            close_retry_limit: 50,
            close_retry_interval_ms: 10,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            layers: vec![DEFAULT_LAYER.to_string()],
            technique: vec![PassConfig::default()],
        }
    }
}

impl RenderSettings {
    /// Parses settings from RON text and validates them.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let settings: RenderSettings = ron::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a RON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_ron_str(&text)?;
        log::info!("RenderSettings: loaded from {}", path.display());
        Ok(settings)
    }

    /// Loads settings from `path`, falling back to the defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!(
                "RenderSettings: {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Writes the settings as pretty RON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::new().depth_limit(3);
        let text = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Checks values serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.layers.is_empty() {
            return Err(ConfigError::Invalid("at least one layer is required".to_string()));
        }
        for pass in &self.technique {
            if let (Some(min), Some(max)) = (pass.min_priority, pass.max_priority) {
                if min > max {
                    return Err(ConfigError::Invalid(format!(
                        "pass '{}' has min_priority {min} above max_priority {max}",
                        pass.name
                    )));
                }
            }
            if let Some(layer) = pass.layers.iter().find(|l| !self.layers.contains(l)) {
                return Err(ConfigError::Invalid(format!(
                    "pass '{}' references unknown layer '{layer}'",
                    pass.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = RenderSettings::default();
        assert_eq!(settings.frames_in_flight, 2);
        assert_eq!(settings.close_retry_limit, 50);
        assert_eq!(settings.queue_ordering, QueueOrdering::Sorted);
        assert_eq!(settings.technique.len(), 1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = RenderSettings::from_ron_str("(debug_mode: true)").unwrap();
        assert!(settings.debug_mode);
        assert_eq!(settings.frames_in_flight, 2);
        assert_eq!(settings.layers, vec![DEFAULT_LAYER.to_string()]);
    }

    #[test]
    fn test_technique_from_ron() {
        let text = r#"(
            layers: ["Default", "Transparent"],
            queue_ordering: Insertion,
            technique: [
                (name: "Opaque", layers: ["Default"]),
                (name: "Wire", override_shader: Some("wireframe"), min_priority: Some(0)),
            ],
        )"#;
        let settings = RenderSettings::from_ron_str(text).unwrap();
        assert_eq!(settings.queue_ordering, QueueOrdering::Insertion);
        assert_eq!(settings.technique[0].layers, vec!["Default".to_string()]);
        assert_eq!(
            settings.technique[1].override_shader.as_deref(),
            Some("wireframe")
        );
        assert_eq!(settings.technique[1].max_priority, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            RenderSettings::from_ron_str("(frames_in_flight: 0)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RenderSettings::from_ron_str(
                "(technique: [(name: \"p\", min_priority: Some(2), max_priority: Some(1))])"
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RenderSettings::from_ron_str("(technique: [(layers: [\"Nope\"])])"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RenderSettings::from_ron_str("{{not valid}}"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(frames_in_flight: 3, clear_color: (0.1, 0.2, 0.3, 1.0))").unwrap();

        let settings = RenderSettings::load(file.path()).unwrap();
        assert_eq!(settings.frames_in_flight, 3);
        assert_eq!(settings.clear_color, [0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.ron");

        let mut settings = RenderSettings::default();
        settings.debug_mode = true;
        settings.technique.push(PassConfig::new("Overlay"));
        settings.save(&path).unwrap();

        let loaded = RenderSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RenderSettings::load_or_default(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(settings, RenderSettings::default());
    }
}
