//! Emitter options (parsed from TOML) and the layer presets they produce

use crate::layer::LayerConfig;
use flurry_core::{FlurryError, MotionModel, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Particle variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleKind {
    #[default]
    Snow,
}

/// Snow layers as (size, base rate ms, spawns per event), back to front
const SNOW_PRESET: [(f32, f32, u32); 3] = [(3.0, 100.0, 3), (5.0, 150.0, 2), (10.0, 200.0, 1)];

/// Top-level options, e.g.
///
/// ```toml
/// kind = "snow"
/// debug = true
/// motion = "gpu"
///
/// [multipliers.spawning]
/// rate = 2.0
/// spawns = 1.5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitterOptions {
    pub kind: ParticleKind,
    /// Attach the logging diagnostics sink
    pub debug: bool,
    pub motion: MotionModel,
    pub multipliers: Multipliers,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Multipliers {
    pub spawning: SpawningMultipliers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpawningMultipliers {
    /// Higher values spawn more often
    pub rate: f32,
    /// Higher values spawn more particles per event
    pub spawns: f32,
}

impl Default for SpawningMultipliers {
    fn default() -> Self {
        Self {
            rate: 1.0,
            spawns: 1.0,
        }
    }
}

impl EmitterOptions {
    /// Parse and validate options from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let options: Self = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Parse and validate options from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let spawning = &self.multipliers.spawning;
        for (name, value) in [("rate", spawning.rate), ("spawns", spawning.spawns)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FlurryError::Config(format!(
                    "multipliers.spawning.{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Layer configs for `kind`, in registration order
    pub fn layer_configs(&self) -> Vec<LayerConfig> {
        let preset = match self.kind {
            ParticleKind::Snow => &SNOW_PRESET,
        };
        let spawning = &self.multipliers.spawning;
        preset
            .iter()
            .map(|&(size, base_rate_ms, spawns)| LayerConfig {
                size,
                rate_ms: base_rate_ms / spawning.rate,
                spawn_count: (spawns as f32 * spawning.spawns).ceil() as u32,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_give_snow_preset() {
        let configs = EmitterOptions::default().layer_configs();
        let summary: Vec<_> = configs
            .iter()
            .map(|c| (c.size, c.rate_ms, c.spawn_count))
            .collect();
        assert_eq!(
            summary,
            vec![(3.0, 100.0, 3), (5.0, 150.0, 2), (10.0, 200.0, 1)]
        );
    }

    #[test]
    fn multipliers_scale_rate_and_count() {
        let options = EmitterOptions::from_toml_str(
            r#"
[multipliers.spawning]
rate = 2.0
spawns = 1.5
"#,
        )
        .unwrap();
        let configs = options.layer_configs();
        assert_eq!(configs[0].rate_ms, 50.0);
        assert_eq!(configs[2].rate_ms, 100.0);
        // ceil(4.5), ceil(3.0), ceil(1.5)
        let counts: Vec<_> = configs.iter().map(|c| c.spawn_count).collect();
        assert_eq!(counts, vec![5, 3, 2]);
    }

    #[test]
    fn parses_every_field() {
        let options = EmitterOptions::from_toml_str(
            r#"
kind = "snow"
debug = true
motion = "gpu"
"#,
        )
        .unwrap();
        assert_eq!(options.kind, ParticleKind::Snow);
        assert!(options.debug);
        assert_eq!(options.motion, MotionModel::Gpu);
        assert_eq!(options.multipliers.spawning, SpawningMultipliers::default());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(
            EmitterOptions::from_toml_str("").unwrap(),
            EmitterOptions::default()
        );
    }

    #[test]
    fn rejects_non_positive_multipliers() {
        for body in ["rate = 0.0", "spawns = -1.0", "rate = nan"] {
            let content = format!("[multipliers.spawning]\n{body}\n");
            assert!(
                matches!(
                    EmitterOptions::from_toml_str(&content),
                    Err(FlurryError::Config(_))
                ),
                "{body}"
            );
        }
    }

    #[test]
    fn rejects_unknown_kind_and_fields() {
        assert!(matches!(
            EmitterOptions::from_toml_str("kind = \"rain\""),
            Err(FlurryError::Config(_))
        ));
        assert!(matches!(
            EmitterOptions::from_toml_str("colour = \"white\""),
            Err(FlurryError::Config(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        assert!(matches!(
            EmitterOptions::load("/nonexistent/flurry.toml"),
            Err(FlurryError::Io(_))
        ));
    }
}
