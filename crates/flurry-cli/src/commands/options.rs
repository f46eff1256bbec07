//! Emitter flags shared by every command, and scene assembly from them

use anyhow::{Context, Result};
use clap::Args;
use flurry_core::{Clock, GraphicsDevice, MotionModel, TextureImage};
use flurry_particles::{EmitterOptions, FrameScheduler, LogDiagnostics, Scene};
use flurry_render::{builtin_shaders, load_texture, procedural_flake, DEFAULT_FLAKE_SIZE};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct EmitterArgs {
    /// TOML options file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Spawn-rate multiplier (higher spawns more often)
    #[arg(long)]
    pub rate: Option<f32>,

    /// Spawn-count multiplier (higher spawns more per event)
    #[arg(long)]
    pub spawns: Option<f32>,

    /// Motion model: cpu or gpu
    #[arg(long, value_parser = parse_motion)]
    pub motion: Option<MotionModel>,

    /// Log fps and particle counts once per second
    #[arg(long)]
    pub debug: bool,

    /// Particle texture image (defaults to a procedural flake)
    #[arg(long)]
    pub texture: Option<PathBuf>,

    /// Seed for spawn positions and drift
    #[arg(long)]
    pub seed: Option<u32>,
}

fn parse_motion(s: &str) -> Result<MotionModel, String> {
    MotionModel::parse(s).ok_or_else(|| format!("unknown motion model '{}'; valid values: cpu, gpu", s))
}

/// Everything a scene is built from
pub struct Setup {
    pub options: EmitterOptions,
    pub texture: TextureImage,
    pub seed: Option<u32>,
}

impl EmitterArgs {
    /// File options (or defaults) with flag overrides applied, validated
    pub fn options(&self) -> Result<EmitterOptions> {
        let mut options = match &self.config {
            Some(path) => EmitterOptions::load(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?,
            None => EmitterOptions::default(),
        };

        if let Some(rate) = self.rate {
            options.multipliers.spawning.rate = rate;
        }
        if let Some(spawns) = self.spawns {
            options.multipliers.spawning.spawns = spawns;
        }
        if let Some(motion) = self.motion {
            options.motion = motion;
        }
        if self.debug {
            options.debug = true;
        }

        options.validate().context("Invalid emitter options")?;
        Ok(options)
    }

    pub fn resolve(&self) -> Result<Setup> {
        let options = self.options()?;
        let texture = match &self.texture {
            Some(path) => load_texture(path)
                .with_context(|| format!("Failed to load texture {}", path.display()))?,
            None => procedural_flake(DEFAULT_FLAKE_SIZE),
        };
        Ok(Setup {
            options,
            texture,
            seed: self.seed,
        })
    }
}

/// Install the built-in program and add one layer per preset entry
pub fn build_scene<D: GraphicsDevice>(
    device: D,
    setup: &Setup,
    clock: Box<dyn Clock>,
    scheduler: Box<dyn FrameScheduler>,
) -> Result<Scene<D>> {
    let motion = setup.options.motion;
    let mut scene = Scene::new(device, motion, &builtin_shaders(motion), clock, scheduler)
        .context("Failed to install draw program")?;
    if let Some(seed) = setup.seed {
        scene = scene.with_seed(seed);
    }
    if setup.options.debug {
        scene.set_diagnostics(Some(Box::new(LogDiagnostics)));
    }
    for config in setup.options.layer_configs() {
        scene
            .add_layer(config, &setup.texture)
            .with_context(|| format!("Failed to create layer of size {}", config.size))?;
    }
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flurry_core::{ManualClock, VertexLayout};
    use flurry_particles::{ManualScheduler, RecordingDevice};

    #[test]
    fn flags_override_defaults() {
        let args = EmitterArgs {
            rate: Some(2.0),
            motion: Some(MotionModel::Gpu),
            debug: true,
            ..Default::default()
        };
        let options = args.options().unwrap();
        assert_eq!(options.multipliers.spawning.rate, 2.0);
        assert_eq!(options.multipliers.spawning.spawns, 1.0);
        assert_eq!(options.motion, MotionModel::Gpu);
        assert!(options.debug);
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let args = EmitterArgs {
            spawns: Some(0.0),
            ..Default::default()
        };
        assert!(args.options().is_err());
    }

    #[test]
    fn motion_flag_parses() {
        assert_eq!(parse_motion("gpu"), Ok(MotionModel::Gpu));
        assert!(parse_motion("warp").is_err());
    }

    #[test]
    fn scene_gets_one_layer_per_preset() {
        let setup = EmitterArgs::default().resolve().unwrap();
        let scene = build_scene(
            RecordingDevice::new(),
            &setup,
            Box::new(ManualClock::new()),
            Box::new(ManualScheduler::new()),
        )
        .unwrap();
        let sizes: Vec<_> = scene.layers().map(|(_, l)| l.config().size).collect();
        assert_eq!(sizes, vec![3.0, 5.0, 10.0]);
        assert_eq!(
            scene.device().linked_layout(),
            Some(VertexLayout::PositionTexCoord)
        );
    }
}
