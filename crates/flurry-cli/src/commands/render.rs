//! Headless render command: simulate frames on a fixed clock, save a PNG

use super::options::{build_scene, EmitterArgs};
use anyhow::{Context, Result};
use flurry_core::{GraphicsDevice, ManualClock};
use flurry_particles::{ManualScheduler, Scene};
use flurry_render::WgpuDevice;

pub struct RenderArgs {
    pub emitter: EmitterArgs,
    pub output: String,
    pub width: u32,
    pub height: u32,
    pub frames: u32,
    pub step_ms: f64,
}

pub fn run(args: RenderArgs) -> Result<()> {
    let setup = args.emitter.resolve()?;

    let device = pollster::block_on(WgpuDevice::headless(args.width, args.height))
        .context("Failed to create headless render context")?;

    let clock = ManualClock::new();
    let scheduler = ManualScheduler::new();
    let mut scene = build_scene(
        device,
        &setup,
        Box::new(clock.clone()),
        Box::new(scheduler.clone()),
    )?;

    let rendered = simulate(&mut scene, &clock, &scheduler, args.frames, args.step_ms)?;
    let particles = scene.particle_count();

    let pixels = scene
        .device()
        .read_pixels()
        .context("Failed to read rendered pixels")?;
    let (width, height) = scene.device().size();

    let img = image::RgbaImage::from_raw(width, height, pixels)
        .context("Failed to create image from pixel data")?;
    img.save(&args.output)
        .context(format!("Failed to save image to {}", args.output))?;

    println!(
        "Rendered {} frame(s) with {} particles to {}x{} image {}",
        rendered, particles, width, height, args.output
    );

    Ok(())
}

/// Drive the scene the way a display would: one tick per requested frame,
/// `step_ms` apart, until `frames` have rendered. Returns the frame count.
pub fn simulate<D: GraphicsDevice>(
    scene: &mut Scene<D>,
    clock: &ManualClock,
    scheduler: &ManualScheduler,
    frames: u32,
    step_ms: f64,
) -> Result<u32> {
    scene.start();
    let mut rendered = 0;
    while rendered < frames && scheduler.take() {
        clock.advance(step_ms);
        scene.tick().context("Frame failed")?;
        rendered += 1;
    }
    scene.stop();
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flurry_particles::RecordingDevice;

    fn recording_scene(clock: &ManualClock, scheduler: &ManualScheduler) -> Scene<RecordingDevice> {
        let setup = EmitterArgs::default().resolve().unwrap();
        build_scene(
            RecordingDevice::new(),
            &setup,
            Box::new(clock.clone()),
            Box::new(scheduler.clone()),
        )
        .unwrap()
    }

    #[test]
    fn simulate_renders_requested_frames() {
        let clock = ManualClock::new();
        let scheduler = ManualScheduler::new();
        let mut scene = recording_scene(&clock, &scheduler);

        let rendered = simulate(&mut scene, &clock, &scheduler, 60, 16.0).unwrap();
        assert_eq!(rendered, 60);
        assert_eq!(scene.device().frames_prepared(), 60);
        assert!(!scene.is_running());
        assert!(scene.particle_count() > 0);
    }

    #[test]
    fn simulate_stops_on_draw_failure() {
        let clock = ManualClock::new();
        let scheduler = ManualScheduler::new();
        let mut scene = recording_scene(&clock, &scheduler);
        scene.device_mut().fail_draws = true;

        assert!(simulate(&mut scene, &clock, &scheduler, 10, 16.0).is_err());
        assert_eq!(scene.device().frames_prepared(), 1);
    }
}
