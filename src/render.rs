use glam::{Vec2, Vec3};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    path_trace::{PathTracer, TraceStats},
    photon_trace::PhotonMaps,
    sampling::{pixel_rng, Sampler},
    scene::{Film, Scene},
};

/// Averages `samples_per_pixel` traced samples for one pixel, with y counted from the bottom
pub fn render_pixel(
    tracer: &PathTracer,
    x: u32,
    y: u32,
    samples_per_pixel: u32,
    seed: u64,
) -> (Vec3, TraceStats) {
    let camera = &tracer.scene().camera;
    let samples = samples_per_pixel.max(1);
    let mut rng = pixel_rng(seed, x, y);
    let mut stats = TraceStats::default();

    let mut color = Vec3::ZERO;
    for _ in 0..samples {
        let offset = if samples == 1 {
            Vec2::splat(0.5)
        } else {
            Vec2::new(rng.next_uniform(), rng.next_uniform())
        };

        color += tracer.trace_ray(&camera.ray(x, y, offset), 0, &mut rng, &mut stats);
        stats.camera_rays += 1;
    }

    ((color / samples as f32).clamp(Vec3::ZERO, Vec3::ONE), stats)
}

/// Shades every pixel in parallel. Each pixel draws from its own generator, so the image only
/// depends on the seed.
pub fn render(scene: &Scene, maps: &PhotonMaps) -> (Film, TraceStats) {
    let settings = &scene.settings;
    let tracer = PathTracer::new(
        scene,
        &maps.global,
        &maps.caustic,
        settings.nearest_photons,
        settings.max_ray_depth,
    );

    let width = scene.camera.screen_width;
    let height = scene.camera.screen_height;

    let progress = ProgressBar::new(width as u64 * height as u64);
    progress.set_style(
        ProgressStyle::with_template("  render [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} pixels")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let columns = width as usize;
    let pixels: Vec<(Vec3, TraceStats)> = (0..columns * height as usize)
        .into_par_iter()
        .progress_with(progress)
        .map(|i| {
            render_pixel(
                &tracer,
                (i % columns) as u32,
                (i / columns) as u32,
                settings.samples_per_pixel,
                settings.seed,
            )
        })
        .collect();

    let mut film = scene.camera.film();
    let mut stats = TraceStats::default();
    for (i, (color, pixel_stats)) in pixels.into_iter().enumerate() {
        film.set_pixel((i % columns) as u32, (i / columns) as u32, color);
        stats = stats.merge(pixel_stats);
    }

    (film, stats)
}
