mod io;
mod lights;
mod objects;
mod path_trace;
mod photon;
mod photon_trace;
mod render;
mod roulette;
mod sampling;
mod scene;

use std::{error::Error, process::exit, time::Instant};

use env_logger::Env;
use log::{debug, error, info, warn};
use rand::{rngs::SmallRng, SeedableRng};

use crate::{
    io::{read_args, read_input, save_to_png, Args},
    photon_trace::build_photon_maps,
    render::render,
};

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let mut scene = read_input(&args.input, args.resolution)?;
    args.apply(&mut scene.settings);
    info!(
        "Read {} with {} objects and {} lights, rendering at {}x{}",
        args.input,
        scene.objects.len(),
        scene.lights.len(),
        scene.camera.screen_width,
        scene.camera.screen_height
    );

    let bounds = scene.bounds();
    debug!(
        "Scene bounds centered at {} with radius {}",
        bounds.center, bounds.radius
    );

    let mut rng = SmallRng::seed_from_u64(scene.settings.seed);
    let maps = build_photon_maps(&scene, &mut rng);
    if maps.global.is_empty() && maps.caustic.is_empty() {
        warn!("No photons were stored, the image only shows direct light");
    }
    info!(
        "Traced photons in {:.2?}: {} global, {} caustic",
        start.elapsed(),
        maps.global.len(),
        maps.caustic.len()
    );

    let render_start = Instant::now();
    let (film, stats) = render(&scene, &maps);
    info!(
        "Rendered in {:.2?}: {} camera rays, {} rays in total, deepest bounce {}",
        render_start.elapsed(),
        stats.camera_rays,
        stats.rays,
        stats.deepest
    );

    debug!(
        "Camera path outcomes: {} diffuse, {} specular, {} transmitted, {} absorbed",
        stats.diffuse, stats.specular, stats.transmission, stats.absorbed
    );

    if stats.truncated > 0 {
        warn!(
            "{} paths were cut off at the maximum depth of {}",
            stats.truncated, scene.settings.max_ray_depth
        );
    }

    save_to_png(&film, &args.output)?;
    info!("Saved image to {} after {:.2?}", args.output, start.elapsed());

    Ok(())
}

fn main() {
    let Some(args) = read_args() else {
        exit(2);
    };

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(error) = run(&args) {
        error!("{}", error);
        exit(1);
    }
}
