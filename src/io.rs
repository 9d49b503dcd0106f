use std::{
    error::Error,
    fmt::Display,
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use crate::{
    lights::{AreaLight, Attenuation, DirectionalLight, Light, PointLight, SpotLight},
    objects::{Brdf, Object, Quad, Sphere, Triangle},
    scene::{Camera, Film, RenderSettings, Scene},
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use glam::Vec3;
use png::Encoder;
use serde::Deserialize;
use serde_json::{from_str, from_value, Map, Value};

#[derive(Deserialize, Debug)]
struct SceneParams {
    camera: Value,
    #[serde(default)]
    settings: Option<Value>,
    #[serde(default)]
    lights: Map<String, Value>,
    #[serde(default)]
    objects: Map<String, Value>,
}

#[derive(Deserialize, Debug)]
struct CameraParams {
    film_dimensions: [u32; 2],
    origin: [f32; 3],
    look_at: [f32; 3],
    up: [f32; 3],
    field_of_view: f32,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
struct SettingsParams {
    ambient: [f32; 3],
    samples_per_pixel: u32,
    max_ray_depth: u32,
    global_photons: usize,
    caustic_photons: usize,
    nearest_photons: usize,
    max_photon_bounces: u32,
    seed: u64,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
struct MaterialParams {
    diffuse: [f32; 3],
    specular: [f32; 3],
    transmission: [f32; 3],
    emission: [f32; 3],
    shininess: f32,
    index_of_refraction: f32,
}

#[derive(Deserialize, Debug)]
struct SphereParams {
    center: [f32; 3],
    radius: f32,
    #[serde(default)]
    material: MaterialParams,
}

#[derive(Deserialize, Debug)]
struct TriangleParams {
    point1: [f32; 3],
    point2: [f32; 3],
    point3: [f32; 3],
    #[serde(default)]
    material: MaterialParams,
}

#[derive(Deserialize, Debug)]
struct QuadParams {
    corner: [f32; 3],
    u: [f32; 3],
    v: [f32; 3],
    #[serde(default)]
    material: MaterialParams,
}

#[derive(Deserialize, Debug)]
struct DirectionalParams {
    direction: [f32; 3],
    color: [f32; 3],
    #[serde(default = "default_intensity")]
    intensity: f32,
}

#[derive(Deserialize, Debug)]
struct PointParams {
    position: [f32; 3],
    color: [f32; 3],
    #[serde(default = "default_intensity")]
    intensity: f32,
    #[serde(default = "default_attenuation")]
    attenuation: [f32; 3],
}

#[derive(Deserialize, Debug)]
struct SpotParams {
    position: [f32; 3],
    direction: [f32; 3],
    color: [f32; 3],
    #[serde(default = "default_intensity")]
    intensity: f32,
    cutoff_angle: f32,
    #[serde(default)]
    dropoff_rate: f32,
    #[serde(default = "default_attenuation")]
    attenuation: [f32; 3],
}

#[derive(Deserialize, Debug)]
struct AreaParams {
    corner: [f32; 3],
    u: [f32; 3],
    v: [f32; 3],
    color: [f32; 3],
    #[serde(default = "default_intensity")]
    intensity: f32,
    #[serde(default = "default_attenuation")]
    attenuation: [f32; 3],
}

#[derive(Debug)]
pub struct SceneParseError {
    message: String,
}

/// Command-line arguments. Every optional value overrides the matching scene setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub input: String,
    pub output: String,
    pub resolution: Option<[u32; 2]>,
    pub global_photons: Option<usize>,
    pub caustic_photons: Option<usize>,
    pub nearest_photons: Option<usize>,
    pub samples: Option<u32>,
    pub max_depth: Option<u32>,
    pub seed: Option<u64>,
    pub verbose: bool,
}

impl Display for SceneParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for SceneParseError {}

impl SceneParseError {
    fn new(message: impl Into<String>) -> Self {
        SceneParseError {
            message: message.into(),
        }
    }
}

impl Default for SettingsParams {
    fn default() -> Self {
        let defaults = RenderSettings::default();
        SettingsParams {
            ambient: [0.0; 3],
            samples_per_pixel: defaults.samples_per_pixel,
            max_ray_depth: defaults.max_ray_depth,
            global_photons: defaults.global_photons,
            caustic_photons: defaults.caustic_photons,
            nearest_photons: defaults.nearest_photons,
            max_photon_bounces: defaults.max_photon_bounces,
            seed: defaults.seed,
        }
    }
}

impl Default for MaterialParams {
    fn default() -> Self {
        MaterialParams {
            diffuse: [0.0; 3],
            specular: [0.0; 3],
            transmission: [0.0; 3],
            emission: [0.0; 3],
            shininess: 1.0,
            index_of_refraction: 1.0,
        }
    }
}

fn default_intensity() -> f32 {
    1.0
}

fn default_attenuation() -> [f32; 3] {
    [1.0, 0.0, 0.0]
}

impl Args {
    /// Overrides the scene settings with whatever was given on the command line
    pub fn apply(&self, settings: &mut RenderSettings) {
        if let Some(global_photons) = self.global_photons {
            settings.global_photons = global_photons;
        }
        if let Some(caustic_photons) = self.caustic_photons {
            settings.caustic_photons = caustic_photons;
        }
        if let Some(nearest_photons) = self.nearest_photons {
            settings.nearest_photons = nearest_photons;
        }
        if let Some(samples) = self.samples {
            settings.samples_per_pixel = samples;
        }
        if let Some(max_depth) = self.max_depth {
            settings.max_ray_depth = max_depth;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
    }
}

pub fn read_input(filename: &str, resolution: Option<[u32; 2]>) -> Result<Scene, SceneParseError> {
    let Ok(scene_json) = fs::read_to_string(Path::new(filename)) else {
        return Err(SceneParseError::new(format!(
            "Couldn't open file at {}",
            filename
        )));
    };

    parse_scene(&scene_json, resolution)
        .map_err(|error| SceneParseError::new(format!("{}: {}", filename, error)))
}

/// Builds a scene from JSON text. `resolution` replaces the camera's film dimensions.
pub fn parse_scene(
    scene_json: &str,
    resolution: Option<[u32; 2]>,
) -> Result<Scene, SceneParseError> {
    let Ok(scene_params) = from_str::<SceneParams>(scene_json) else {
        return Err(SceneParseError::new("Scene isn't in valid JSON format"));
    };

    build_scene(scene_params, resolution)
}

fn build_scene(
    mut scene_params: SceneParams,
    resolution: Option<[u32; 2]>,
) -> Result<Scene, SceneParseError> {
    let camera = process_camera(scene_params.camera, resolution)?;

    let settings = match scene_params.settings {
        Some(settings_value) => {
            let Ok(settings) = from_value::<SettingsParams>(settings_value) else {
                return Err(SceneParseError::new(
                    "Scene settings aren't correctly formatted",
                ));
            };
            settings
        }
        None => SettingsParams::default(),
    };

    if settings.samples_per_pixel == 0 {
        return Err(SceneParseError::new(
            "Scene settings need at least one sample per pixel",
        ));
    }

    if !is_color(settings.ambient) {
        return Err(SceneParseError::new(
            "Scene ambient light can't have negative channels",
        ));
    }

    let mut objects: Vec<Box<dyn Object>> = Vec::new();
    for (name, object_value) in scene_params.objects.iter_mut() {
        objects.push(process_object(name, object_value)?);
    }

    let mut lights: Vec<Box<dyn Light>> = Vec::new();
    for (name, light_value) in scene_params.lights.iter_mut() {
        lights.push(process_light(name, light_value)?);
    }

    let render_settings = RenderSettings {
        samples_per_pixel: settings.samples_per_pixel,
        max_ray_depth: settings.max_ray_depth,
        global_photons: settings.global_photons,
        caustic_photons: settings.caustic_photons,
        nearest_photons: settings.nearest_photons,
        max_photon_bounces: settings.max_photon_bounces,
        seed: settings.seed,
    };

    Ok(Scene::new(
        camera,
        objects,
        lights,
        Vec3::from_array(settings.ambient),
        render_settings,
    ))
}

fn process_camera(
    camera_value: Value,
    resolution: Option<[u32; 2]>,
) -> Result<Camera, SceneParseError> {
    let Ok(camera_params) = from_value::<CameraParams>(camera_value) else {
        return Err(SceneParseError::new(
            "Camera parameters aren't correctly formatted",
        ));
    };

    if camera_params.field_of_view <= 0.0 || camera_params.field_of_view >= 180.0 {
        return Err(SceneParseError::new(
            "Camera field of view must be between 0 and 180 degrees",
        ));
    }

    let [width, height] = resolution.unwrap_or(camera_params.film_dimensions);
    if width == 0 || height == 0 {
        return Err(SceneParseError::new("Camera film dimensions must be positive"));
    }
    if width.checked_mul(height).is_none() {
        return Err(SceneParseError::new(format!(
            "Camera film dimensions {}x{} are too large",
            width, height
        )));
    }

    let origin = Vec3::from_array(camera_params.origin);
    let look_at = Vec3::from_array(camera_params.look_at);
    let up = Vec3::from_array(camera_params.up);
    if (look_at - origin).cross(up).length_squared() == 0.0 {
        return Err(SceneParseError::new(
            "Camera up direction can't be parallel to the view direction",
        ));
    }

    Ok(Camera::new(
        width,
        height,
        origin,
        look_at,
        up,
        camera_params.field_of_view,
    ))
}

fn process_object(name: &str, object_value: &mut Value) -> Result<Box<dyn Object>, SceneParseError> {
    let Some(object_map) = object_value.as_object_mut() else {
        return Err(SceneParseError::new(format!(
            "{} isn't a valid scene object",
            name
        )));
    };

    let Some((_, object_type)) = object_map.remove_entry("type") else {
        return Err(SceneParseError::new(format!(
            "Object {} doesn't have type field",
            name
        )));
    };

    match object_type.as_str() {
        Some("sphere") => {
            let Ok(sphere_params) = from_value::<SphereParams>(object_value.clone()) else {
                return Err(SceneParseError::new(format!(
                    "Sphere object {} has invalid parameters",
                    name
                )));
            };

            if sphere_params.radius <= 0.0 {
                return Err(SceneParseError::new(format!(
                    "Sphere object {} needs a positive radius",
                    name
                )));
            }

            let brdf = process_material(name, sphere_params.material)?;
            Ok(Box::new(Sphere::new(
                Vec3::from_array(sphere_params.center),
                sphere_params.radius,
                brdf,
            )))
        }
        Some("triangle") => {
            let Ok(triangle_params) = from_value::<TriangleParams>(object_value.clone()) else {
                return Err(SceneParseError::new(format!(
                    "Triangle object {} has invalid parameters",
                    name
                )));
            };

            let point1 = Vec3::from_array(triangle_params.point1);
            let point2 = Vec3::from_array(triangle_params.point2);
            let point3 = Vec3::from_array(triangle_params.point3);
            if (point2 - point1).cross(point3 - point1).length_squared() == 0.0 {
                return Err(SceneParseError::new(format!(
                    "Triangle object {} is degenerate",
                    name
                )));
            }

            let brdf = process_material(name, triangle_params.material)?;
            Ok(Box::new(Triangle::new(point1, point2, point3, brdf)))
        }
        Some("quad") => {
            let Ok(quad_params) = from_value::<QuadParams>(object_value.clone()) else {
                return Err(SceneParseError::new(format!(
                    "Quad object {} has invalid parameters",
                    name
                )));
            };

            let u = Vec3::from_array(quad_params.u);
            let v = Vec3::from_array(quad_params.v);
            if u.cross(v).length_squared() == 0.0 {
                return Err(SceneParseError::new(format!(
                    "Quad object {} is degenerate",
                    name
                )));
            }

            let brdf = process_material(name, quad_params.material)?;
            Ok(Box::new(Quad::new(
                Vec3::from_array(quad_params.corner),
                u,
                v,
                brdf,
            )))
        }
        _ => Err(SceneParseError::new(format!(
            "Object {} has invalid type",
            name
        ))),
    }
}

fn process_material(name: &str, material: MaterialParams) -> Result<Brdf, SceneParseError> {
    let colors = [
        material.diffuse,
        material.specular,
        material.transmission,
        material.emission,
    ];
    if !colors.into_iter().all(is_color) {
        return Err(SceneParseError::new(format!(
            "Object {} has a material with negative color channels",
            name
        )));
    }

    if material.shininess <= 0.0 || material.index_of_refraction <= 0.0 {
        return Err(SceneParseError::new(format!(
            "Object {} needs a positive shininess and index of refraction",
            name
        )));
    }

    Ok(Brdf {
        diffuse: Vec3::from_array(material.diffuse),
        specular: Vec3::from_array(material.specular),
        transmission: Vec3::from_array(material.transmission),
        emission: Vec3::from_array(material.emission),
        shininess: material.shininess,
        index_of_refraction: material.index_of_refraction,
    })
}

fn process_light(name: &str, light_value: &mut Value) -> Result<Box<dyn Light>, SceneParseError> {
    let Some(light_map) = light_value.as_object_mut() else {
        return Err(SceneParseError::new(format!(
            "{} isn't a valid light",
            name
        )));
    };

    let Some((_, light_type)) = light_map.remove_entry("type") else {
        return Err(SceneParseError::new(format!(
            "Light {} doesn't have type field",
            name
        )));
    };

    let invalid_parameters = || {
        SceneParseError::new(format!(
            "{} light {} has invalid parameters",
            light_type.as_str().unwrap_or("Unknown"),
            name
        ))
    };

    let light: Box<dyn Light> = match light_type.as_str() {
        Some("directional") => {
            let params = from_value::<DirectionalParams>(light_value.clone())
                .map_err(|_| invalid_parameters())?;
            check_emission(name, params.color, params.intensity)?;
            let direction = check_direction(name, params.direction)?;

            Box::new(DirectionalLight::new(
                direction,
                Vec3::from_array(params.color),
                params.intensity,
            ))
        }
        Some("point") => {
            let params =
                from_value::<PointParams>(light_value.clone()).map_err(|_| invalid_parameters())?;
            check_emission(name, params.color, params.intensity)?;

            Box::new(PointLight::new(
                Vec3::from_array(params.position),
                Vec3::from_array(params.color),
                params.intensity,
                process_attenuation(name, params.attenuation)?,
            ))
        }
        Some("spot") => {
            let params =
                from_value::<SpotParams>(light_value.clone()).map_err(|_| invalid_parameters())?;
            check_emission(name, params.color, params.intensity)?;
            let direction = check_direction(name, params.direction)?;

            if params.cutoff_angle <= 0.0 || params.cutoff_angle > 180.0 {
                return Err(SceneParseError::new(format!(
                    "Spot light {} needs a cutoff angle between 0 and 180 degrees",
                    name
                )));
            }

            if params.dropoff_rate < 0.0 {
                return Err(SceneParseError::new(format!(
                    "Spot light {} has a negative dropoff rate",
                    name
                )));
            }

            let point = PointLight::new(
                Vec3::from_array(params.position),
                Vec3::from_array(params.color),
                params.intensity,
                process_attenuation(name, params.attenuation)?,
            );

            Box::new(SpotLight::new(
                point,
                direction,
                params.cutoff_angle.to_radians(),
                params.dropoff_rate,
            ))
        }
        Some("area") => {
            let params =
                from_value::<AreaParams>(light_value.clone()).map_err(|_| invalid_parameters())?;
            check_emission(name, params.color, params.intensity)?;

            let u = Vec3::from_array(params.u);
            let v = Vec3::from_array(params.v);
            if u.cross(v).length_squared() == 0.0 {
                return Err(SceneParseError::new(format!(
                    "Area light {} is degenerate",
                    name
                )));
            }

            Box::new(AreaLight::new(
                Vec3::from_array(params.corner),
                u,
                v,
                Vec3::from_array(params.color),
                params.intensity,
                process_attenuation(name, params.attenuation)?,
            ))
        }
        _ => {
            return Err(SceneParseError::new(format!(
                "Light {} has invalid type",
                name
            )))
        }
    };

    Ok(light)
}

fn is_color(color: [f32; 3]) -> bool {
    color.iter().all(|channel| *channel >= 0.0)
}

fn check_emission(name: &str, color: [f32; 3], intensity: f32) -> Result<(), SceneParseError> {
    if is_color(color) && intensity >= 0.0 {
        Ok(())
    } else {
        Err(SceneParseError::new(format!(
            "Light {} can't have a negative color or intensity",
            name
        )))
    }
}

fn check_direction(name: &str, direction: [f32; 3]) -> Result<Vec3, SceneParseError> {
    let direction = Vec3::from_array(direction);
    if direction.length_squared() == 0.0 {
        return Err(SceneParseError::new(format!(
            "Light {} has a zero direction",
            name
        )));
    }

    Ok(direction)
}

fn process_attenuation(name: &str, attenuation: [f32; 3]) -> Result<Attenuation, SceneParseError> {
    let [constant, linear, quadratic] = attenuation;
    if !is_color(attenuation) || constant + linear + quadratic <= 0.0 {
        return Err(SceneParseError::new(format!(
            "Light {} needs non-negative attenuation terms, not all zero",
            name
        )));
    }

    Ok(Attenuation::new(constant, linear, quadratic))
}

fn command() -> Command {
    Command::new("photonmap")
        .about("Renders a JSON scene with photon-mapped global illumination")
        .arg(Arg::new("input").required(true))
        .arg(Arg::new("output").required(true))
        .arg(
            Arg::new("resolution")
                .long("resolution")
                .num_args(2)
                .value_names(["WIDTH", "HEIGHT"])
                .value_parser(value_parser!(u32).range(1..))
                .help("Overrides the camera's film dimensions"),
        )
        .arg(
            Arg::new("global-photons")
                .long("global-photons")
                .value_parser(value_parser!(usize))
                .help("Photons emitted for the global map"),
        )
        .arg(
            Arg::new("caustic-photons")
                .long("caustic-photons")
                .value_parser(value_parser!(usize))
                .help("Photons emitted for the caustic map"),
        )
        .arg(
            Arg::new("nearest-photons")
                .long("nearest-photons")
                .value_parser(value_parser!(usize))
                .help("Photons gathered per radiance estimate"),
        )
        .arg(
            Arg::new("samples")
                .long("samples")
                .value_parser(value_parser!(u32).range(1..))
                .help("Camera rays per pixel"),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .value_parser(value_parser!(u32))
                .help("Deepest bounce a camera path can reach"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Seed for every random choice"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Logs debug output"),
        )
        .arg_required_else_help(true)
}

fn args_from(matches: &ArgMatches) -> Option<Args> {
    let input = matches.get_one::<String>("input")?;
    let output = matches.get_one::<String>("output")?;

    let resolution = match matches.get_many::<u32>("resolution") {
        Some(values) => {
            let values: Vec<u32> = values.copied().collect();
            Some([*values.first()?, *values.get(1)?])
        }
        None => None,
    };

    Some(Args {
        input: input.clone(),
        output: output.clone(),
        resolution,
        global_photons: matches.get_one::<usize>("global-photons").copied(),
        caustic_photons: matches.get_one::<usize>("caustic-photons").copied(),
        nearest_photons: matches.get_one::<usize>("nearest-photons").copied(),
        samples: matches.get_one::<u32>("samples").copied(),
        max_depth: matches.get_one::<u32>("max-depth").copied(),
        seed: matches.get_one::<u64>("seed").copied(),
        verbose: matches.get_flag("verbose"),
    })
}

pub fn read_args() -> Option<Args> {
    args_from(&command().get_matches())
}

pub fn save_to_png(film: &Film, filename: &str) -> Result<(), Box<dyn Error>> {
    let rgb_values: Vec<u8> = film
        .pixel_data
        .iter()
        .flat_map(|rgb| {
            let srgb = rgb.powf(1.0 / 2.2);
            [
                (srgb.x.clamp(0.0, 1.0) * 255.0) as u8,
                (srgb.y.clamp(0.0, 1.0) * 255.0) as u8,
                (srgb.z.clamp(0.0, 1.0) * 255.0) as u8,
            ]
        })
        .collect();

    let mut encoder = Encoder::new(
        BufWriter::new(File::create(Path::new(filename))?),
        film.screen_width,
        film.screen_height,
    );

    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.write_header()?.write_image_data(&rgb_values)?;

    Ok(())
}
