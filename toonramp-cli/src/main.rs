use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use toonramp_core::config::{self, schema::{SceneConfig, ShapeConfig}};
use toonramp_core::export::RenderMeta;
use toonramp_core::render;
use toonramp_core::texture::RampTexture;
use toonramp_core::VERSION;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "toonramp", version = VERSION, about = "Ramp-quantized toon shading on the CPU")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and summarize a scene YAML
    Inspect { path: PathBuf },
    /// Render a scene (or the built-in demo scene) and write PNG
    Render {
        /// Scene YAML; the built-in demo scene when omitted
        scene: Option<PathBuf>,
        #[arg(long, default_value = "toon.png")]
        out: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Also write render metadata as JSON
        #[arg(long)]
        meta: Option<PathBuf>,
    },
    /// Bake one light's shadow atlas and write it as a greyscale depth PNG
    BakeAtlas {
        scene: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        light: usize,
        #[arg(long, default_value = "atlas.png")]
        out: PathBuf,
    },
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_scene(path: Option<&Path>) -> Result<SceneConfig> {
    match path {
        Some(p) => config::load_from_path(p).with_context(|| format!("loading scene {}", p.display())),
        None => Ok(SceneConfig::default()),
    }
}

// Ramp image paths are relative to the scene file.
fn load_ramp(scene: &SceneConfig, scene_path: Option<&Path>) -> Result<RampTexture> {
    let Some(rel) = scene.ramp.path.as_ref() else {
        return Ok(scene.ramp.build_from_bands()?);
    };
    let path = match scene_path.and_then(Path::parent) {
        Some(dir) if rel.is_relative() => dir.join(rel),
        _ => rel.clone(),
    };
    let img = image::open(&path).with_context(|| format!("opening ramp {}", path.display()))?.to_rgba8();
    tracing::debug!(path = %path.display(), width = img.width(), height = img.height(), "loaded ramp");
    Ok(scene.ramp.build_from_rgba8(img.width(), img.height(), img.as_raw())?)
}

fn write_png(path: &Path, width: u32, height: u32, pixels: Vec<u8>) -> Result<()> {
    let img = image::RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("Failed to create image from raw"))?;
    img.save(path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    initialise_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Inspect { path } => {
            let scene = config::load_from_path(&path)?;
            println!("Loaded scene: {}", path.display());
            println!("  output: {}x{}", scene.output.width, scene.output.height);
            println!("  camera: {:?} fov={:.0}° near={} far={}", scene.camera.projection, scene.camera.fov_deg, scene.camera.near, scene.camera.far);
            println!("  shading: {:?}", scene.shading.variant(scene.camera.projection));
            println!("  lights: {} ({} casting shadows)", scene.lights.len(), scene.shadow_casting_lights());
            for (i, l) in scene.lights.iter().enumerate() {
                println!("    [{}] pos={} intensity={} distance={} decay={} shadow={}", i, l.position, l.intensity, l.distance, l.decay, l.cast_shadow);
            }
            println!("  objects: {}", scene.objects.len());
            for (i, o) in scene.objects.iter().enumerate() {
                let kind = match o.shape {
                    ShapeConfig::Sphere { center, radius, .. } => format!("sphere center={} radius={}", center, radius),
                    ShapeConfig::Plane { center, size, .. } => format!("plane center={} size={}", center, size),
                };
                println!("    [{}] {} cast={} receive={}", i, kind, o.cast_shadow, o.receive_shadow);
            }
        }
        Command::Render { scene: scene_path, out, width, height, meta } => {
            let mut scene = load_scene(scene_path.as_deref())?;
            if let Some(w) = width { scene.output.width = w; }
            if let Some(h) = height { scene.output.height = h; }
            scene.validate()?;
            let ramp = load_ramp(&scene, scene_path.as_deref())?;
            let output = render::render_scene(&scene, &ramp)?;
            let fb = &output.framebuffer;
            write_png(&out, fb.width(), fb.height(), fb.as_bytes().to_vec())?;
            println!("Wrote {}x{} image to {}", fb.width(), fb.height(), out.display());
            if let Some(meta_path) = meta {
                RenderMeta::new(&output, scene.shading.variant(scene.camera.projection)).write_json(&meta_path)?;
                println!("Wrote metadata to {}", meta_path.display());
            }
        }
        Command::BakeAtlas { scene: scene_path, light, out } => {
            let scene = load_scene(scene_path.as_deref())?;
            let atlas = render::bake_light_atlas(&scene, light)?;
            write_png(&out, atlas.width(), atlas.height(), atlas.depth_preview_rgba8())?;
            println!("Wrote {}x{} shadow atlas for light {} to {}", atlas.width(), atlas.height(), light, out.display());
        }
    }
    Ok(())
}
