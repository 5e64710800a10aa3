//! Volume inspector: loads a scene description and reports on every volume.
//!
//! Usage: cargo run --release --bin volume_info -- --scene <PATH> [OPTIONS]
//!
//! Options:
//!   --scene <PATH>    Scene description (JSON)
//!   --config <PATH>   Device configuration (JSON, default: built-in defaults)
//!   --sample <X,Y,Z>  Grid position to classify (default: volume centre)
//!
//! Configuration errors terminate the process with exit code 1.

use std::path::PathBuf;
use std::process::ExitCode;

use glam::Vec3;

use rkvol::core::logging;
use rkvol::scene::load_scene;
use rkvol::{Device, DeviceConfig};

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(scene_path) = parse_str_arg(&args, "--scene").map(PathBuf::from) else {
        eprintln!("usage: volume_info --scene <PATH> [--config <PATH>] [--sample X,Y,Z]");
        return ExitCode::from(2);
    };
    let sample = match parse_str_arg(&args, "--sample") {
        Some(s) => match parse_vec3(&s) {
            Some(v) => Some(v),
            None => {
                eprintln!("invalid --sample '{}', expected X,Y,Z", s);
                return ExitCode::from(2);
            }
        },
        None => None,
    };

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match DeviceConfig::load(&PathBuf::from(path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => DeviceConfig::default(),
    };
    config.fail_fast = true;

    let device = Device::new(config);
    let scene = match load_scene(&device, &scene_path) {
        Ok(scene) => scene,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("=== {} ===", scene_path.display());
    for (name, volume) in scene.volumes() {
        let guard = volume.read();
        let compiled = match guard.compiled() {
            Ok(compiled) => compiled,
            Err(e) => {
                log::error!("{}: {}", name, e);
                return ExitCode::FAILURE;
            }
        };
        let dims = compiled.dimensions();
        let store = compiled.store();
        let position = sample.unwrap_or_else(|| compiled.bounds().center());
        let rgba = compiled.sample_color(position);

        println!("{} ({})", name, guard.id());
        println!("  voxel type:     {}", compiled.voxel_type());
        println!("  dimensions:     {}x{}x{}", dims.x, dims.y, dims.z);
        println!("  sampling step:  {:.6}", compiled.sampling_step());
        println!(
            "  bricks:         {}/{} allocated ({}KB)",
            store.allocated_bricks(),
            store.brick_count(),
            store.allocated_bytes() / 1024
        );
        println!(
            "  sample {:?}: value {:.4} rgba ({:.3}, {:.3}, {:.3}, {:.3})",
            position.to_array(),
            compiled.sample(position),
            rgba.x,
            rgba.y,
            rgba.z,
            rgba.w
        );
    }

    ExitCode::SUCCESS
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_vec3(s: &str) -> Option<Vec3> {
    let parts: Vec<f32> = s.split(',').map(|p| p.trim().parse().ok()).collect::<Option<_>>()?;
    match parts.as_slice() {
        [x, y, z] => Some(Vec3::new(*x, *y, *z)),
        _ => None,
    }
}
