//! Check for the external tools TriStack needs.

use tristack_common::config::{config_file_path, AppConfig};
use tristack_composer::FfprobeInspector;
use tristack_render_engine::{FfmpegBackend, TranscodeBackend};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("TriStack System Check");
    println!("{}", "=".repeat(50));

    let backend = FfmpegBackend::from_config(&config.export);
    let ffmpeg_ok = backend.is_available();
    if ffmpeg_ok {
        println!("[OK] Encoder: {}", backend.binary());
    } else {
        println!("[FAIL] Encoder: {} not found in PATH", backend.binary());
    }

    let inspector = FfprobeInspector::new(config.export.ffprobe_binary.clone());
    let ffprobe_ok = inspector.is_available();
    if ffprobe_ok {
        println!("[OK] Probe: {}", inspector.binary());
    } else {
        println!("[FAIL] Probe: {} not found in PATH", inspector.binary());
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: defaults ({} not present)", config_path.display());
    }
    println!("     Output dir: {}", config.output_dir.display());
    println!("     Library dir: {}", config.library_dir.display());

    println!();
    if ffmpeg_ok && ffprobe_ok {
        println!("All required tools are available. TriStack is ready.");
    } else {
        println!("Install ffmpeg (which ships ffprobe) and try again.");
    }

    Ok(())
}
