//! Show the media header of a clip.

use std::path::PathBuf;

use tristack_common::config::AppConfig;
use tristack_composer::{FfprobeInspector, MediaInspector};

pub fn run(config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let inspector = FfprobeInspector::new(config.export.ffprobe_binary.clone());
    let header = inspector
        .inspect(&path)
        .map_err(|e| anyhow::anyhow!("Failed to inspect {}: {e}", path.display()))?;

    println!("Clip: {}", path.display());
    println!("  Duration: {:.3}s", header.duration_secs);
    println!("  Audio: {}", if header.has_audio { "yes" } else { "no" });

    if header.video_tracks.is_empty() {
        println!("  Video: none (cannot be used in a collage)");
        return Ok(());
    }

    println!("Video tracks:");
    for track in &header.video_tracks {
        println!(
            "  #{} {} {} @ {:.2}fps{}",
            track.stream_index,
            track.codec,
            track.size,
            track.frame_rate,
            track
                .duration_secs
                .map(|d| format!(" ({d:.3}s)"))
                .unwrap_or_default()
        );
    }

    Ok(())
}
