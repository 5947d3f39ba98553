//! Print the render plan without encoding.

use std::path::PathBuf;

use tristack_common::config::AppConfig;
use tristack_composer::{FfprobeInspector, TimelineComposer};
use tristack_render_engine::FfmpegBackend;

pub fn run(config: &AppConfig, clips: Vec<PathBuf>, legacy_layout: bool) -> anyhow::Result<()> {
    let batch = super::batch(clips)?;
    let layout = super::layout(config, legacy_layout);
    let inspector = FfprobeInspector::new(config.export.ffprobe_binary.clone());

    let spec = TimelineComposer::new(&inspector, layout).compose(&batch)?;

    println!("{}", spec.to_json_pretty()?);

    if layout.bands_overlap(batch.len()) {
        let overlap = layout.band_rect(0).vertical_overlap(&layout.band_rect(1));
        println!();
        println!("Note: adjacent bands overlap by {overlap:.0}px");
    }

    let output = config.output_dir.join("verticalCollage.mp4");
    let args = FfmpegBackend::from_config(&config.export).build_args(&spec, &output)?;
    println!();
    println!("{} {}", config.export.ffmpeg_binary, shell_join(&args));

    Ok(())
}

fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || "'\"[];$*".contains(c)) {
                format!("'{}'", arg.replace('\'', r"'\''"))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_join_quotes_filter_graphs() {
        let args = vec![
            "-i".to_string(),
            "my clip.mp4".to_string(),
            "-map".to_string(),
            "[vout]".to_string(),
            "scale=w='iw*0.5'".to_string(),
        ];
        assert_eq!(
            shell_join(&args),
            r"-i 'my clip.mp4' -map '[vout]' 'scale=w='\''iw*0.5'\'''"
        );
    }
}
