//! Compose, export and save a collage.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tristack_common::config::AppConfig;
use tristack_common::error::CollageError;
use tristack_composer::FfprobeInspector;
use tristack_render_engine::{
    CollagePipeline, DirectoryLibrary, ExportEngine, ExportSettings, FfmpegBackend, MediaLibrary,
};

pub async fn run(
    config: &AppConfig,
    clips: Vec<PathBuf>,
    output: Option<PathBuf>,
    library: Option<PathBuf>,
    no_save: bool,
    legacy_layout: bool,
) -> anyhow::Result<()> {
    let batch = match super::batch(clips) {
        Ok(batch) => batch,
        Err(e) => {
            println!("Clip selection failed [{}]: {e}", e.kind());
            return Err(e.into());
        }
    };
    let layout = super::layout(config, legacy_layout);
    let output_path = output.unwrap_or_else(|| config.output_dir.join("verticalCollage.mp4"));

    let inspector = FfprobeInspector::new(config.export.ffprobe_binary.clone());
    let backend = FfmpegBackend::from_config(&config.export);
    let engine = ExportEngine::new(Arc::new(backend))
        .with_settings(ExportSettings::from(&config.export));
    let pipeline = CollagePipeline::new(Arc::new(inspector), layout, engine);

    println!("Composing collage:");
    for (i, clip) in batch.locations().iter().enumerate() {
        println!("  Band {}: {}", i + 1, clip.display());
    }
    println!("  Output: {}", output_path.display());
    println!("  Frame: {} @ {}fps", layout.frame, layout.fps);

    let mut handle = match pipeline.start(&batch, &output_path).await {
        Ok(handle) => handle,
        Err(e) => {
            println!("Composition failed [{}]: {e}", e.kind());
            return Err(e.into());
        }
    };

    let canceller = handle.canceller();
    let mut interrupted = false;
    loop {
        tokio::select! {
            fraction = handle.next_progress() => match fraction {
                Some(p) => {
                    print!("\r  Progress: {:.1}%  ", p * 100.0);
                    let _ = std::io::stdout().flush();
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                println!("\n  Cancelling...");
                canceller.cancel();
            }
        }
    }

    let exported = match handle.wait().await {
        Ok(path) => {
            println!("\nExport complete: {}", path.display());
            path
        }
        Err(e) => {
            let e = CollageError::from(e);
            println!("\nExport failed [{}]: {e}", e.kind());
            return Err(e.into());
        }
    };

    if no_save {
        return Ok(());
    }

    let library = DirectoryLibrary::new(library.unwrap_or_else(|| config.library_dir.clone()));
    match library.commit(&exported) {
        Ok(saved) => println!("Saved to library: {}", saved.display()),
        Err(e) => {
            println!("Saving to library failed [{}]: {e}", e.kind());
            return Err(e.into());
        }
    }

    Ok(())
}
