//! ffmpeg transcode backend.
//!
//! The render spec becomes one `filter_complex` graph: a black canvas of
//! the output frame size with each layer trimmed, scaled and overlaid at
//! its band offset. Band 0 is drawn last so it sits on top when bands
//! overlap.

use std::path::Path;
use std::process::{Command as StdCommand, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tristack_common::config::ExportDefaults;
use tristack_timeline_model::{LayerInstruction, RenderSpec};

use crate::backend::{BackendError, TranscodeBackend};
use crate::progress::{CancelSignal, ProgressReporter};

/// Keep at most this much ffmpeg stderr in error messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// The fixed encode settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePreset {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
}

impl Default for EncodePreset {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
        }
    }
}

impl EncodePreset {
    pub fn from_defaults(defaults: &ExportDefaults) -> Self {
        Self {
            video_codec: defaults.video_codec.clone(),
            preset: defaults.preset.clone(),
            crf: defaults.crf,
            ..Self::default()
        }
    }

    fn codec_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }
}

/// Backend that shells out to `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    binary: String,
    preset: EncodePreset,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg", EncodePreset::default())
    }
}

impl FfmpegBackend {
    pub fn new(binary: impl Into<String>, preset: EncodePreset) -> Self {
        Self {
            binary: binary.into(),
            preset,
        }
    }

    pub fn from_config(defaults: &ExportDefaults) -> Self {
        Self::new(
            defaults.ffmpeg_binary.clone(),
            EncodePreset::from_defaults(defaults),
        )
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn preset(&self) -> &EncodePreset {
        &self.preset
    }

    /// Full ffmpeg argument list for rendering `spec` into `output`.
    pub fn build_args(&self, spec: &RenderSpec, output: &Path) -> Result<Vec<String>, BackendError> {
        let graph = build_filter_graph(spec)?;

        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
        ];

        for track in spec.timeline().tracks() {
            args.push("-i".to_string());
            args.push(track.source.to_string_lossy().to_string());
        }

        args.extend([
            "-filter_complex".to_string(),
            graph,
            "-map".to_string(),
            "[vout]".to_string(),
            "-an".to_string(),
            "-r".to_string(),
            spec.fps().to_string(),
        ]);
        args.extend(self.preset.codec_args());
        args.extend([
            "-t".to_string(),
            format!("{:.6}", spec.duration_secs()),
            "-f".to_string(),
            "mp4".to_string(),
            output.to_string_lossy().to_string(),
        ]);

        Ok(args)
    }

    async fn wait_or_cancel(
        &self,
        child: &mut Child,
        cancel: &CancelSignal,
    ) -> Result<std::process::ExitStatus, BackendError> {
        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = cancel.cancelled() => {
                kill_child(child).await;
                Err(BackendError::Cancelled)
            }
        }
    }
}

#[async_trait]
impl TranscodeBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    async fn transcode(
        &self,
        spec: &RenderSpec,
        output: &Path,
        progress: &ProgressReporter,
        cancel: CancelSignal,
    ) -> Result<(), BackendError> {
        let args = self.build_args(spec, output)?;
        tracing::debug!(args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BackendError::Unavailable {
                    binary: self.binary.clone(),
                },
                _ => BackendError::Spawn(e.to_string()),
            })?;

        tracing::info!(
            pid = child.id(),
            inputs = spec.timeline().len(),
            total_frames = spec.total_frames(),
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Spawn("failed to capture ffmpeg stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackendError::Spawn("failed to capture ffmpeg stderr".into()))?;

        // ffmpeg blocks if its stderr pipe fills up.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let duration_secs = spec.duration_secs();
        let mut state = ProgressState::default();
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Cancellation requested, killing ffmpeg");
                    kill_child(&mut child).await;
                    stderr_task.abort();
                    return Err(BackendError::Cancelled);
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if let Some((key, value)) = line.trim().split_once('=') {
                        state.update(key, value);
                        if key == "progress" {
                            progress.report(state.fraction(duration_secs));
                        }
                    }
                }
            }
        }

        let status = self.wait_or_cancel(&mut child, &cancel).await?;
        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(BackendError::Failed {
                status: status.to_string(),
                stderr: stderr_tail(&stderr_output),
            });
        }

        tracing::info!(output = %output.display(), "ffmpeg finished");
        Ok(())
    }
}

/// Build the `filter_complex` graph for `spec`. The result is labelled
/// `[vout]`.
pub fn build_filter_graph(spec: &RenderSpec) -> Result<String, BackendError> {
    let frame = spec.frame();
    let duration = spec.duration_secs();

    let mut layers: Vec<(usize, &LayerInstruction)> = Vec::with_capacity(spec.layers().len());
    for layer in spec.layers() {
        if !layer.transform.is_axis_aligned() {
            return Err(BackendError::unsupported(format!(
                "{} has a rotating or shearing transform",
                layer.track_id
            )));
        }
        let (sx, sy) = layer.transform.scale_factors();
        if sx <= 0.0 || sy <= 0.0 {
            return Err(BackendError::unsupported(format!(
                "{} has a non-positive scale",
                layer.track_id
            )));
        }
        let input = spec
            .timeline()
            .tracks()
            .iter()
            .position(|t| t.id == layer.track_id)
            .ok_or_else(|| BackendError::unsupported(format!("{} is not on the timeline", layer.track_id)))?;
        layers.push((input, layer));
    }

    // Highest band first so band 0 ends up on top.
    layers.sort_by(|a, b| b.1.band_index.cmp(&a.1.band_index));

    let mut graph = format!(
        "color=c=black:s={w}x{h}:r={fps}:d={duration:.6}[base0]",
        w = frame.width,
        h = frame.height,
        fps = spec.fps(),
    );

    for (step, (input, layer)) in layers.iter().enumerate() {
        let track = &spec.timeline().tracks()[*input];
        let (sx, sy) = layer.transform.scale_factors();
        let (tx, ty) = layer.transform.translation_offset();

        graph.push_str(&format!(
            ";[{input}:v:0]trim=start={start:.6}:duration={len:.6},setpts=PTS-STARTPTS,scale=w='iw*{sx:.6}':h='ih*{sy:.6}',setsar=1[layer{step}]",
            start = track.source_range.start_secs,
            len = track.source_range.duration_secs,
        ));
        graph.push_str(&format!(
            ";[base{step}][layer{step}]overlay=x={tx}:y={ty}:eof_action=pass[base{next}]",
            tx = tx.round() as i64,
            ty = ty.round() as i64,
            next = step + 1,
        ));
    }

    graph.push_str(&format!(";[base{}]format=yuv420p[vout]", layers.len()));
    Ok(graph)
}

/// Parsed `-progress` key/value state.
#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            "out_time_ms" | "out_time_us" => {
                // Both keys carry microseconds.
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_duration_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    }
}

async fn kill_child(child: &mut Child) {
    if let Err(err) = child.kill().await {
        tracing::warn!(error = %err, "Failed to kill ffmpeg");
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

/// Whether `binary` can be executed.
pub fn command_exists(binary: &str) -> bool {
    StdCommand::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tristack_timeline_model::{
        AffineTransform, CompositionInstruction, FrameSize, LayoutConfig, TimeRange, Timeline,
        VideoTrackInfo,
    };

    fn spec(layout: LayoutConfig, durations: &[f64]) -> RenderSpec {
        let mut timeline = Timeline::new();
        for (i, d) in durations.iter().enumerate() {
            let video = VideoTrackInfo {
                stream_index: 0,
                codec: "h264".into(),
                size: FrameSize::LANDSCAPE_1080P,
                frame_rate: 30.0,
                duration_secs: Some(*d),
            };
            timeline
                .insert_track(i, format!("/clips/{i}.mp4"), &video, TimeRange::from_zero(*d))
                .unwrap();
        }
        let range = timeline.full_range();
        let layers = timeline
            .tracks()
            .iter()
            .enumerate()
            .map(|(i, t)| LayerInstruction {
                track_id: t.id,
                band_index: i,
                transform: layout.band_transform(i),
                time_range: range,
            })
            .collect();
        RenderSpec::new(
            layout.frame,
            layout.fps,
            timeline,
            CompositionInstruction {
                time_range: range,
                layers,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_filter_graph_places_bands() {
        let graph = build_filter_graph(&spec(LayoutConfig::legacy(), &[10.0, 6.0, 8.0])).unwrap();

        assert!(graph.starts_with("color=c=black:s=1080x1920:r=30:d=10.000000[base0]"));
        assert!(graph.contains("[2:v:0]trim=start=0.000000:duration=8.000000"));
        assert!(graph.contains("scale=w='iw*0.562500':h='ih*0.666667'"));
        assert!(graph.contains("overlay=x=0:y=1220:eof_action=pass[base1]"));
        assert!(graph.contains("overlay=x=0:y=610:eof_action=pass[base2]"));
        assert!(graph.contains("overlay=x=0:y=0:eof_action=pass[base3]"));
        assert!(graph.ends_with("[base3]format=yuv420p[vout]"));
    }

    #[test]
    fn test_band_zero_is_overlaid_last() {
        let graph = build_filter_graph(&spec(LayoutConfig::default(), &[2.0, 2.0, 2.0])).unwrap();
        let top = graph.find("[0:v:0]").unwrap();
        let bottom = graph.find("[2:v:0]").unwrap();
        assert!(bottom < top);
    }

    #[test]
    fn test_rotation_is_rejected() {
        let layout = LayoutConfig::default();
        let base = spec(layout, &[2.0, 2.0, 2.0]);
        let mut instruction = base.instruction().clone();
        instruction.layers[1].transform = AffineTransform {
            b: 0.5,
            c: -0.5,
            ..instruction.layers[1].transform
        };
        let rotated = RenderSpec::new(
            base.frame(),
            base.fps(),
            base.timeline().clone(),
            instruction,
        )
        .unwrap();

        let err = build_filter_graph(&rotated).unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[test]
    fn test_build_args() {
        let backend = FfmpegBackend::default();
        let args = backend
            .build_args(
                &spec(LayoutConfig::default(), &[4.0, 4.0, 4.0]),
                Path::new("/tmp/out/collage.mp4"),
            )
            .unwrap();

        let inputs: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| flag.as_str() == "-i")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(inputs, ["/clips/0.mp4", "/clips/1.mp4", "/clips/2.mp4"]);

        for expected in ["-an", "libx264", "medium", "23", "yuv420p", "+faststart", "pipe:1"] {
            assert!(args.iter().any(|a| a == expected), "missing {expected}");
        }
        assert_eq!(args.last().unwrap(), "/tmp/out/collage.mp4");
    }

    #[test]
    fn test_progress_state() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2500000");
        assert!((state.fraction(10.0) - 0.25).abs() < 1e-9);

        state.update("out_time_ms", "20000000");
        assert_eq!(state.fraction(10.0), 1.0);

        state.update("out_time_us", "N/A");
        assert_eq!(state.fraction(0.0), 0.0);

        state.update("progress", "end");
        assert_eq!(state.fraction(10.0), 1.0);
    }

    #[test]
    fn test_stderr_tail_keeps_end() {
        let long = "x".repeat(STDERR_TAIL_BYTES * 2) + "final error";
        let tail = stderr_tail(&long);
        assert!(tail.ends_with("final error"));
        assert!(tail.len() <= STDERR_TAIL_BYTES + 3);
    }

    #[test]
    fn test_encode_preset_from_defaults() {
        let preset = EncodePreset::from_defaults(&ExportDefaults::default());
        assert_eq!(preset, EncodePreset::default());
    }

    #[test]
    fn test_command_exists_takes_paths_literally() {
        assert!(!command_exists("tristack-no-such-ffmpeg"));
        assert!(!command_exists("/opt/o'brien/bin/ffmpeg"));
        assert!(!command_exists("ffmpeg; touch /tmp/tristack-injected"));
        assert!(!Path::new("/tmp/tristack-injected").exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let backend = FfmpegBackend::new("tristack-no-such-ffmpeg", EncodePreset::default());
        assert!(!backend.is_available());

        let dir = tempfile::tempdir().unwrap();
        let (_canceller, signal) = crate::progress::cancel_pair();
        let err = backend
            .transcode(
                &spec(LayoutConfig::default(), &[1.0, 1.0, 1.0]),
                &dir.path().join("out.mp4"),
                &ProgressReporter::new(),
                signal,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable { .. }));
    }
}
