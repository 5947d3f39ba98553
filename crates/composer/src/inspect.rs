//! Media header inspection.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tristack_timeline_model::{FrameSize, MediaHeader, VideoTrackInfo};

/// Reads container headers. Implementations must not decode frames.
pub trait MediaInspector: Send + Sync {
    /// Inspect the file at `path`.
    fn inspect(&self, path: &Path) -> Result<MediaHeader, InspectError>;

    /// Inspector name.
    fn name(&self) -> &str;
}

/// Header inspection failures.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("{binary} is not installed or not in PATH")]
    ProbeUnavailable { binary: String },

    #[error("probe failed for {path}: {stderr}")]
    ProbeFailed { path: PathBuf, stderr: String },

    #[error("malformed probe output: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Inspector backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    binary: String,
}

impl Default for FfprobeInspector {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeInspector {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Whether the probe binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl MediaInspector for FfprobeInspector {
    fn inspect(&self, path: &Path) -> Result<MediaHeader, InspectError> {
        if !path.exists() {
            return Err(InspectError::NotFound(path.to_path_buf()));
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => InspectError::ProbeUnavailable {
                    binary: self.binary.clone(),
                },
                _ => InspectError::Io(e),
            })?;

        if !output.status.success() {
            return Err(InspectError::ProbeFailed {
                path: path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let header = parse_probe_output(&output.stdout)?;
        tracing::debug!(
            path = %path.display(),
            duration_secs = header.duration_secs,
            video_tracks = header.video_tracks.len(),
            "Inspected clip"
        );
        Ok(header)
    }

    fn name(&self) -> &str {
        "ffprobe"
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    disposition: Option<ProbeDisposition>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
///
/// Cover art (attached pictures) is not counted as a video track.
pub fn parse_probe_output(json: &[u8]) -> Result<MediaHeader, InspectError> {
    let probe: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| InspectError::Malformed(e.to_string()))?;

    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let video_tracks = probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .filter(|s| s.disposition.as_ref().map_or(true, |d| d.attached_pic == 0))
        .map(|s| VideoTrackInfo {
            stream_index: s.index,
            codec: s.codec_name.clone().unwrap_or_default(),
            size: FrameSize::new(s.width.unwrap_or(0), s.height.unwrap_or(0)),
            frame_rate: s
                .avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
                .unwrap_or(0.0),
            duration_secs: s
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .filter(|d| d.is_finite()),
        })
        .collect();

    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaHeader {
        duration_secs,
        video_tracks,
        has_audio,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
