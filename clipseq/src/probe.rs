//! Media metadata from the external `ffprobe` tool, normalised into a [`MediaDescriptor`].

use std::path::{Path, PathBuf};
use std::process::Command;

use num_rational::Ratio;
use serde::Deserialize;
use url::Url;

use crate::error::{Result, SeqError};
use crate::rate::RateInfo;
use crate::time::{self, Seconds};

/// Frame rate assumed when the stream reports none.
pub const DEFAULT_FRAME_RATE: FrameRate = FrameRate {
    numerator: 60000,
    denominator: 1001,
};

/// Audio sample rate assumed when the stream reports none (or there is no audio).
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Start timecode assumed when the container carries no `timecode` tag.
pub const DEFAULT_START_TIMECODE: &str = "00:00:00:00";

/// Raw `ffprobe -print_format json -show_format -show_streams` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub format: ProbeFormat,
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    /// Seconds; ffprobe emits a string but numbers are accepted too.
    #[serde(default)]
    pub duration: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Option<ProbeTags>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeTags {
    #[serde(default)]
    pub timecode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub r_frame_rate: Option<String>,
    #[serde(default)]
    pub avg_frame_rate: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub sample_aspect_ratio: Option<String>,
    #[serde(default)]
    pub field_order: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<serde_json::Value>,
    #[serde(default)]
    pub channels: Option<u32>,
}

/// A frame rate as a ratio, e.g. 30000/1001.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    /// Parse an ffprobe `N/D` rate. Degenerate rates (`0/0`, zero numerator or
    /// denominator) yield `None`.
    pub fn parse(s: &str) -> Option<FrameRate> {
        let (num, den) = s.trim().split_once('/')?;
        let rate = FrameRate {
            numerator: num.trim().parse().ok()?,
            denominator: den.trim().parse().ok()?,
        };
        (rate.numerator > 0 && rate.denominator > 0).then_some(rate)
    }

    pub fn as_ratio(&self) -> Ratio<i128> {
        Ratio::new(self.numerator as i128, self.denominator as i128)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOrder {
    Progressive,
    /// Interlaced or unknown ordering, carried verbatim (e.g. `tt`, `bb`).
    Other(String),
}

impl FieldOrder {
    fn from_probe(value: Option<&str>) -> Self {
        match value {
            None | Some("progressive") => FieldOrder::Progressive,
            Some(other) => FieldOrder::Other(other.to_string()),
        }
    }

    /// Value for `<fielddominance>`.
    pub fn field_dominance(&self) -> &str {
        match self {
            FieldOrder::Progressive => "none",
            FieldOrder::Other(order) => order,
        }
    }
}

/// Normalised technical metadata for one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescriptor {
    pub path: PathBuf,
    pub duration_seconds: Seconds,
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
    /// `square` for 1:1, otherwise the stream's sample aspect ratio.
    pub pixel_aspect_ratio: String,
    pub field_order: FieldOrder,
    pub audio_sample_rate: u32,
    pub audio_channel_count: u32,
    /// Container start timecode (`HH:MM:SS:FF`).
    pub start_timecode: String,
}

impl MediaDescriptor {
    /// Build a descriptor from probe output for the file at `path`.
    pub fn from_probe(path: &Path, probe: &ProbeOutput) -> Result<MediaDescriptor> {
        let stream_of = |kind: &str| {
            probe
                .streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some(kind))
        };
        let video = stream_of("video").ok_or_else(|| SeqError::NoVideoStream {
            path: path.to_path_buf(),
        })?;
        let audio = stream_of("audio");

        let (width, height) = match (video.width, video.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(SeqError::MissingDimensions {
                    path: path.to_path_buf(),
                });
            }
        };

        let frame_rate = video
            .r_frame_rate
            .as_deref()
            .and_then(FrameRate::parse)
            .or_else(|| video.avg_frame_rate.as_deref().and_then(FrameRate::parse))
            .unwrap_or(DEFAULT_FRAME_RATE);

        let duration_seconds = probe
            .format
            .duration
            .as_ref()
            .and_then(json_decimal)
            .unwrap_or_else(|| Ratio::from_integer(0));

        let pixel_aspect_ratio = match video.sample_aspect_ratio.as_deref() {
            None | Some("1:1") => "square".to_string(),
            Some(sar) => sar.to_string(),
        };

        let audio_sample_rate = audio
            .and_then(|a| a.sample_rate.as_ref())
            .and_then(json_decimal)
            .map(|r| r.to_integer() as u32)
            .filter(|&r| r > 0)
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        let audio_channel_count = audio.and_then(|a| a.channels).unwrap_or(0);

        let start_timecode = probe
            .format
            .tags
            .as_ref()
            .and_then(|t| t.timecode.clone())
            .unwrap_or_else(|| DEFAULT_START_TIMECODE.to_string());

        Ok(MediaDescriptor {
            path: path.to_path_buf(),
            duration_seconds,
            frame_rate,
            width,
            height,
            pixel_aspect_ratio,
            field_order: FieldOrder::from_probe(video.field_order.as_deref()),
            audio_sample_rate,
            audio_channel_count,
            start_timecode,
        })
    }

    pub fn rate(&self) -> RateInfo {
        RateInfo::from_frame_rate(self.frame_rate.numerator, self.frame_rate.denominator)
    }

    /// Duration in frames at the real (not nominal) frame rate.
    pub fn duration_frames(&self) -> Result<i64> {
        time::scale_round(&self.duration_seconds, &self.frame_rate.as_ratio())
            .ok_or_else(|| self.duration_out_of_range())
    }

    /// Duration in ticks, taken directly from seconds.
    pub fn duration_ticks(&self) -> Result<i64> {
        time::seconds_to_ticks(&self.duration_seconds).ok_or_else(|| self.duration_out_of_range())
    }

    fn duration_out_of_range(&self) -> SeqError {
        SeqError::DurationOutOfRange {
            path: self.path.clone(),
            duration: self.duration_seconds.to_string(),
        }
    }

    /// Duration as an `MM:SS` clock string.
    pub fn clock_string(&self) -> String {
        time::seconds_to_clock_string(&self.duration_seconds)
    }

    pub fn has_audio(&self) -> bool {
        self.audio_channel_count > 0
    }

    /// File name including extension.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// File name without extension; used as the sequence name.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// `file://` URL of the source, percent-encoded.
    pub fn path_url(&self) -> Result<String> {
        let failed = |message: String| SeqError::ProbeFailed {
            path: self.path.clone(),
            message,
        };
        let absolute = std::path::absolute(&self.path)
            .map_err(|e| failed(format!("cannot resolve absolute path: {}", e)))?;
        Url::from_file_path(&absolute)
            .map(String::from)
            .map_err(|()| failed("cannot express path as a file URL".to_string()))
    }
}

fn json_decimal(value: &serde_json::Value) -> Option<Seconds> {
    match value {
        serde_json::Value::String(s) => time::parse_decimal(s),
        serde_json::Value::Number(n) => time::parse_decimal(&n.to_string()),
        _ => None,
    }
}

/// Source of probe output for a media file.
pub trait MediaProbe {
    fn probe(&self, path: &Path) -> Result<ProbeOutput>;
}

/// Runs the `ffprobe` binary as a subprocess.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    pub binary: PathBuf,
}

impl Default for Ffprobe {
    fn default() -> Self {
        Ffprobe {
            binary: PathBuf::from("ffprobe"),
        }
    }
}

impl MediaProbe for Ffprobe {
    fn probe(&self, path: &Path) -> Result<ProbeOutput> {
        let failed = |message: String| SeqError::ProbeFailed {
            path: path.to_path_buf(),
            message,
        };

        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| failed(format!("could not run {}: {}", self.binary.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| failed(format!("invalid probe JSON: {}", e)))
    }
}

/// Probe `path` and normalise the result.
pub fn read_media_descriptor(probe: &dyn MediaProbe, path: &Path) -> Result<MediaDescriptor> {
    if !path.is_file() {
        return Err(SeqError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    let output = probe.probe(path)?;
    let descriptor = MediaDescriptor::from_probe(path, &output)?;
    log::debug!(
        "Probed {}: {}x{} @ {}/{} fps, {}s, {} audio channel(s)",
        path.display(),
        descriptor.width,
        descriptor.height,
        descriptor.frame_rate.numerator,
        descriptor.frame_rate.denominator,
        descriptor.duration_seconds,
        descriptor.audio_channel_count
    );
    Ok(descriptor)
}
