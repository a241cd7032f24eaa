//! End-to-end generation: probe, normalise, seed, populate, write.

use std::fs;
use std::path::{Path, PathBuf};

use crate::assemble::{self, Placement};
use crate::clips::ClipList;
use crate::error::{Result, SeqError};
use crate::format;
use crate::probe::{self, MediaProbe};
use crate::template;
use crate::timeline;

/// Configuration for a single generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerateConfig {
    /// Source video.
    pub video: PathBuf,
    /// Clip list JSON.
    pub clips: PathBuf,
    /// Final document. Defaults to `<workdir>/<video stem>_final.xml`.
    pub output: Option<PathBuf>,
    /// Template document. `None` uses the built-in template.
    pub template: Option<PathBuf>,
    /// Directory for intermediates and the default output. Defaults to the
    /// video's directory.
    pub workdir: Option<PathBuf>,
    /// Keep the seeded sequence and normalised clip list in the work directory.
    pub keep_intermediate: bool,
}

impl GenerateConfig {
    pub fn work_dir(&self) -> PathBuf {
        match &self.workdir {
            Some(dir) => dir.clone(),
            None => self
                .video
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    fn video_stem(&self) -> String {
        self.video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.work_dir().join(format!("{}_final.xml", self.video_stem())))
    }

    /// Seeded sequence written with `keep_intermediate`.
    pub fn sequence_path(&self) -> PathBuf {
        self.work_dir().join(format!("{}_sequence.xml", self.video_stem()))
    }

    /// Normalised clip list written with `keep_intermediate`.
    pub fn normalized_clips_path(&self) -> PathBuf {
        self.work_dir().join(format!("{}_clips.json", self.video_stem()))
    }
}

/// Validate a generation configuration (without checking input files).
pub fn validate_config(config: &GenerateConfig) -> std::result::Result<(), String> {
    if config.video.as_os_str().is_empty() {
        return Err("Expected a video file as input!".into());
    }
    if config.clips.as_os_str().is_empty() {
        return Err("Expected a clip list JSON file as input!".into());
    }
    if config.video.file_stem().is_none() {
        return Err(format!("Cannot derive a sequence name from '{}'", config.video.display()));
    }
    if let Some(output) = &config.output {
        if output.file_name().is_none() {
            return Err(format!("Output '{}' is not a file path", output.display()));
        }
    }
    Ok(())
}

/// What a successful run produced.
#[derive(Debug)]
pub struct GenerateReport {
    pub output: PathBuf,
    pub intermediates: Vec<PathBuf>,
    pub placement: Placement,
    /// Clip records dropped during normalisation.
    pub dropped: usize,
    /// Gap records inserted during normalisation.
    pub gaps: usize,
}

/// Run the whole pipeline for one video.
///
/// On failure no partial output document is left behind.
pub fn generate(config: &GenerateConfig, prober: &dyn MediaProbe) -> Result<GenerateReport> {
    let media = probe::read_media_descriptor(prober, &config.video)?;
    let clips = ClipList::load(&config.clips)?;
    let mut doc = template::load(config.template.as_deref())?;

    let rate = media.rate();
    log::info!(
        "{}: {}x{}, {} ({} fps{}), {} audio channel(s)",
        media.file_name(),
        media.width,
        media.height,
        media.clock_string(),
        rate.timebase,
        if rate.ntsc { " NTSC" } else { "" },
        media.audio_channel_count
    );

    let timeline = timeline::normalize(&clips, &media.duration_seconds, rate, &media.path)?;
    log::info!(
        "Timeline: {} clip(s) from {} input record(s), {} gap(s) inserted, {} dropped",
        timeline.clips.len(),
        clips.clips.len(),
        timeline.gap_count(),
        timeline.issues.len()
    );
    if timeline.is_empty() {
        log::warn!("No clips could be placed; the sequence will be empty");
    }

    log::info!("[1/2] Seeding sequence");
    assemble::seed(&mut doc, &media)?;

    let mut intermediates = Vec::new();
    if config.keep_intermediate {
        create_dir(&config.work_dir())?;

        let sequence_path = config.sequence_path();
        format::write_document(&doc, &sequence_path)?;
        intermediates.push(sequence_path);

        let clips_path = config.normalized_clips_path();
        let json = serde_json::to_string_pretty(&timeline.to_clip_list())
            .map_err(|e| io_error("serialising clip list", std::io::Error::other(e)))?;
        fs::write(&clips_path, json).map_err(|source| SeqError::WriteFailure {
            path: clips_path.clone(),
            source,
        })?;
        intermediates.push(clips_path);

        for path in &intermediates {
            log::info!("Kept intermediate {}", path.display());
        }
    }

    log::info!("[2/2] Placing clips");
    let placement = assemble::populate(&mut doc, &timeline.clips)?;

    let output = config.output_path();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    if output.exists() {
        log::warn!("Output file '{}' already exists, overwriting", output.display());
    }
    if let Err(e) = format::write_document(&doc, &output) {
        let _ = fs::remove_file(&output);
        return Err(e);
    }
    log::info!("Wrote {}", output.display());

    Ok(GenerateReport {
        output,
        intermediates,
        placement,
        dropped: timeline.issues.len(),
        gaps: timeline.gap_count(),
    })
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|source| io_error(&format!("creating directory {}", dir.display()), source))
}

fn io_error(context: &str, source: std::io::Error) -> SeqError {
    SeqError::Io {
        context: context.to_string(),
        source,
    }
}
