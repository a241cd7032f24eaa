//! Sequence assembly.
//!
//! Assembly runs in two phases over the same [`Document`]:
//!
//! 1. [`seed`] writes the source file's technical parameters into a template
//!    and places one full-length clip (plus its audio channels).
//! 2. [`populate`] replaces every clip with the entries of a normalised
//!    timeline, reading all technical parameters back from the seeded tree.
//!
//! Both phases build clips from the shared helpers in this module and keep
//! their id and index counters in an [`AssemblyContext`].

mod populate;
mod seed;

use std::collections::HashMap;

pub use populate::{Placement, populate};
pub use seed::seed;

use crate::error::{Result, SeqError};
use crate::rate::RateInfo;
use crate::xml::Element;

/// Id of the file node created while seeding.
pub const FILE_ID: &str = "file-1";

/// Master clip id written while seeding.
pub const MASTERCLIP_ID: &str = "masterclip-1";

/// Master clip id used when the seeded tree carries none.
pub const PLACEHOLDER_MASTERCLIP_ID: &str = "masterclip-placeholder";

/// Audio channels placed per clip.
pub const MAX_AUDIO_CHANNELS: usize = 2;

/// Sample depth written for audio.
pub const AUDIO_DEPTH: u32 = 16;

const PANNER_START_KEYFRAME: &str = "-91445760000000000,0.5,0,0,0,0,0,0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// Per-document counters: the global clip id sequence and the per-track clip
/// indices referenced from link nodes.
#[derive(Debug, Default)]
pub struct AssemblyContext {
    next_clip_id: u32,
    clip_indices: HashMap<(MediaKind, usize), u32>,
    full_file_placed: bool,
}

impl AssemblyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next `clipitem-N` id (starting at 1).
    pub fn next_clip_id(&mut self) -> String {
        self.next_clip_id += 1;
        format!("clipitem-{}", self.next_clip_id)
    }

    /// Allocate the next 1-based clip index on the given track.
    pub fn next_clip_index(&mut self, kind: MediaKind, track: usize) -> u32 {
        let index = self.clip_indices.entry((kind, track)).or_default();
        *index += 1;
        *index
    }

    /// True exactly once: for the first caller that should carry the full file node.
    pub fn claim_full_file(&mut self) -> bool {
        !std::mem::replace(&mut self.full_file_placed, true)
    }
}

/// Find the sequence element: the root itself or its first `sequence` descendant.
pub(crate) fn sequence_mut(root: &mut Element) -> Result<&mut Element> {
    if root.name == "sequence" {
        return Ok(root);
    }
    root.find_mut("sequence")
        .ok_or_else(|| SeqError::missing("sequence"))
}

pub(crate) fn sequence(root: &Element) -> Result<&Element> {
    if root.name == "sequence" {
        return Ok(root);
    }
    root.find("sequence").ok_or_else(|| SeqError::missing("sequence"))
}

/// The `media/video` or `media/audio` group of a sequence.
pub(crate) fn media_group(sequence: &mut Element, kind: MediaKind) -> Result<&mut Element> {
    let path = format!("media/{}", kind.as_str());
    sequence
        .path_mut(&path)
        .ok_or_else(|| SeqError::missing(format!("sequence/{}", path)))
}

/// Remove every clip from every track of both media groups.
pub(crate) fn clear_clip_items(sequence: &mut Element) -> Result<usize> {
    let mut removed = 0;
    for kind in [MediaKind::Video, MediaKind::Audio] {
        for track in media_group(sequence, kind)?
            .elements_mut()
            .filter(|e| e.name == "track")
        {
            removed += track.remove_children("clipitem");
        }
    }
    Ok(removed)
}

/// Return track `index` (1-based) of a media group, appending new tracks up to it.
pub(crate) fn ensure_track(group: &mut Element, kind: MediaKind, index: usize) -> Result<&mut Element> {
    for i in group.count_children("track")..index {
        let mut track = Element::new("track");
        track
            .append(Element::with_text("enabled", "TRUE"))
            .append(Element::with_text("locked", "FALSE"));
        if kind == MediaKind::Audio {
            track.append(Element::with_text("outputchannelindex", ((i % 2) + 1).to_string()));
            track.set_attr("premiereTrackType", "Stereo");
            track.set_attr("PannerCurrentValue", "0.5");
            track.set_attr("PannerName", "Balance");
            track.set_attr("PannerStartKeyframe", PANNER_START_KEYFRAME);
            track.set_attr("TL.SQTrackAudioKeyframeStyle", "0");
        }
        log::debug!("Creating {} track {}", kind.as_str(), i + 1);
        group.append(track);
    }
    group
        .nth_child_mut("track", index.saturating_sub(1))
        .ok_or_else(|| SeqError::missing(format!("{} track {}", kind.as_str(), index)))
}

/// Put a clip on a track, ahead of the track's own settings.
pub(crate) fn place_clip(track: &mut Element, clip: Element) {
    track.insert_before("enabled", clip);
}

pub(crate) fn rate_element(rate: RateInfo) -> Element {
    let mut el = Element::new("rate");
    el.append(Element::with_text("timebase", rate.timebase.to_string()))
        .append(Element::with_text("ntsc", rate.ntsc_flag()));
    el
}

/// Timing of one clip, in frames and ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClipSpan {
    pub start: i64,
    pub end: i64,
    pub in_point: i64,
    pub out_point: i64,
    pub ticks_in: i64,
    pub ticks_out: i64,
}

/// The common head of every clip item, up to and including `pproTicksOut`.
pub(crate) fn clip_item(
    id: &str,
    masterclip_id: &str,
    name: &str,
    duration: &str,
    rate: RateInfo,
    span: &ClipSpan,
) -> Element {
    let mut clip = Element::new("clipitem").attribute("id", id);
    clip.append(Element::with_text("masterclipid", masterclip_id))
        .append(Element::with_text("name", name))
        .append(Element::with_text("enabled", "TRUE"))
        .append(Element::with_text("duration", duration))
        .append(rate_element(rate))
        .append(Element::with_text("start", span.start.to_string()))
        .append(Element::with_text("end", span.end.to_string()))
        .append(Element::with_text("in", span.in_point.to_string()))
        .append(Element::with_text("out", span.out_point.to_string()))
        .append(Element::with_text("pproTicksIn", span.ticks_in.to_string()))
        .append(Element::with_text("pproTicksOut", span.ticks_out.to_string()));
    clip
}

/// An id-only reference to a file node.
pub(crate) fn file_ref(file_id: &str) -> Element {
    Element::new("file").attribute("id", file_id)
}

pub(crate) fn source_track(track_index: usize) -> Element {
    let mut el = Element::new("sourcetrack");
    el.append(Element::with_text("mediatype", "audio"))
        .append(Element::with_text("trackindex", track_index.to_string()));
    el
}

/// A link to another clip. Audio links are grouped.
pub(crate) fn link(clip_id: &str, kind: MediaKind, track_index: usize, clip_index: u32) -> Element {
    let mut el = Element::new("link");
    el.append(Element::with_text("linkclipref", clip_id))
        .append(Element::with_text("mediatype", kind.as_str()))
        .append(Element::with_text("trackindex", track_index.to_string()))
        .append(Element::with_text("clipindex", clip_index.to_string()));
    if kind == MediaKind::Audio {
        el.append(Element::with_text("groupindex", "1"));
    }
    el
}

fn empty_children(name: &str, children: &[&str]) -> Element {
    let mut el = Element::new(name);
    for child in children {
        el.append(Element::new(*child));
    }
    el
}

/// `logginginfo`, `colorinfo` and `labels`, appended to every clip.
pub(crate) fn append_clip_metadata(clip: &mut Element) {
    clip.append(empty_children(
        "logginginfo",
        &[
            "description",
            "scene",
            "shottake",
            "lognote",
            "good",
            "originalvideofilename",
            "originalaudiofilename",
        ],
    ))
    .append(empty_children("colorinfo", &["lut", "lut1", "asc_sop", "asc_sat", "lut2"]));
    let mut labels = Element::new("labels");
    labels.append(Element::with_text("label2", "Iris"));
    clip.append(labels);
}

/// Unity-gain "Audio Levels" filter.
pub(crate) fn audio_levels_filter() -> Element {
    let mut parameter = Element::new("parameter").attribute("authoringApp", "PremierePro");
    parameter
        .append(Element::with_text("parameterid", "level"))
        .append(Element::with_text("name", "Level"))
        .append(Element::with_text("value", "1"));

    let mut effect = Element::new("effect");
    effect
        .append(Element::with_text("name", "Audio Levels"))
        .append(Element::with_text("effectid", "audiolevels"))
        .append(Element::with_text("effectcategory", "audiolevels"))
        .append(Element::with_text("effecttype", "audiolevels"))
        .append(Element::with_text("mediatype", "audio"))
        .append(Element::with_text("pproBypass", "false"))
        .append(parameter);

    let mut filter = Element::new("filter");
    filter.append(effect);
    filter
}
