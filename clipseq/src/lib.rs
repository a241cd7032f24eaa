//! Builds `xmeml` edit sequences from a source video and a list of clips.
//!
//! The pipeline probes the source with `ffprobe`, normalises the clip list
//! against the media duration, seeds a sequence template with the source's
//! technical parameters and then places every clip on a video track chosen by
//! its importance, with linked audio on two audio tracks.

pub mod assemble;
pub mod clips;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod probe;
pub mod rate;
pub mod template;
pub mod time;
pub mod timeline;
pub mod version;
pub mod xml;
