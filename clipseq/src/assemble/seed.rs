use crate::error::Result;
use crate::probe::MediaDescriptor;
use crate::rate::RateInfo;
use crate::xml::{Document, Element};

use super::{
    AUDIO_DEPTH, AssemblyContext, ClipSpan, FILE_ID, MASTERCLIP_ID, MAX_AUDIO_CHANNELS, MediaKind,
    append_clip_metadata, audio_levels_filter, clear_clip_items, clip_item, ensure_track,
    file_ref, link, media_group, place_clip, rate_element, sequence_mut, source_track,
};

/// Phase A: write `media`'s technical parameters into the template and place a
/// single clip spanning the whole file, with up to two linked audio channels.
///
/// Seeding is idempotent: any clips already in the template are replaced.
pub fn seed(doc: &mut Document, media: &MediaDescriptor) -> Result<()> {
    let rate = media.rate();
    let duration_frames = media.duration_frames()?;
    let duration_ticks = media.duration_ticks()?;
    let path_url = media.path_url()?;
    let channels = (media.audio_channel_count as usize).min(MAX_AUDIO_CHANNELS);

    let seq = sequence_mut(&mut doc.root)?;
    // Check structure before changing anything.
    media_group(seq, MediaKind::Video)?;
    media_group(seq, MediaKind::Audio)?;

    seq.set_child_text("name", media.file_stem());
    seq.set_child_text("duration", duration_frames.to_string());
    set_rate(seq.upsert_child("rate"), rate);
    if let Some(timecode) = seq.child_mut("timecode") {
        set_rate(timecode.upsert_child("rate"), rate);
        timecode.set_child_text("displayformat", rate.display_format());
    }
    seq.set_attr("MZ.Sequence.PreviewFrameSizeWidth", media.width.to_string());
    seq.set_attr("MZ.Sequence.PreviewFrameSizeHeight", media.height.to_string());

    let video_sc = media_group(seq, MediaKind::Video)?.upsert_path("format/samplecharacteristics");
    set_rate(video_sc.upsert_child("rate"), rate);
    video_sc.set_child_text("width", media.width.to_string());
    video_sc.set_child_text("height", media.height.to_string());
    video_sc.set_child_text("pixelaspectratio", media.pixel_aspect_ratio.as_str());
    video_sc.set_child_text("fielddominance", media.field_order.field_dominance());

    let audio_sc = media_group(seq, MediaKind::Audio)?.upsert_path("format/samplecharacteristics");
    audio_sc.set_child_text("depth", AUDIO_DEPTH.to_string());
    audio_sc.set_child_text("samplerate", media.audio_sample_rate.to_string());

    let removed = clear_clip_items(seq)?;
    if removed > 0 {
        log::debug!("Removed {} clip(s) from the template", removed);
    }

    let mut ctx = AssemblyContext::new();
    let video_id = ctx.next_clip_id();
    let video_index = ctx.next_clip_index(MediaKind::Video, 1);
    let audio: Vec<(String, u32)> = (1..=channels)
        .map(|track| (ctx.next_clip_id(), ctx.next_clip_index(MediaKind::Audio, track)))
        .collect();

    let span = ClipSpan {
        start: 0,
        end: duration_frames,
        in_point: 0,
        out_point: duration_frames,
        ticks_in: 0,
        ticks_out: duration_ticks,
    };
    let name = media.file_name();
    let duration = duration_frames.to_string();

    let mut video_clip = clip_item(&video_id, MASTERCLIP_ID, &name, &duration, rate, &span);
    video_clip
        .append(Element::with_text("alphatype", "none"))
        .append(Element::with_text("pixelaspectratio", media.pixel_aspect_ratio.as_str()))
        .append(Element::with_text("anamorphic", "FALSE"))
        .append(file_node(media, rate, duration_frames, path_url))
        .append(link(&video_id, MediaKind::Video, 1, video_index));
    for (track, (id, index)) in audio.iter().enumerate() {
        video_clip.append(link(id, MediaKind::Audio, track + 1, *index));
    }
    append_clip_metadata(&mut video_clip);
    place_clip(ensure_track(media_group(seq, MediaKind::Video)?, MediaKind::Video, 1)?, video_clip);

    let (track_type, channel_type) = if media.audio_channel_count >= 2 {
        ("Stereo", "stereo")
    } else {
        ("Mono", "mono")
    };
    for (i, (id, _)) in audio.iter().enumerate() {
        let track_index = i + 1;
        let mut audio_clip = clip_item(id, MASTERCLIP_ID, &name, &duration, rate, &span)
            .attribute("premiereChannelType", channel_type);
        audio_clip
            .append(file_ref(FILE_ID))
            .append(source_track(track_index))
            .append(audio_levels_filter())
            .append(link(&video_id, MediaKind::Video, 1, video_index));
        for (track, (sibling, index)) in audio.iter().enumerate() {
            audio_clip.append(link(sibling, MediaKind::Audio, track + 1, *index));
        }
        append_clip_metadata(&mut audio_clip);

        let group = media_group(seq, MediaKind::Audio)?;
        let track = ensure_track(group, MediaKind::Audio, track_index)?;
        track.set_attr("currentExplodedTrackIndex", i.to_string());
        track.set_attr("totalExplodedTrackCount", audio.len().to_string());
        track.set_attr("premiereTrackType", track_type);
        place_clip(track, audio_clip);
    }

    log::debug!(
        "Seeded sequence '{}': {} frames at {} fps ({}), {} audio channel(s)",
        media.file_stem(),
        duration_frames,
        rate.timebase,
        rate.display_format(),
        audio.len()
    );
    Ok(())
}

fn set_rate(el: &mut Element, rate: RateInfo) {
    el.set_child_text("timebase", rate.timebase.to_string());
    el.set_child_text("ntsc", rate.ntsc_flag());
}

/// The authoritative file node. Its audio section is present only when the
/// source has audio.
fn file_node(media: &MediaDescriptor, rate: RateInfo, duration_frames: i64, path_url: String) -> Element {
    let start_timecode = if rate.ntsc {
        media.start_timecode.replace(':', ";")
    } else {
        media.start_timecode.clone()
    };

    let mut timecode = Element::new("timecode");
    timecode
        .append(rate_element(rate))
        .append(Element::with_text("string", start_timecode))
        .append(Element::with_text("frame", "0"))
        .append(Element::with_text("displayformat", rate.display_format()));

    let mut video_sc = Element::new("samplecharacteristics");
    video_sc
        .append(rate_element(rate))
        .append(Element::with_text("width", media.width.to_string()))
        .append(Element::with_text("height", media.height.to_string()))
        .append(Element::with_text("anamorphic", "FALSE"))
        .append(Element::with_text("pixelaspectratio", media.pixel_aspect_ratio.as_str()))
        .append(Element::with_text("fielddominance", media.field_order.field_dominance()));
    let mut video = Element::new("video");
    video.append(video_sc);

    let mut file_media = Element::new("media");
    file_media.append(video);
    if media.has_audio() {
        let mut audio_sc = Element::new("samplecharacteristics");
        audio_sc
            .append(Element::with_text("depth", AUDIO_DEPTH.to_string()))
            .append(Element::with_text("samplerate", media.audio_sample_rate.to_string()));
        let mut audio = Element::new("audio");
        audio
            .append(audio_sc)
            .append(Element::with_text("channelcount", media.audio_channel_count.to_string()));
        file_media.append(audio);
    }

    let mut file = Element::new("file").attribute("id", FILE_ID);
    file.append(Element::with_text("name", media.file_name()))
        .append(Element::with_text("pathurl", path_url))
        .append(rate_element(rate))
        .append(Element::with_text("duration", duration_frames.to_string()))
        .append(timecode)
        .append(file_media);
    file
}
