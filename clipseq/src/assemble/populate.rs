use crate::clips::ClipRecord;
use crate::error::{Result, SeqError};
use crate::rate::RateInfo;
use crate::time;
use crate::xml::{Document, Element};

use super::{
    AssemblyContext, ClipSpan, MAX_AUDIO_CHANNELS, MediaKind, PLACEHOLDER_MASTERCLIP_ID,
    append_clip_metadata, audio_levels_filter, clear_clip_items, clip_item, ensure_track,
    file_ref, link, media_group, place_clip, sequence, sequence_mut, source_track,
};

/// Counts of what [`populate`] placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    pub video_clips: usize,
    pub audio_clips: usize,
    pub skipped: usize,
}

/// Everything Phase B reads back from the seeded tree.
struct SeededSource {
    rate: RateInfo,
    file: Element,
    file_id: String,
    masterclip_id: String,
    duration: String,
    pixel_aspect_ratio: String,
    anamorphic: String,
    alpha_type: String,
    has_audio: bool,
}

impl SeededSource {
    fn read(seq: &Element) -> Result<SeededSource> {
        let rate_el = seq.child("rate").ok_or_else(|| SeqError::missing("sequence/rate"))?;
        let timebase = rate_el
            .child("timebase")
            .and_then(|t| t.text().trim().parse::<u32>().ok())
            .ok_or_else(|| SeqError::missing("sequence/rate/timebase"))?;
        let ntsc = rate_el
            .child("ntsc")
            .map(|n| n.text().trim().eq_ignore_ascii_case("TRUE"))
            .ok_or_else(|| SeqError::missing("sequence/rate/ntsc"))?;

        let file = seq
            .find_by(&|e| e.name == "file" && e.attr("id").is_some())
            .cloned()
            .ok_or_else(|| SeqError::missing("file[@id]"))?;
        let file_id = file.attr("id").unwrap_or_default().to_string();

        let duration = file
            .find("duration")
            .map(|d| d.text())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| SeqError::missing("file/duration"))?;

        let sample_text = |name: &str, default: &str| {
            file.path(&format!("media/video/samplecharacteristics/{}", name))
                .map(|e| e.text())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let pixel_aspect_ratio = sample_text("pixelaspectratio", "square");
        let anamorphic = sample_text("anamorphic", "FALSE");

        let alpha_type = seq
            .find_by(&|e| {
                e.name == "clipitem"
                    && e.find_by(&|f| f.name == "file" && f.attr("id") == Some(file_id.as_str()))
                        .is_some()
            })
            .and_then(|clip| clip.child("alphatype"))
            .map(|a| a.text())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "none".to_string());

        let masterclip_id = seq
            .find("masterclipid")
            .map(|m| m.text())
            .unwrap_or_else(|| PLACEHOLDER_MASTERCLIP_ID.to_string());

        let has_audio = file.path("media/audio").is_some();

        Ok(SeededSource {
            rate: RateInfo::new(timebase, ntsc),
            file,
            file_id,
            masterclip_id,
            duration,
            pixel_aspect_ratio,
            anamorphic,
            alpha_type,
            has_audio,
        })
    }
}

/// Phase B: replace the clips of a seeded document with `clips`.
///
/// Each placeable record becomes one video clip on the track matching its
/// importance and, when the source has audio, one clip on each of the two
/// audio tracks. Records without both bounds, with unparseable bounds or with
/// `end <= start` are skipped.
pub fn populate(doc: &mut Document, clips: &[ClipRecord]) -> Result<Placement> {
    let source = SeededSource::read(sequence(&doc.root)?)?;
    let rate = source.rate;

    let seq = sequence_mut(&mut doc.root)?;
    media_group(seq, MediaKind::Video)?;
    media_group(seq, MediaKind::Audio)?;
    if seq.attr("MZ.ZeroPoint").is_none_or(str::is_empty) {
        seq.set_attr("MZ.ZeroPoint", "0");
    }
    clear_clip_items(seq)?;

    if !source.has_audio {
        log::info!("Source has no audio; placing video clips only");
    }

    let mut ctx = AssemblyContext::new();
    let mut placement = Placement::default();

    for (i, record) in clips.iter().enumerate() {
        let name = record.display_name(i + 1);
        let (Some(start_value), Some(end_value)) = (&record.start_time, &record.end_time) else {
            log::warn!("Skipping clip '{}': missing start or end time", name);
            placement.skipped += 1;
            continue;
        };
        let bounds = time::parse_flexible_time(start_value, rate)
            .and_then(|start| Ok((start, time::parse_flexible_time(end_value, rate)?)));
        let (start, end) = match bounds {
            Ok(bounds) => bounds,
            Err(e) => {
                log::warn!("Skipping clip '{}': {}", name, e);
                placement.skipped += 1;
                continue;
            }
        };
        if end <= start {
            log::warn!("Skipping clip '{}': end {} is not after start {}", name, end, start);
            placement.skipped += 1;
            continue;
        }

        let level = record.track_level() as usize;
        if record.importance.is_some_and(|i| i != level as i64) {
            log::warn!(
                "Clip '{}' has importance {:?}; placing it on track {}",
                name,
                record.importance,
                level
            );
        }

        let (Some(ticks_in), Some(ticks_out)) = (
            time::frames_to_ticks(start, rate.timebase),
            time::frames_to_ticks(end, rate.timebase),
        ) else {
            log::warn!("Skipping clip '{}': frames {}..{} overflow the tick range", name, start, end);
            placement.skipped += 1;
            continue;
        };

        let span = ClipSpan {
            start,
            end,
            in_point: start,
            out_point: end,
            ticks_in,
            ticks_out,
        };

        let video_id = ctx.next_clip_id();
        let audio: Vec<(String, u32)> = if source.has_audio {
            (1..=MAX_AUDIO_CHANNELS)
                .map(|track| (ctx.next_clip_id(), ctx.next_clip_index(MediaKind::Audio, track)))
                .collect()
        } else {
            Vec::new()
        };
        let video_index = ctx.next_clip_index(MediaKind::Video, level);

        let mut video_clip = clip_item(
            &video_id,
            &source.masterclip_id,
            &name,
            &source.duration,
            rate,
            &span,
        );
        if level == 1 && ctx.claim_full_file() {
            video_clip.append(source.file.clone());
        } else {
            video_clip.append(file_ref(&source.file_id));
        }
        video_clip
            .append(Element::with_text("alphatype", source.alpha_type.as_str()))
            .append(Element::with_text("pixelaspectratio", source.pixel_aspect_ratio.as_str()))
            .append(Element::with_text("anamorphic", source.anamorphic.as_str()))
            .append(link(&video_id, MediaKind::Video, level, video_index));
        for (track, (id, index)) in audio.iter().enumerate() {
            video_clip.append(link(id, MediaKind::Audio, track + 1, *index));
        }
        append_clip_metadata(&mut video_clip);
        place_clip(
            ensure_track(media_group(seq, MediaKind::Video)?, MediaKind::Video, level)?,
            video_clip,
        );
        placement.video_clips += 1;

        // Audio out is one frame short of the video out, except on the final entry.
        let is_last = i + 1 == clips.len();
        let audio_span = ClipSpan {
            out_point: if is_last { end } else { end - 1 },
            ..span
        };
        for (channel, (id, _)) in audio.iter().enumerate() {
            let track_index = channel + 1;
            let mut audio_clip = clip_item(
                id,
                &source.masterclip_id,
                &name,
                &source.duration,
                rate,
                &audio_span,
            )
            .attribute("premiereChannelType", "stereo");
            audio_clip
                .append(file_ref(&source.file_id))
                .append(source_track(track_index))
                .append(audio_levels_filter())
                .append(link(&video_id, MediaKind::Video, level, video_index));
            for (track, (sibling, index)) in audio.iter().enumerate() {
                audio_clip.append(link(sibling, MediaKind::Audio, track + 1, *index));
            }
            append_clip_metadata(&mut audio_clip);
            place_clip(
                ensure_track(media_group(seq, MediaKind::Audio)?, MediaKind::Audio, track_index)?,
                audio_clip,
            );
            placement.audio_clips += 1;
        }
    }

    log::debug!(
        "Placed {} video and {} audio clip(s), skipped {}",
        placement.video_clips,
        placement.audio_clips,
        placement.skipped
    );
    Ok(placement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeValue;

    const SEEDED: &str = r#"
<xmeml version="4">
  <sequence id="sequence-1">
    <rate><timebase>25</timebase><ntsc>FALSE</ntsc></rate>
    <media>
      <video>
        <track>
          <clipitem id="clipitem-1">
            <masterclipid>masterclip-1</masterclipid>
            <alphatype>straight</alphatype>
            <file id="file-1">
              <duration>1500</duration>
              <media>
                <video><samplecharacteristics><pixelaspectratio>square</pixelaspectratio></samplecharacteristics></video>
                <audio><samplecharacteristics><depth>16</depth></samplecharacteristics></audio>
              </media>
            </file>
          </clipitem>
          <enabled>TRUE</enabled>
        </track>
      </video>
      <audio><track><enabled>TRUE</enabled></track></audio>
    </media>
  </sequence>
</xmeml>"#;

    fn clip(start: &str, end: &str, name: &str, importance: i64) -> ClipRecord {
        ClipRecord::new(TimeValue::text(start), TimeValue::text(end), name, importance)
    }

    fn video_track(doc: &Document, n: usize) -> &Element {
        doc.root
            .path("sequence/media/video")
            .unwrap()
            .children_named("track")
            .nth(n - 1)
            .unwrap()
    }

    #[test]
    fn test_reads_back_seeded_values() {
        let doc = Document::parse(SEEDED).unwrap();
        let source = SeededSource::read(sequence(&doc.root).unwrap()).unwrap();
        assert_eq!(source.rate, RateInfo::new(25, false));
        assert_eq!(source.file_id, "file-1");
        assert_eq!(source.duration, "1500");
        assert_eq!(source.masterclip_id, "masterclip-1");
        assert_eq!(source.alpha_type, "straight");
        assert_eq!(source.anamorphic, "FALSE");
        assert!(source.has_audio);
    }

    #[test]
    fn test_tracks_follow_importance() {
        let mut doc = Document::parse(SEEDED).unwrap();
        let clips = [
            clip("00:00", "00:10", "A", 1),
            clip("00:10", "00:20", "B", 3),
            clip("00:20", "00:30", "C", 5),
        ];
        let placement = populate(&mut doc, &clips).unwrap();
        assert_eq!(placement.video_clips, 3);
        assert_eq!(placement.audio_clips, 6);

        assert_eq!(video_track(&doc, 1).count_children("clipitem"), 2);
        assert_eq!(video_track(&doc, 2).count_children("clipitem"), 0);
        assert_eq!(video_track(&doc, 3).count_children("clipitem"), 1);

        let audio = doc.root.path("sequence/media/audio").unwrap();
        assert_eq!(audio.count_children("track"), 2);
        for track in audio.children_named("track") {
            assert_eq!(track.count_children("clipitem"), 3);
        }
    }

    #[test]
    fn test_full_file_only_on_first_track_one_clip() {
        let mut doc = Document::parse(SEEDED).unwrap();
        let clips = [
            clip("00:00", "00:10", "A", 2),
            clip("00:10", "00:20", "B", 1),
            clip("00:20", "00:30", "C", 1),
        ];
        populate(&mut doc, &clips).unwrap();

        let full: Vec<_> = doc
            .root
            .path("sequence/media/video")
            .unwrap()
            .children_named("track")
            .flat_map(|t| t.children_named("clipitem"))
            .filter(|c| c.child("file").is_some_and(|f| f.child("duration").is_some()))
            .filter_map(|c| c.child("name").map(|n| n.text()))
            .collect();
        assert_eq!(full, ["B"]);
    }

    #[test]
    fn test_ids_and_links() {
        let mut doc = Document::parse(SEEDED).unwrap();
        populate(&mut doc, &[clip("00:00", "00:10", "A", 1), clip("00:10", "00:20", "B", 1)]).unwrap();

        let second = video_track(&doc, 1).children_named("clipitem").nth(1).unwrap();
        assert_eq!(second.attr("id"), Some("clipitem-4"));
        let links: Vec<_> = second.children_named("link").collect();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].child("linkclipref").unwrap().text(), "clipitem-4");
        assert_eq!(links[0].child("clipindex").unwrap().text(), "2");
        assert_eq!(links[1].child("linkclipref").unwrap().text(), "clipitem-5");
        assert_eq!(links[2].child("linkclipref").unwrap().text(), "clipitem-6");
        assert_eq!(links[2].child("trackindex").unwrap().text(), "2");
    }

    #[test]
    fn test_audio_out_is_one_frame_short_except_last() {
        let mut doc = Document::parse(SEEDED).unwrap();
        populate(&mut doc, &[clip("00:00", "00:10", "A", 1), clip("00:10", "00:20", "B", 1)]).unwrap();
        let audio_track = doc
            .root
            .path("sequence/media/audio")
            .unwrap()
            .child("track")
            .unwrap();
        let outs: Vec<_> = audio_track
            .children_named("clipitem")
            .map(|c| c.child("out").unwrap().text())
            .collect();
        assert_eq!(outs, ["249", "500"]);
    }

    #[test]
    fn test_ticks() {
        let mut doc = Document::parse(SEEDED).unwrap();
        populate(&mut doc, &[clip("00:00:36:00", "00:01:00:00", "A", 1)]).unwrap();
        let clip = video_track(&doc, 1).child("clipitem").unwrap();
        assert_eq!(clip.child("start").unwrap().text(), "900");
        assert_eq!(clip.child("pproTicksIn").unwrap().text(), "9144576000000");
        assert_eq!(clip.child("pproTicksOut").unwrap().text(), "15240960000000");
    }

    #[test]
    fn test_skips_unplaceable_records() {
        let mut doc = Document::parse(SEEDED).unwrap();
        let clips = [
            clip("00:10", "00:05", "Backwards", 1),
            clip("later", "00:05", "Bad", 1),
            ClipRecord {
                start_time: None,
                ..clip("00:00", "00:05", "Missing", 1)
            },
            clip("00:00", "00:05", "Good", 1),
        ];
        let placement = populate(&mut doc, &clips).unwrap();
        assert_eq!(placement.skipped, 3);
        assert_eq!(placement.video_clips, 1);
        let only = video_track(&doc, 1).child("clipitem").unwrap();
        assert_eq!(only.attr("id"), Some("clipitem-1"));
    }

    #[test]
    fn test_skips_records_beyond_the_tick_range() {
        let mut doc = Document::parse(SEEDED).unwrap();
        let clips = [
            clip("0", "1000000000000", "Endless", 1),
            clip("00:00", "00:05", "Good", 1),
        ];
        let placement = populate(&mut doc, &clips).unwrap();
        assert_eq!(placement.skipped, 1);
        assert_eq!(placement.video_clips, 1);
        let only = video_track(&doc, 1).child("clipitem").unwrap();
        assert_eq!(only.child("name").unwrap().text(), "Good");
    }

    #[test]
    fn test_sets_zero_point() {
        let mut doc = Document::parse(SEEDED).unwrap();
        populate(&mut doc, &[]).unwrap();
        let seq = doc.root.child("sequence").unwrap();
        assert_eq!(seq.attr("MZ.ZeroPoint"), Some("0"));
        assert_eq!(video_track(&doc, 1).count_children("clipitem"), 0);
    }

    #[test]
    fn test_missing_rate_is_fatal() {
        let mut doc = Document::parse(
            r#"<xmeml><sequence><media><video/><audio/></media></sequence></xmeml>"#,
        )
        .unwrap();
        match populate(&mut doc, &[]) {
            Err(SeqError::MissingTemplateStructure { element }) => assert_eq!(element, "sequence/rate"),
            other => panic!("expected MissingTemplateStructure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let mut doc = Document::parse(
            r#"<xmeml><sequence><rate><timebase>30</timebase><ntsc>TRUE</ntsc></rate>
               <media><video/><audio/></media></sequence></xmeml>"#,
        )
        .unwrap();
        assert!(matches!(
            populate(&mut doc, &[]),
            Err(SeqError::MissingTemplateStructure { .. })
        ));
    }
}
