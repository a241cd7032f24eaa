//! Conversions between seconds, clock strings, timecodes, frame counts and ticks.
//!
//! All arithmetic is exact (`Ratio<i128>`) and rounds half away from zero at the
//! final step only. Frame and tick values are never negative in a well-formed
//! sequence, so for every value that reaches the output this is round-half-up.

use std::fmt;

use num_rational::Ratio;

use crate::error::{Result, SeqError};
use crate::rate::RateInfo;

/// High-resolution tick unit used by `pproTicksIn` / `pproTicksOut`.
pub const TICKS_PER_SECOND: i128 = 254_016_000_000;

/// Exact seconds value.
pub type Seconds = Ratio<i128>;

/// Largest number of significant digits accepted by [`parse_decimal`].
const MAX_DECIMAL_DIGITS: usize = 30;

/// A start/end time as it appears in a clip list: either a number of seconds
/// or a time string (`MM:SS`, `HH:MM:SS[.fff]`, `HH:MM:SS:FF`, `HH:MM:SS;FF`).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(untagged)]
pub enum TimeValue {
    Seconds(f64),
    Text(String),
}

impl TimeValue {
    pub fn text(s: impl Into<String>) -> Self {
        TimeValue::Text(s.into())
    }

    /// True if this is exactly the given time string.
    pub fn is_text(&self, s: &str) -> bool {
        matches!(self, TimeValue::Text(t) if t == s)
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeValue::Seconds(s) => write!(f, "{}", s),
            TimeValue::Text(t) => f.write_str(t),
        }
    }
}

/// Parse a plain decimal number (optionally signed, optionally with exponent)
/// into an exact ratio. Returns `None` for anything else.
pub fn parse_decimal(text: &str) -> Option<Seconds> {
    let text = text.trim();
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(idx) => (&text[..idx], text[idx + 1..].parse::<i32>().ok()?),
        None => (text, 0),
    };

    let (negative, digits) = match mantissa.as_bytes().first()? {
        b'-' => (true, &mantissa[1..]),
        b'+' => (false, &mantissa[1..]),
        _ => (false, mantissa),
    };

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let int_part = int_part.trim_start_matches('0');
    let frac_part = frac_part.trim_end_matches('0');
    if int_part.len() + frac_part.len() > MAX_DECIMAL_DIGITS {
        return None;
    }

    let mut numer: i128 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        numer = numer * 10 + (b - b'0') as i128;
    }
    let scale = exponent - frac_part.len() as i32;
    if scale.unsigned_abs() as usize > MAX_DECIMAL_DIGITS {
        return None;
    }
    let power = 10i128.pow(scale.unsigned_abs());
    let value = if scale >= 0 {
        Ratio::from_integer(numer.checked_mul(power)?)
    } else {
        Ratio::new(numer, power)
    };

    Some(if negative { -value } else { value })
}

/// Convert an `f64` seconds value to an exact ratio via its shortest decimal form.
pub fn seconds_from_f64(value: f64) -> Option<Seconds> {
    if !value.is_finite() {
        return None;
    }
    parse_decimal(&value.to_string())
}

/// `value × factor`, rounded half away from zero. `None` when the product
/// overflows or the result does not fit an `i64`.
pub fn scale_round(value: &Seconds, factor: &Ratio<i128>) -> Option<i64> {
    let numer = value.numer().checked_mul(*factor.numer())?;
    let denom = value.denom().checked_mul(*factor.denom())?;
    i64::try_from(Ratio::new(numer, denom).round().to_integer()).ok()
}

/// Frames at the given timebase, rounded half-up.
pub fn seconds_to_frames(seconds: &Seconds, timebase: u32) -> Option<i64> {
    scale_round(seconds, &Ratio::from_integer(timebase as i128))
}

/// Exact seconds covered by a frame count. Zero when the timebase is zero.
pub fn frames_to_seconds(frames: i64, timebase: u32) -> Seconds {
    if timebase == 0 {
        return Ratio::from_integer(0);
    }
    Ratio::new(frames as i128, timebase as i128)
}

/// Ticks for a frame count. Returns 0 when the timebase is 0.
pub fn frames_to_ticks(frames: i64, timebase: u32) -> Option<i64> {
    if timebase == 0 {
        return Some(0);
    }
    scale_round(
        &frames_to_seconds(frames, timebase),
        &Ratio::from_integer(TICKS_PER_SECOND),
    )
}

/// Ticks for a seconds value, without quantising to frames first.
pub fn seconds_to_ticks(seconds: &Seconds) -> Option<i64> {
    scale_round(seconds, &Ratio::from_integer(TICKS_PER_SECOND))
}

/// Format a frame count as `HH:MM:SS:FF` at the nominal timebase. Hours are
/// not capped, so every count formats to a timecode that parses back to it.
pub fn frames_to_timecode(frames: i64, timebase: u32) -> String {
    if timebase == 0 {
        return "00:00:00:00".to_string();
    }
    let timebase = timebase as i64;
    let frames = frames.max(0);
    let seconds = frames / timebase;
    format!(
        "{:02}:{:02}:{:02}:{:02}",
        seconds / 3600,
        seconds / 60 % 60,
        seconds % 60,
        frames % timebase
    )
}

/// Parse `HH:MM:SS:FF` (or `HH:MM:SS;FF`) into frames.
///
/// Frame numbers are counted at the nominal timebase; drop-frame timecode
/// labels are not re-mapped onto the real frame count.
pub fn timecode_to_frames(tc: &str, rate: RateInfo) -> Result<i64> {
    let invalid = || SeqError::InvalidTimecode {
        value: tc.to_string(),
    };

    let fields: Vec<&str> = tc.trim().split([':', ';']).collect();
    if fields.len() != 4 {
        return Err(invalid());
    }
    let mut parts = [0i128; 4];
    for (slot, field) in parts.iter_mut().zip(&fields) {
        *slot = parse_unsigned(field).ok_or_else(invalid)?;
    }
    let [h, m, s, f] = parts;

    if rate.timebase == 0 {
        return Ok(0);
    }
    // (H·3600 + M·60 + S + F/timebase) × timebase, kept in whole frames.
    h.checked_mul(3600)
        .and_then(|total| total.checked_add(m.checked_mul(60)?))
        .and_then(|total| total.checked_add(s))
        .and_then(|total| total.checked_mul(rate.timebase as i128))
        .and_then(|total| total.checked_add(f))
        .and_then(|total| i64::try_from(total).ok())
        .ok_or_else(invalid)
}

fn parse_unsigned(field: &str) -> Option<i128> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn all_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// `MM:SS` with one or more minute digits and exactly two second digits.
fn clock_seconds(s: &str) -> Option<i128> {
    let (m, sec) = s.split_once(':')?;
    if !all_digits(m, 1, usize::MAX) || !all_digits(sec, 2, 2) {
        return None;
    }
    m.parse::<i128>()
        .ok()?
        .checked_mul(60)?
        .checked_add(sec.parse::<i128>().ok()?)
}

/// `HH:MM:SS` with an optional fractional part on the seconds, which is discarded.
fn hms_seconds(s: &str) -> Option<i128> {
    let mut fields = s.split(':');
    let (h, m, sec) = (fields.next()?, fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }
    let whole_sec = match sec.split_once('.') {
        Some((whole, frac)) if all_digits(frac, 0, usize::MAX) => whole,
        Some(_) => return None,
        None => sec,
    };
    if !all_digits(h, 1, 2) || !all_digits(m, 2, 2) || !all_digits(whole_sec, 2, 2) {
        return None;
    }
    Some(h.parse::<i128>().ok()? * 3600 + m.parse::<i128>().ok()? * 60 + whole_sec.parse::<i128>().ok()?)
}

/// Parse any supported clip time into frames.
///
/// Numeric seconds and sub-second fractions are floored to whole seconds before
/// conversion; only the timecode form can address individual frames.
pub fn parse_flexible_time(value: &TimeValue, rate: RateInfo) -> Result<i64> {
    let unparseable = || SeqError::UnparseableTime {
        value: value.to_string(),
    };

    let whole_seconds = match value {
        TimeValue::Seconds(s) => seconds_from_f64(*s).ok_or_else(unparseable)?.floor(),
        TimeValue::Text(text) => {
            let text = text.trim();
            let is_timecode = text.split([':', ';']).count() == 4;
            if is_timecode {
                return timecode_to_frames(text, rate);
            } else if let Some(s) = clock_seconds(text).or_else(|| hms_seconds(text)) {
                Ratio::from_integer(s)
            } else if text.contains([':', ';']) {
                return timecode_to_frames(text, rate);
            } else {
                parse_decimal(text).ok_or_else(unparseable)?.floor()
            }
        }
    };

    seconds_to_frames(&whole_seconds, rate.timebase).ok_or_else(unparseable)
}

/// Format seconds as `MM:SS`, rounding to the nearest whole second first so
/// that e.g. 59.6s renders as `01:00`. Minutes are not capped at 99.
pub fn seconds_to_clock_string(seconds: &Seconds) -> String {
    let total = seconds.round().to_integer().max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NTSC30: RateInfo = RateInfo::new(30, true);
    const PAL: RateInfo = RateInfo::new(25, false);

    fn dec(s: &str) -> Seconds {
        parse_decimal(s).unwrap()
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(dec("90"), Ratio::from_integer(90));
        assert_eq!(dec("90.500000"), Ratio::new(181, 2));
        assert_eq!(dec("0.1"), Ratio::new(1, 10));
        assert_eq!(dec("-2.25"), Ratio::new(-9, 4));
        assert_eq!(dec(".5"), Ratio::new(1, 2));
        assert_eq!(dec("1e3"), Ratio::from_integer(1000));
        assert_eq!(dec("15E-1"), Ratio::new(3, 2));
        assert!(parse_decimal("").is_none());
        assert!(parse_decimal(".").is_none());
        assert!(parse_decimal("1.2.3").is_none());
        assert!(parse_decimal("abc").is_none());
        assert!(parse_decimal("01:30").is_none());
    }

    #[test]
    fn test_seconds_from_f64_is_exact_decimal() {
        // 0.1 has no exact binary representation; the decimal form is used.
        assert_eq!(seconds_from_f64(0.1).unwrap(), Ratio::new(1, 10));
        assert!(seconds_from_f64(f64::NAN).is_none());
    }

    #[test]
    fn test_seconds_to_frames_rounds_half_up() {
        assert_eq!(seconds_to_frames(&dec("1"), 30), Some(30));
        assert_eq!(seconds_to_frames(&dec("0.05"), 30), Some(2)); // 1.5 -> 2
        assert_eq!(seconds_to_frames(&dec("0.0166"), 30), Some(0)); // 0.498
        assert_eq!(seconds_to_frames(&dec("0.1"), 25), Some(3)); // 2.5 -> 3
    }

    #[test]
    fn test_seconds_to_frames_beyond_i64_is_none() {
        // 2^64 + 384 seconds must not wrap around to 384 seconds.
        let huge = seconds_from_f64(1.8446744073709552e19).unwrap();
        assert_eq!(seconds_to_frames(&huge, 30), None);
        assert_eq!(seconds_to_ticks(&huge), None);
        assert_eq!(seconds_to_frames(&dec("1e29"), 60), None);
    }

    #[test]
    fn test_frames_to_ticks() {
        assert_eq!(frames_to_ticks(900, 30), Some(7_620_480_000_000));
        assert_eq!(frames_to_ticks(1, 24), Some(10_584_000_000));
        assert_eq!(frames_to_ticks(0, 30), Some(0));
        assert_eq!(frames_to_ticks(123, 0), Some(0));
        assert_eq!(frames_to_ticks(i64::MAX, 30), None);
    }

    #[test]
    fn test_frames_to_ticks_rounds_half_up() {
        assert_eq!(frames_to_ticks(1, 60), Some(4_233_600_000));
        assert_eq!(frames_to_ticks(1, 1_000_000_000), Some(254)); // 254.016
        assert_eq!(frames_to_ticks(1, 508_032_000), Some(500)); // exactly 500
        assert_eq!(frames_to_ticks(1, 8192), Some(31_007_813)); // 31007812.5
    }

    #[test]
    fn test_frames_to_timecode() {
        assert_eq!(frames_to_timecode(0, 30), "00:00:00:00");
        assert_eq!(frames_to_timecode(1785, 30), "00:00:59:15");
        assert_eq!(frames_to_timecode(90_000, 25), "01:00:00:00");
        assert_eq!(frames_to_timecode(360_000 * 30 + 7, 30), "100:00:00:07");
        for frames in [0i64, 1, 29, 1785, 107_892, 10_800_007] {
            let tc = TimeValue::Text(frames_to_timecode(frames, 30));
            assert_eq!(parse_flexible_time(&tc, NTSC30).unwrap(), frames);
        }
    }

    #[test]
    fn test_timecode_to_frames() {
        assert_eq!(timecode_to_frames("00:00:30:00", NTSC30).unwrap(), 900);
        assert_eq!(timecode_to_frames("00:01:00;15", NTSC30).unwrap(), 1815);
        assert_eq!(timecode_to_frames("01:00:00:00", PAL).unwrap(), 90_000);
        assert_eq!(timecode_to_frames("00:00:01:12", PAL).unwrap(), 37);
    }

    #[test]
    fn test_timecode_to_frames_rejects_bad_shapes() {
        for tc in ["00:00:30", "00:00:30:00:00", "aa:00:30:00", "00:00:30:", "1:2:3:x"] {
            match timecode_to_frames(tc, NTSC30) {
                Err(SeqError::InvalidTimecode { value }) => assert_eq!(value, tc),
                other => panic!("expected InvalidTimecode for {tc}, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_flexible_time_forms() {
        let t = |v: TimeValue| parse_flexible_time(&v, NTSC30).unwrap();
        assert_eq!(t(TimeValue::Seconds(61.0)), 1830);
        assert_eq!(t(TimeValue::Seconds(61.9)), 1830);
        assert_eq!(t(TimeValue::text("01:01")), 1830);
        assert_eq!(t(TimeValue::text("1:01")), 1830);
        assert_eq!(t(TimeValue::text("125:00")), 225_000);
        assert_eq!(t(TimeValue::text("00:01:01")), 1830);
        assert_eq!(t(TimeValue::text("00:01:01.750")), 1830);
        assert_eq!(t(TimeValue::text("00:01:01:15")), 1845);
        assert_eq!(t(TimeValue::text("00:01:01;15")), 1845);
        assert_eq!(t(TimeValue::text("61.9")), 1830);
        assert_eq!(t(TimeValue::text(" 00:10 ")), 300);
    }

    #[test]
    fn test_parse_flexible_time_errors() {
        assert!(matches!(
            parse_flexible_time(&TimeValue::text("soon"), NTSC30),
            Err(SeqError::UnparseableTime { .. })
        ));
        assert!(matches!(
            parse_flexible_time(&TimeValue::text("1:2"), NTSC30),
            Err(SeqError::InvalidTimecode { .. })
        ));
        assert!(matches!(
            parse_flexible_time(&TimeValue::Seconds(f64::INFINITY), NTSC30),
            Err(SeqError::UnparseableTime { .. })
        ));
    }

    #[test]
    fn test_oversized_fields_are_errors_not_overflows() {
        let err = |v: TimeValue| parse_flexible_time(&v, NTSC30).unwrap_err();
        assert!(matches!(
            err(TimeValue::text("100000000000000000000000000000000000:00:00:00")),
            SeqError::InvalidTimecode { .. }
        ));
        assert!(matches!(
            err(TimeValue::text("00:00:00:999999999999999999999999999999999999")),
            SeqError::InvalidTimecode { .. }
        ));
        assert!(matches!(
            err(TimeValue::text("99999999999999999999999999999999999999:00")),
            SeqError::InvalidTimecode { .. }
        ));
        assert!(matches!(
            err(TimeValue::Seconds(1.8446744073709552e19)),
            SeqError::UnparseableTime { .. }
        ));
    }

    #[test]
    fn test_negative_seconds_floor_downwards() {
        assert_eq!(parse_flexible_time(&TimeValue::Seconds(-0.5), PAL).unwrap(), -25);
    }

    #[test]
    fn test_seconds_to_clock_string() {
        assert_eq!(seconds_to_clock_string(&dec("0")), "00:00");
        assert_eq!(seconds_to_clock_string(&dec("90")), "01:30");
        assert_eq!(seconds_to_clock_string(&dec("90.4")), "01:30");
        assert_eq!(seconds_to_clock_string(&dec("89.5")), "01:30");
        assert_eq!(seconds_to_clock_string(&dec("59.6")), "01:00");
        assert_eq!(seconds_to_clock_string(&dec("6000")), "100:00");
    }

    #[test]
    fn test_ticks_roundtrip_through_frames() {
        for timebase in [24u32, 25, 30, 50, 60] {
            for frames in [0i64, 1, 7, 29, 900, 1799, 107_892, 5_000_000] {
                let seconds = frames_to_seconds(frames, timebase);
                let frames = seconds_to_frames(&seconds, timebase).unwrap();
                let via_frames = frames_to_ticks(frames, timebase).unwrap();
                let direct = seconds_to_ticks(&seconds).unwrap();
                assert!(
                    (via_frames - direct).abs() <= 1,
                    "tb={timebase} frames={frames}: {via_frames} vs {direct}"
                );
            }
        }
    }

    #[test]
    fn test_clock_string_reparse_is_stable() {
        for timebase in [24u32, 30, 60] {
            let rate = RateInfo::new(timebase, false);
            for whole in [0i128, 1, 59, 60, 61, 3599, 3600, 7322] {
                let seconds = Ratio::from_integer(whole);
                let clock = TimeValue::Text(seconds_to_clock_string(&seconds));
                assert_eq!(
                    parse_flexible_time(&clock, rate).unwrap(),
                    seconds_to_frames(&seconds, timebase).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_clock_string_reparse_pins_round_vs_floor() {
        // The clock string rounds to 90s while numeric input floors to 89s:
        // the two differ by exactly one second of frames.
        let seconds = dec("89.5");
        let clock = TimeValue::Text(seconds_to_clock_string(&seconds));
        let from_clock = parse_flexible_time(&clock, NTSC30).unwrap();
        let from_number = parse_flexible_time(&TimeValue::Seconds(89.5), NTSC30).unwrap();
        assert_eq!(from_clock, 2700);
        assert_eq!(from_number, 2670);
        assert_eq!(from_clock - from_number, 30);
    }
}
