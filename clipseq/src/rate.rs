/// Nominal timebase and NTSC flag for a sequence, as written into `<rate>` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateInfo {
    pub timebase: u32,
    pub ntsc: bool,
}

/// Known frame rates: (fps, timebase, ntsc). Matching is first-hit in this order.
const RATE_TABLE: &[(f64, u32, bool)] = &[
    (23.976, 24, true),
    (29.97, 30, true),
    (59.94, 60, true),
    (24.0, 24, false),
    (25.0, 25, false),
    (30.0, 30, false),
    (50.0, 50, false),
    (60.0, 60, false),
];

const MATCH_TOLERANCE: f64 = 0.01;

/// Used for any frame rate not found in the table.
pub const FALLBACK_RATE: RateInfo = RateInfo {
    timebase: 60,
    ntsc: true,
};

impl RateInfo {
    pub const fn new(timebase: u32, ntsc: bool) -> Self {
        RateInfo { timebase, ntsc }
    }

    /// Look up a frame rate ratio in the rate table.
    pub fn match_frame_rate(numerator: u32, denominator: u32) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let fps = numerator as f64 / denominator as f64;
        RATE_TABLE
            .iter()
            .find(|(target, _, _)| (fps - target).abs() < MATCH_TOLERANCE)
            .map(|&(_, timebase, ntsc)| RateInfo { timebase, ntsc })
    }

    /// Derive the rate for a frame rate ratio, falling back to 60 fps NTSC.
    pub fn from_frame_rate(numerator: u32, denominator: u32) -> Self {
        Self::match_frame_rate(numerator, denominator).unwrap_or_else(|| {
            log::warn!(
                "Unrecognised frame rate {}/{}, assuming {} fps NTSC",
                numerator,
                denominator,
                FALLBACK_RATE.timebase
            );
            FALLBACK_RATE
        })
    }

    /// Value for `<ntsc>` elements.
    pub fn ntsc_flag(&self) -> &'static str {
        if self.ntsc { "TRUE" } else { "FALSE" }
    }

    /// Value for `<displayformat>` elements.
    pub fn display_format(&self) -> &'static str {
        if self.ntsc { "DF" } else { "NDF" }
    }
}
