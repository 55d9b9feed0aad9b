//! Placing "now" within the current day or night.
//!
//! The elapsed share of the current period is split into ten equal buckets, each with a phrase
//! that reads naturally in "it is {phrase} in {season}".

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use crate::constants::UNKNOWN_TIME;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// One tenth of the day or of the night.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[allow(missing_docs)]
pub enum TimeSegment {
    Sunrise,
    EarlyMorning,
    MidMorning,
    LateMorning,
    Noon,
    EarlyAfternoon,
    MidAfternoon,
    LateAfternoon,
    Dusk,
    Sunset,
    Twilight,
    EarlyNight,
    Nightfall,
    MidnightHours,
    LateNight,
    DeepNight,
    QuietHours,
    PreDawn,
    DawnsFirstLight,
    Dawn,
}

const DAY_SEGMENTS: [TimeSegment; 10] = [
    TimeSegment::Sunrise,
    TimeSegment::EarlyMorning,
    TimeSegment::MidMorning,
    TimeSegment::LateMorning,
    TimeSegment::Noon,
    TimeSegment::EarlyAfternoon,
    TimeSegment::MidAfternoon,
    TimeSegment::LateAfternoon,
    TimeSegment::Dusk,
    TimeSegment::Sunset,
];

const NIGHT_SEGMENTS: [TimeSegment; 10] = [
    TimeSegment::Twilight,
    TimeSegment::EarlyNight,
    TimeSegment::Nightfall,
    TimeSegment::MidnightHours,
    TimeSegment::LateNight,
    TimeSegment::DeepNight,
    TimeSegment::QuietHours,
    TimeSegment::PreDawn,
    TimeSegment::DawnsFirstLight,
    TimeSegment::Dawn,
];

impl TimeSegment {
    /// The phrase used in prompts
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Sunrise => "sunrise",
            Self::EarlyMorning => "early morning",
            Self::MidMorning => "mid-morning",
            Self::LateMorning => "late morning",
            Self::Noon => "noon",
            Self::EarlyAfternoon => "early afternoon",
            Self::MidAfternoon => "mid-afternoon",
            Self::LateAfternoon => "late afternoon",
            Self::Dusk => "dusk",
            Self::Sunset => "sunset",
            Self::Twilight => "twilight",
            Self::EarlyNight => "early night",
            Self::Nightfall => "nightfall",
            Self::MidnightHours => "midnight hours",
            Self::LateNight => "late night",
            Self::DeepNight => "deep night",
            Self::QuietHours => "quiet hours",
            Self::PreDawn => "pre-dawn",
            Self::DawnsFirstLight => "dawn's first light",
            Self::Dawn => "dawn",
        }
    }

    /// Looks up the bucket `[n/10, (n+1)/10)` containing `fraction`.
    ///
    /// Anything outside `[0, 1)`, NaN included, has no segment.
    pub fn from_fraction(fraction: f64, is_day: bool) -> Option<Self> {
        let table = if is_day {
            &DAY_SEGMENTS
        } else {
            &NIGHT_SEGMENTS
        };
        table.iter().enumerate().find_map(|(index, segment)| {
            let lower = index as f64 / 10.0;
            let upper = (index + 1) as f64 / 10.0;
            (lower <= fraction && fraction < upper).then_some(*segment)
        })
    }
}

/// Sun state as reported by Home Assistant's `sun.sun` entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunPosition {
    /// `true` while the sun is above the horizon
    pub is_day: bool,
    /// Next sunrise
    pub next_rising: DateTime<Utc>,
    /// Next sunset
    pub next_setting: DateTime<Utc>,
}

impl SunPosition {
    /// Share of the current day (or night) that has already passed.
    ///
    /// Only the UTC time of day is used, differences wrap at midnight. A zero-length period
    /// yields NaN.
    pub fn elapsed_fraction(&self, now: DateTime<Utc>) -> f64 {
        let rising = seconds_of_day(&self.next_rising);
        let setting = seconds_of_day(&self.next_setting);
        let now = seconds_of_day(&now);

        let day_length = (setting - rising).rem_euclid(SECONDS_PER_DAY);
        let night_length = SECONDS_PER_DAY - day_length;

        let (passed, period) = if self.is_day {
            ((now - rising).rem_euclid(SECONDS_PER_DAY), day_length)
        } else {
            ((now - setting).rem_euclid(SECONDS_PER_DAY), night_length)
        };
        if period == 0.0 {
            return f64::NAN;
        }
        passed / period
    }

    /// The segment `now` falls in, if the sun data makes sense.
    pub fn segment(&self, now: DateTime<Utc>) -> Option<TimeSegment> {
        TimeSegment::from_fraction(self.elapsed_fraction(now), self.is_day)
    }

    /// The phrase for `now`, or "Unknown time".
    pub fn describe(&self, now: DateTime<Utc>) -> &'static str {
        self.segment(now)
            .map(TimeSegment::phrase)
            .unwrap_or(UNKNOWN_TIME)
    }
}

fn seconds_of_day(instant: &DateTime<Utc>) -> f64 {
    f64::from(instant.num_seconds_from_midnight()) + f64::from(instant.nanosecond()) / 1e9
}
