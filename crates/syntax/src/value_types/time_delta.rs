use std::fmt;

/// The unit attached to a [`TimeDelta`] count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Parse one of the case-insensitive unit spellings (long
    /// singular/plural form or short form).
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.to_ascii_lowercase();
        Some(match lower.as_str() {
            "nanosecond" | "nanoseconds" | "ns" => TimeUnit::Nanosecond,
            "microsecond" | "microseconds" | "us" | "\u{b5}s" => TimeUnit::Microsecond,
            "millisecond" | "milliseconds" | "ms" => TimeUnit::Millisecond,
            "second" | "seconds" | "s" => TimeUnit::Second,
            "minute" | "minutes" | "m" => TimeUnit::Minute,
            "hour" | "hours" | "h" => TimeUnit::Hour,
            "day" | "days" | "d" => TimeUnit::Day,
            "week" | "weeks" | "w" => TimeUnit::Week,
            "month" | "months" => TimeUnit::Month,
            "year" | "years" => TimeUnit::Year,
            _ => return None,
        })
    }

    /// The canonical long-plural spelling used when rendering.
    pub fn canonical_text(&self) -> &'static str {
        match self {
            TimeUnit::Nanosecond => "nanoseconds",
            TimeUnit::Microsecond => "microseconds",
            TimeUnit::Millisecond => "milliseconds",
            TimeUnit::Second => "seconds",
            TimeUnit::Minute => "minutes",
            TimeUnit::Hour => "hours",
            TimeUnit::Day => "days",
            TimeUnit::Week => "weeks",
            TimeUnit::Month => "months",
            TimeUnit::Year => "years",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_text())
    }
}

/// A signed count of a [`TimeUnit`], e.g. `-3 days`. Months
/// and years are calendar units and intentionally not reduced to a fixed
/// number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeDelta {
    count: i64,
    unit: TimeUnit,
}

impl TimeDelta {
    pub fn new(count: i64, unit: TimeUnit) -> Self {
        Self { count, unit }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Total nanoseconds, for fixed-duration units (`Nanosecond` ..
    /// `Week`). Returns `None` for `Month`/`Year`, whose length depends on
    /// a calendar anchor.
    pub fn to_fixed_nanoseconds(&self) -> Option<i128> {
        let per_unit: i128 = match self.unit {
            TimeUnit::Nanosecond => 1,
            TimeUnit::Microsecond => 1_000,
            TimeUnit::Millisecond => 1_000_000,
            TimeUnit::Second => 1_000_000_000,
            TimeUnit::Minute => 60 * 1_000_000_000,
            TimeUnit::Hour => 3_600 * 1_000_000_000,
            TimeUnit::Day => 86_400 * 1_000_000_000,
            TimeUnit::Week => 7 * 86_400 * 1_000_000_000,
            TimeUnit::Month | TimeUnit::Year => return None,
        };
        Some(per_unit * self.count as i128)
    }
}

impl fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.count, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_short_and_long_case_insensitive_forms() {
        assert_eq!(TimeUnit::parse("s"), Some(TimeUnit::Second));
        assert_eq!(TimeUnit::parse("Seconds"), Some(TimeUnit::Second));
        assert_eq!(TimeUnit::parse("MS"), Some(TimeUnit::Millisecond));
        assert_eq!(TimeUnit::parse("bogus"), None);
    }

    #[test]
    fn display_uses_canonical_plural() {
        assert_eq!(TimeDelta::new(-3, TimeUnit::Day).to_string(), "-3 days");
    }

    #[test]
    fn fixed_nanoseconds_scales_by_unit() {
        assert_eq!(TimeDelta::new(2, TimeUnit::Second).to_fixed_nanoseconds(), Some(2_000_000_000));
        assert_eq!(TimeDelta::new(1, TimeUnit::Year).to_fixed_nanoseconds(), None);
    }
}
