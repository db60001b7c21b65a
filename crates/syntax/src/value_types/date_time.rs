use std::fmt;

use super::date::Date;
use super::time::Time;

/// A combined date and time, rendered with a space separator between the
/// two. The source separator may be ` `, `t`, or `T`, but canonical
/// rendering always uses a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTime {
    date: Date,
    time: Time,
}

impl DateTime {
    pub fn new(date: Date, time: Time) -> Self {
        Self { date, time }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn time(&self) -> Time {
        self.time
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_types::time::TimeZone;

    #[test]
    fn display_joins_date_and_time_with_space() {
        let dt = DateTime::new(Date::new(2024, 2, 29).unwrap(), Time::new(8, 30, 0, 0, TimeZone::Utc).unwrap());
        assert_eq!(dt.to_string(), "2024-02-29 08:30:00z");
    }
}
