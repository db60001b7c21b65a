mod bytes;
mod date;
mod date_time;
mod regex;
mod time;
mod time_delta;

pub use bytes::Bytes;
pub use date::Date;
pub use date_time::DateTime;
pub use regex::RegEx;
pub use time::{Time, TimeZone};
pub use time_delta::{TimeDelta, TimeUnit};
