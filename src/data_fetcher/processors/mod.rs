pub mod time_formatting;

pub use time_formatting::parse_duration_seconds;
