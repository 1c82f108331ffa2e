use crate::error::AppError;

/// Converts a time-on-ice string into whole seconds.
///
/// Accepts `"M:SS"`/`"MM:SS"` (minutes may exceed 59, as in a 65:00 overtime
/// goalie log) and `"H:MM:SS"`. Every field must be plain ASCII digits and the
/// seconds field, as well as the minutes field of the three-part form, must be
/// below 60.
///
/// # Examples
///
/// ```
/// use nhl_etl::data_fetcher::processors::parse_duration_seconds;
///
/// assert_eq!(parse_duration_seconds("1:23:45").unwrap(), 5025);
/// assert_eq!(parse_duration_seconds("17:23").unwrap(), 1043);
/// assert!(parse_duration_seconds("17").is_err());
/// ```
pub fn parse_duration_seconds(value: &str) -> Result<i64, AppError> {
    let trimmed = value.trim();
    let fields: Vec<&str> = trimmed.split(':').collect();

    let parse_field = |field: &str| -> Result<i64, AppError> {
        if field.is_empty() || field.len() > 6 || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::duration_parse(value));
        }
        field
            .parse::<i64>()
            .map_err(|_| AppError::duration_parse(value))
    };

    match fields.as_slice() {
        [minutes, seconds] => {
            let minutes = parse_field(minutes)?;
            let seconds = parse_field(seconds)?;
            if seconds >= 60 {
                return Err(AppError::duration_parse(value));
            }
            Ok(minutes * 60 + seconds)
        }
        [hours, minutes, seconds] => {
            let hours = parse_field(hours)?;
            let minutes = parse_field(minutes)?;
            let seconds = parse_field(seconds)?;
            if minutes >= 60 || seconds >= 60 {
                return Err(AppError::duration_parse(value));
            }
            Ok(hours * 3600 + minutes * 60 + seconds)
        }
        _ => Err(AppError::duration_parse(value)),
    }
}
