use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};

/// Converts a zoned moment to the epoch-millisecond form records carry.
pub fn to_millis<Tz: TimeZone>(moment: DateTime<Tz>) -> i64 {
    moment.timestamp_millis()
}

/// Converts a record timestamp back to local time for display.
pub fn local_from_millis(millis: i64) -> DateTime<Local> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
        .with_timezone(&Local)
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}

/// Renders a millisecond duration as 1h2m3s / 2m3s / 3s.
pub fn format_millis(millis: i64) -> String {
    let duration = Duration::milliseconds(millis.max(0));
    if duration.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            duration.num_hours(),
            duration.num_minutes() % 60,
            duration.num_seconds() % 60
        )
    } else if duration.num_minutes() > 0 {
        format!("{}m{}s", duration.num_minutes() % 60, duration.num_seconds() % 60)
    } else {
        format!("{}s", duration.num_seconds() % 60)
    }
}
