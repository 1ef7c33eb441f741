use chrono::{Datelike, Duration, NaiveDate};

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|date| date.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Weekday of the 1st of the month, 0 = Sunday .. 6 = Saturday.
pub fn first_weekday_of_month(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first| first.weekday().num_days_from_sunday())
        .unwrap_or(0)
}

pub fn first_day_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// The Sunday on or before `day`.
pub fn start_of_week(day: NaiveDate) -> NaiveDate {
    let days_from_sunday = i64::from(day.weekday().num_days_from_sunday());
    day - Duration::days(days_from_sunday)
}

pub fn add_days(day: NaiveDate, days: i64) -> NaiveDate {
    day + Duration::days(days)
}

/// Moves by whole months, clamping the day to the target month's length.
pub fn shift_month(day: NaiveDate, delta: i32) -> NaiveDate {
    let mut year = day.year();
    let mut month = day.month() as i32 + delta;
    while month > 12 {
        year += 1;
        month -= 12;
    }
    while month < 1 {
        year -= 1;
        month += 12;
    }
    let month = month as u32;
    let target_day = day.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, target_day).unwrap_or(day)
}

pub fn date_key(day: NaiveDate) -> String {
    day.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_KEY_FORMAT).ok()
}

/// Parses a zero-padded `HH:MM` string into minutes since midnight.
pub fn minutes_of_day(time: &str) -> Option<u32> {
    let (hour, minute) = time.trim().split_once(':')?;
    let hour = hour.parse::<u32>().ok()?;
    let minute = minute.parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

pub fn format_clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Start time plus one hour, clamped to the last minute of the day.
pub fn default_end_time(start: &str) -> String {
    match minutes_of_day(start) {
        Some(minutes) => format_clock((minutes + 60).min(23 * 60 + 59)),
        None => "10:00".to_string(),
    }
}

/// Zero-pads a parseable clock time so string order matches time order. Anything else is kept as is.
pub fn normalize_clock(raw: &str) -> String {
    match minutes_of_day(raw) {
        Some(minutes) => format_clock(minutes),
        None => raw.to_string(),
    }
}

pub fn hour_label(hour: u32) -> String {
    format!("{hour:02}:00")
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use super::{
        add_days, date_key, days_in_month, default_end_time, first_weekday_of_month,
        minutes_of_day, normalize_clock, parse_date_key, shift_month, start_of_week,
    };

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn month_lengths_follow_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 4), 30);
    }

    #[test]
    fn first_weekday_counts_from_sunday() {
        // 2024-03-01 is a Friday, 2024-09-01 a Sunday.
        assert_eq!(first_weekday_of_month(2024, 3), 5);
        assert_eq!(first_weekday_of_month(2024, 9), 0);
        assert_eq!(first_weekday_of_month(2024, 6), 6);
    }

    #[test]
    fn week_starts_on_sunday() {
        assert_eq!(start_of_week(day(2024, 3, 5)), day(2024, 3, 3));
        assert_eq!(start_of_week(day(2024, 3, 3)), day(2024, 3, 3));
        assert_eq!(start_of_week(day(2024, 3, 2)), day(2024, 2, 25));
        assert_eq!(start_of_week(day(2024, 3, 2)).weekday(), chrono::Weekday::Sun);
    }

    #[test]
    fn add_days_crosses_month_and_year() {
        assert_eq!(add_days(day(2024, 12, 30), 3), day(2025, 1, 2));
        assert_eq!(add_days(day(2024, 3, 1), -1), day(2024, 2, 29));
    }

    #[test]
    fn shift_month_clamps_day() {
        assert_eq!(shift_month(day(2024, 1, 31), 1), day(2024, 2, 29));
        assert_eq!(shift_month(day(2024, 1, 15), -1), day(2023, 12, 15));
        assert_eq!(shift_month(day(2024, 11, 30), 14), day(2026, 1, 30));
    }

    #[test]
    fn date_keys_are_zero_padded() {
        assert_eq!(date_key(day(2024, 3, 5)), "2024-03-05");
        assert_eq!(parse_date_key("2024-03-05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date_key("2024-02-30"), None);
    }

    #[test]
    fn clock_parsing_rejects_garbage() {
        assert_eq!(minutes_of_day("09:30"), Some(570));
        assert_eq!(minutes_of_day("9:05"), Some(545));
        assert_eq!(minutes_of_day("24:00"), None);
        assert_eq!(minutes_of_day("noon"), None);
        assert_eq!(minutes_of_day(""), None);
    }

    #[test]
    fn default_end_is_one_hour_later() {
        assert_eq!(default_end_time("09:00"), "10:00");
        assert_eq!(default_end_time("14:45"), "15:45");
        assert_eq!(default_end_time("23:30"), "23:59");
    }

    #[test]
    fn normalize_pads_short_clock_times() {
        assert_eq!(normalize_clock("9:05"), "09:05");
        assert_eq!(normalize_clock(" 14:00 "), "14:00");
        assert_eq!(normalize_clock("10:00"), "10:00");
        assert_eq!(normalize_clock("soon"), "soon");
        assert!(normalize_clock("9:05") < normalize_clock("10:00"));
    }
}
