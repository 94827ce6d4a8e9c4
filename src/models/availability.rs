use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::Lifecycle;

pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// A recurring weekly interval during which a professional takes bookings.
///
/// `weekday` counts from Monday (0) to Sunday (6). Times are local to the
/// professional's timezone and carry no date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityWindow {
    pub id: String,
    pub professional_id: String,
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: u32,
    pub lifecycle: Lifecycle,
}

impl AvailabilityWindow {
    pub fn new(
        id: impl Into<String>,
        professional_id: impl Into<String>,
        weekday: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> anyhow::Result<Self> {
        if start_time >= end_time {
            anyhow::bail!("window start {start_time} must be before end {end_time}");
        }
        Ok(Self {
            id: id.into(),
            professional_id: professional_id.into(),
            weekday: weekday_index(weekday),
            start_time,
            end_time,
            slot_minutes: DEFAULT_SLOT_MINUTES,
            lifecycle: Lifecycle::Active,
        })
    }

    pub fn weekday(&self) -> Option<Weekday> {
        weekday_from_index(self.weekday)
    }

    /// Local start/end pair with no date, e.g. `09:00-12:00`.
    pub fn hours_label(&self) -> String {
        format!(
            "{}-{}",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_monday() as u8
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| anyhow::anyhow!("invalid time: {s}"))
}

/// Renders windows as `Mon: 09:00-12:00, Fri: 10:00-16:00`, Monday first.
pub fn to_human_readable(windows: &[AvailabilityWindow]) -> String {
    let mut sorted: Vec<&AvailabilityWindow> = windows.iter().collect();
    sorted.sort_by_key(|w| (w.weekday, w.start_time));

    sorted
        .iter()
        .map(|w| {
            let day = w.weekday().map(|d| d.to_string()).unwrap_or_else(|| "?".into());
            format!("{day}: {}", w.hours_label())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        parse_time(s).unwrap()
    }

    #[test]
    fn test_window_rejects_inverted_times() {
        assert!(AvailabilityWindow::new("w1", "p1", Weekday::Mon, t("12:00"), t("09:00")).is_err());
        assert!(AvailabilityWindow::new("w1", "p1", Weekday::Mon, t("09:00"), t("09:00")).is_err());
    }

    #[test]
    fn test_window_defaults() {
        let w = AvailabilityWindow::new("w1", "p1", Weekday::Wed, t("09:00"), t("17:00")).unwrap();
        assert_eq!(w.weekday, 2);
        assert_eq!(w.weekday(), Some(Weekday::Wed));
        assert_eq!(w.slot_minutes, DEFAULT_SLOT_MINUTES);
        assert_eq!(w.lifecycle, Lifecycle::Active);
    }

    #[test]
    fn test_weekday_index_is_monday_first() {
        assert_eq!(weekday_index(Weekday::Mon), 0);
        assert_eq!(weekday_index(Weekday::Sun), 6);
        assert_eq!(weekday_from_index(6), Some(Weekday::Sun));
        assert_eq!(weekday_from_index(7), None);
    }

    #[test]
    fn test_parse_invalid_time() {
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("9").is_err());
    }

    #[test]
    fn test_to_human_readable() {
        let windows = vec![
            AvailabilityWindow::new("w2", "p1", Weekday::Fri, t("10:00"), t("16:00")).unwrap(),
            AvailabilityWindow::new("w1", "p1", Weekday::Mon, t("09:00"), t("17:00")).unwrap(),
        ];
        assert_eq!(to_human_readable(&windows), "Mon: 09:00-17:00, Fri: 10:00-16:00");
        assert_eq!(to_human_readable(&[]), "");
    }
}
