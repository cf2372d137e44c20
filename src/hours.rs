use chrono::{Duration, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::errors::Degradation;

pub const MAX_SLOTS_PER_DAY: usize = 3;
pub const LAST_ORDER_SENTINEL: &str = "21:30";
const LAST_ORDER_LEAD_MINUTES: i64 = 30;
const MIDNIGHT: &str = "00:00";
const DEFAULT_OPEN: &str = "11:00";
const DEFAULT_CLOSE: &str = "22:00";

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
const CLOSED_MARKERS: &[&str] = &["closed", "定休日", "休業日"];
const ALWAYS_OPEN_MARKERS: &[&str] = &["open 24 hours", "24 時間営業", "24時間営業"];

static DAY_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?i:monday|tuesday|wednesday|thursday|friday|saturday|sunday|[月火水木金土日]曜日?)\s*[:：]\s*",
    )
    .expect("valid day label regex")
});
static JAPANESE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})時(\d{2})分\s*[～〜~\-–—]+\s*(\d{1,2})時(\d{2})分")
        .expect("valid japanese range regex")
});
static TWELVE_HOUR_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{1,2}):(\d{2})\s*(?i:(AM|PM))?\s*[–\-～〜~—]+\s*(\d{1,2}):(\d{2})\s*(?i:(AM|PM))?",
    )
    .expect("valid twelve hour range regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub open_time: String,
    pub close_time: String,
    pub last_order_time: String,
}

impl TimeSlot {
    pub fn new(open_time: String, close_time: String) -> Self {
        let last_order_time = last_order_for(&close_time);
        Self {
            open_time,
            close_time,
            last_order_time,
        }
    }

    pub fn always_open() -> Self {
        Self::new(MIDNIGHT.to_string(), MIDNIGHT.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub is_closed: bool,
    pub time_slots: Vec<TimeSlot>,
}

impl DaySchedule {
    pub fn closed() -> Self {
        Self {
            is_closed: true,
            time_slots: Vec::new(),
        }
    }

    pub fn open(mut time_slots: Vec<TimeSlot>) -> Self {
        time_slots.truncate(MAX_SLOTS_PER_DAY);
        Self {
            is_closed: false,
            time_slots,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeeklySchedule {
    pub monday: DaySchedule,
    pub tuesday: DaySchedule,
    pub wednesday: DaySchedule,
    pub thursday: DaySchedule,
    pub friday: DaySchedule,
    pub saturday: DaySchedule,
    pub sunday: DaySchedule,
}

impl WeeklySchedule {
    pub fn from_days(days: [DaySchedule; 7]) -> Self {
        let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = days;
        Self {
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            sunday,
        }
    }

    pub fn default_hours() -> Self {
        let slot = TimeSlot::new(DEFAULT_OPEN.to_string(), DEFAULT_CLOSE.to_string());
        Self::from_days(std::array::from_fn(|_| DaySchedule::open(vec![slot.clone()])))
    }

    pub fn days(&self) -> [&DaySchedule; 7] {
        [
            &self.monday,
            &self.tuesday,
            &self.wednesday,
            &self.thursday,
            &self.friday,
            &self.saturday,
            &self.sunday,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHours {
    pub schedule: WeeklySchedule,
    pub degradations: Vec<Degradation>,
}

pub fn parse_weekly_hours(descriptions: &[String]) -> ParsedHours {
    if descriptions.is_empty() {
        return ParsedHours {
            schedule: WeeklySchedule::default_hours(),
            degradations: vec![Degradation::HoursParseDegraded {
                reason: format!(
                    "no weekday descriptions; default {DEFAULT_OPEN}-{DEFAULT_CLOSE} applied"
                ),
            }],
        };
    }

    let mut degradations = Vec::new();
    let days = std::array::from_fn(|index| {
        let weekday = WEEKDAYS[index];
        let Some(description) = descriptions.get(index) else {
            degradations.push(Degradation::HoursParseDegraded {
                reason: format!("no description for {weekday}"),
            });
            return DaySchedule::default();
        };
        let (day, recognized) = parse_day(description);
        if !recognized {
            degradations.push(Degradation::HoursParseDegraded {
                reason: format!("unrecognized hours for {weekday}: {description}"),
            });
        }
        day
    });

    ParsedHours {
        schedule: WeeklySchedule::from_days(days),
        degradations,
    }
}

pub fn parse_day(description: &str) -> (DaySchedule, bool) {
    let body = DAY_LABEL.replace(description, "");
    let lowered = body.to_lowercase();

    if CLOSED_MARKERS.iter().any(|marker| lowered.contains(*marker)) {
        return (DaySchedule::closed(), true);
    }
    if ALWAYS_OPEN_MARKERS
        .iter()
        .any(|marker| lowered.contains(*marker))
    {
        return (DaySchedule::open(vec![TimeSlot::always_open()]), true);
    }

    let slots: Vec<TimeSlot> = body
        .split([',', '、', '，'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(parse_range)
        .collect();
    let recognized = !slots.is_empty();
    (DaySchedule::open(slots), recognized)
}

fn parse_range(segment: &str) -> Option<TimeSlot> {
    if let Some(captures) = JAPANESE_RANGE.captures(segment) {
        let open = clock(number(&captures, 1)? % 24, number(&captures, 2)?)?;
        let close = clock(number(&captures, 3)? % 24, number(&captures, 4)?)?;
        return Some(TimeSlot::new(open, close));
    }

    let captures = TWELVE_HOUR_RANGE.captures(segment)?;
    let close_period = captures.get(6).map(|m| m.as_str().to_ascii_uppercase());
    let open_period = captures
        .get(3)
        .map(|m| m.as_str().to_ascii_uppercase())
        .or_else(|| close_period.clone());
    let open = to_24_hour(
        number(&captures, 1)?,
        number(&captures, 2)?,
        open_period.as_deref(),
    )?;
    let close = to_24_hour(
        number(&captures, 4)?,
        number(&captures, 5)?,
        close_period.as_deref(),
    )?;
    Some(TimeSlot::new(open, close))
}

fn number(captures: &Captures<'_>, index: usize) -> Option<u32> {
    captures.get(index)?.as_str().parse().ok()
}

fn to_24_hour(hour: u32, minute: u32, period: Option<&str>) -> Option<String> {
    let hour = match period {
        Some("PM") if (1..=12).contains(&hour) => {
            if hour == 12 {
                12
            } else {
                hour + 12
            }
        }
        Some("AM") if (1..=12).contains(&hour) => {
            if hour == 12 {
                0
            } else {
                hour
            }
        }
        None if hour < 24 => hour,
        _ => return None,
    };
    clock(hour, minute)
}

fn clock(hour: u32, minute: u32) -> Option<String> {
    (hour < 24 && minute < 60).then(|| format!("{hour:02}:{minute:02}"))
}

pub fn last_order_for(close_time: &str) -> String {
    if close_time == MIDNIGHT {
        return MIDNIGHT.to_string();
    }
    match NaiveTime::parse_from_str(close_time, "%H:%M") {
        Ok(close) => {
            let (last_order, _) =
                close.overflowing_sub_signed(Duration::minutes(LAST_ORDER_LEAD_MINUTES));
            last_order.format("%H:%M").to_string()
        }
        Err(_) => LAST_ORDER_SENTINEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(descriptions: &[&str]) -> Vec<String> {
        descriptions.iter().map(|d| d.to_string()).collect()
    }

    fn slot(open: &str, close: &str, last_order: &str) -> TimeSlot {
        TimeSlot {
            open_time: open.into(),
            close_time: close.into(),
            last_order_time: last_order.into(),
        }
    }

    #[test]
    fn parses_english_twelve_hour_ranges() {
        let (day, recognized) = parse_day("Monday: 11:00\u{202f}AM\u{2009}–\u{2009}10:00\u{202f}PM");
        assert!(recognized);
        assert!(!day.is_closed);
        assert_eq!(day.time_slots, vec![slot("11:00", "22:00", "21:30")]);
    }

    #[test]
    fn parses_japanese_ranges_with_lunch_and_dinner() {
        let (day, _) = parse_day("火曜日: 11時30分～14時00分、17時00分～22時30分");
        assert_eq!(
            day.time_slots,
            vec![
                slot("11:30", "14:00", "13:30"),
                slot("17:00", "22:30", "22:00"),
            ]
        );
    }

    #[test]
    fn elided_start_period_inherits_close_period() {
        let (day, _) = parse_day("Friday: 5:00 – 11:30 PM");
        assert_eq!(day.time_slots, vec![slot("17:00", "23:30", "23:00")]);
    }

    #[test]
    fn closed_markers_in_both_languages() {
        for description in ["Sunday: Closed", "日曜日: 定休日", "定休日"] {
            let (day, recognized) = parse_day(description);
            assert!(recognized);
            assert!(day.is_closed, "{description}");
            assert!(day.time_slots.is_empty());
        }
    }

    #[test]
    fn open_all_day_is_a_midnight_sentinel_slot() {
        for description in ["Saturday: Open 24 hours", "土曜日: 24 時間営業"] {
            let (day, _) = parse_day(description);
            assert_eq!(day.time_slots, vec![slot("00:00", "00:00", "00:00")]);
        }
    }

    #[test]
    fn truncates_to_three_slots_keeping_the_first() {
        let (day, _) = parse_day(
            "Monday: 7:00 AM – 9:00 AM, 11:00 AM – 2:00 PM, 5:00 PM – 8:00 PM, 9:00 PM – 11:00 PM",
        );
        assert_eq!(day.time_slots.len(), MAX_SLOTS_PER_DAY);
        assert_eq!(day.time_slots[0].open_time, "07:00");
        assert_eq!(day.time_slots[2].open_time, "17:00");
    }

    #[test]
    fn unrecognized_text_stays_open_with_no_slots() {
        let (day, recognized) = parse_day("Wednesday: Hours might differ");
        assert!(!recognized);
        assert!(!day.is_closed);
        assert!(day.time_slots.is_empty());
    }

    #[test]
    fn last_order_wraps_across_midnight() {
        assert_eq!(last_order_for("22:00"), "21:30");
        assert_eq!(last_order_for("00:15"), "23:45");
        assert_eq!(last_order_for("14:45"), "14:15");
        assert_eq!(last_order_for("00:00"), "00:00");
        assert_eq!(last_order_for("late"), LAST_ORDER_SENTINEL);
    }

    #[test]
    fn noon_and_midnight_conversions() {
        let (day, _) = parse_day("Monday: 12:00 PM – 12:00 AM");
        assert_eq!(day.time_slots, vec![slot("12:00", "00:00", "00:00")]);
    }

    #[test]
    fn empty_list_applies_documented_default() {
        let parsed = parse_weekly_hours(&[]);
        for day in parsed.schedule.days() {
            assert_eq!(day.time_slots, vec![slot("11:00", "22:00", "21:30")]);
            assert!(!day.is_closed);
        }
        assert_eq!(parsed.degradations.len(), 1);
    }

    #[test]
    fn maps_descriptions_to_days_by_position() {
        let parsed = parse_weekly_hours(&week(&[
            "Monday: 11:00 AM – 10:00 PM",
            "Tuesday: 11:00 AM – 10:00 PM",
            "Wednesday: 11:00 AM – 10:00 PM",
            "Thursday: 11:00 AM – 10:00 PM",
            "Friday: 11:00 AM – 11:00 PM",
            "Saturday: Open 24 hours",
            "定休日",
        ]));
        let schedule = parsed.schedule;
        assert_eq!(schedule.monday.time_slots, vec![slot("11:00", "22:00", "21:30")]);
        assert_eq!(schedule.friday.time_slots[0].close_time, "23:00");
        assert_eq!(schedule.saturday.time_slots[0].open_time, "00:00");
        assert!(schedule.sunday.is_closed);
        assert!(schedule.sunday.time_slots.is_empty());
        assert!(parsed.degradations.is_empty());
    }

    #[test]
    fn short_lists_leave_missing_days_open_and_flagged() {
        let parsed = parse_weekly_hours(&week(&["Monday: Closed"]));
        assert!(parsed.schedule.monday.is_closed);
        assert_eq!(parsed.schedule.tuesday, DaySchedule::default());
        assert_eq!(parsed.degradations.len(), 6);
    }

    #[test]
    fn recognized_slots_never_order_after_close() {
        let descriptions = week(&[
            "Monday: 9:00 AM – 5:00 PM",
            "Tuesday: 11時00分～20時00分",
            "Wednesday: 6:00 PM – 12:30 AM",
            "Thursday: Open 24 hours",
            "Friday: 10:00 AM – 2:00 PM, 5:00 PM – 9:45 PM",
            "Saturday: 8:30 AM – 11:00 AM",
            "Sunday: Closed",
        ]);
        let schedule = parse_weekly_hours(&descriptions).schedule;
        for day in schedule.days() {
            assert!(day.time_slots.len() <= MAX_SLOTS_PER_DAY);
            for slot in &day.time_slots {
                let close = NaiveTime::parse_from_str(&slot.close_time, "%H:%M").unwrap();
                let last = NaiveTime::parse_from_str(&slot.last_order_time, "%H:%M").unwrap();
                if slot.close_time == "00:00" {
                    assert_eq!(last, close);
                } else {
                    assert_eq!((close - last).num_minutes().rem_euclid(24 * 60), 30);
                }
            }
        }
    }
}
