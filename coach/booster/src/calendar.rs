use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Number of weeks in the booster curriculum.
pub const PROGRAM_WEEKS: u8 = 12;

/// Day-of-week convention for aligning resumed schedules.
///
/// One convention is applied everywhere a week boundary is computed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    /// Weeks run Sunday..Saturday.
    #[default]
    Sunday,
    /// Weeks run Monday..Sunday.
    Monday,
}

impl WeekStart {
    /// First day of the week containing `date`.
    #[must_use]
    pub fn start_of_week(self, date: NaiveDate) -> NaiveDate {
        let offset = match self {
            Self::Sunday => date.weekday().num_days_from_sunday(),
            Self::Monday => date.weekday().num_days_from_monday(),
        };
        date - Duration::days(i64::from(offset))
    }

    /// Last day of the week containing `date`.
    #[must_use]
    pub fn end_of_week(self, date: NaiveDate) -> NaiveDate {
        self.start_of_week(date) + Duration::days(6)
    }

    /// Lower-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Monday => "monday",
        }
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WeekStart {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Ok(Self::Sunday),
            "monday" | "mon" => Ok(Self::Monday),
            other => Err(format!("unsupported week start `{other}`")),
        }
    }
}

/// Seven-day calendar window a task is active in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekWindow {
    /// First day.
    pub start: NaiveDate,
    /// Last day, always `start + 6`.
    pub end: NaiveDate,
}

impl WeekWindow {
    /// Window beginning on `start`.
    #[must_use]
    pub fn starting(start: NaiveDate) -> Self {
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    /// Window of program week `week` for a schedule anchored on `base`.
    #[must_use]
    pub fn for_week(base: NaiveDate, week: u8) -> Self {
        Self::starting(base + Duration::weeks(i64::from(week.saturating_sub(1))))
    }

    /// True when `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Source of "now". Injected so schedules are reproducible under test.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    /// Clock pinned to `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Clock pinned to noon UTC on `date`.
    #[must_use]
    pub fn on(date: NaiveDate) -> Self {
        let now = date
            .and_hms_opt(12, 0, 0)
            .map_or_else(Utc::now, |naive| Utc.from_utc_datetime(&naive));
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sunday_convention_aligns_back_to_sunday() {
        // 2024-06-10 is a Monday.
        assert_eq!(WeekStart::Sunday.start_of_week(date(2024, 6, 10)), date(2024, 6, 9));
        assert_eq!(WeekStart::Sunday.end_of_week(date(2024, 6, 10)), date(2024, 6, 15));
        assert_eq!(WeekStart::Sunday.start_of_week(date(2024, 6, 9)), date(2024, 6, 9));
    }

    #[test]
    fn monday_convention_aligns_back_to_monday() {
        assert_eq!(WeekStart::Monday.start_of_week(date(2024, 6, 9)), date(2024, 6, 3));
        assert_eq!(WeekStart::Monday.start_of_week(date(2024, 6, 10)), date(2024, 6, 10));
        assert_eq!(WeekStart::Monday.end_of_week(date(2024, 6, 10)), date(2024, 6, 16));
    }

    #[test]
    fn end_of_week_of_aligned_start_is_six_days_later() {
        for week_start in [WeekStart::Sunday, WeekStart::Monday] {
            let mut day = date(2024, 2, 20);
            for _ in 0..14 {
                let start = week_start.start_of_week(day);
                assert_eq!(week_start.end_of_week(start), WeekWindow::starting(start).end);
                day = day.succ_opt().unwrap();
            }
        }
    }

    #[test]
    fn program_windows_step_by_seven_days() {
        let base = date(2024, 1, 7);
        assert_eq!(
            WeekWindow::for_week(base, 1),
            WeekWindow {
                start: date(2024, 1, 7),
                end: date(2024, 1, 13)
            }
        );
        assert_eq!(
            WeekWindow::for_week(base, PROGRAM_WEEKS),
            WeekWindow {
                start: date(2024, 3, 24),
                end: date(2024, 3, 30)
            }
        );
        assert!(WeekWindow::for_week(base, 2).contains(date(2024, 1, 14)));
    }

    #[test]
    fn fixed_clock_reports_pinned_date() {
        assert_eq!(FixedClock::on(date(2024, 6, 10)).today(), date(2024, 6, 10));
        assert_eq!("Mon".parse::<WeekStart>(), Ok(WeekStart::Monday));
    }
}
