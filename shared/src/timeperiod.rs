use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use strum::EnumIter;

use super::*;

pub use strum::IntoEnumIterator;

pub type TimePeriodString = String;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, EnumIter)]
pub enum TimePeriod {
    Day,
    Week,
    Month,
    AllTime,
}

impl TimePeriod {
    pub fn from_time_period_string(period: &str) -> Option<Self> {
        match period {
            "all-time" => Some(TimePeriod::AllTime),
            a if a.contains('W') => Some(TimePeriod::Week),
            a if a.len() == 8 && a.chars().all(|c| c.is_ascii_digit()) => Some(TimePeriod::Day),
            a if a.len() == 6 && a.chars().all(|c| c.is_ascii_digit()) => Some(TimePeriod::Month),
            _ => None,
        }
    }

    pub fn time_string(&self, timestamp: DateTime<Utc>) -> TimePeriodString {
        self.date_string(timestamp.date_naive())
    }

    pub fn date_string(&self, date: NaiveDate) -> TimePeriodString {
        match self {
            TimePeriod::Day => format!("{:04}{:02}{:02}", date.year(), date.month(), date.day()),
            TimePeriod::Week => {
                let week = date.iso_week();
                format!("{}W{:02}", week.year(), week.week())
            }
            TimePeriod::Month => format!("{:04}{:02}", date.year(), date.month()),
            TimePeriod::AllTime => "all-time".to_string(),
        }
    }

    pub fn previous_period(&self, timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let result = match self {
            TimePeriod::Day => timestamp.checked_sub_days(Days::new(1))?,
            TimePeriod::Week => timestamp.checked_sub_days(Days::new(7))?,
            TimePeriod::Month => timestamp.checked_sub_months(Months::new(1))?,
            TimePeriod::AllTime => return None,
        };

        Some(result)
    }

    /// First instant of the period containing `timestamp`.
    pub fn start_period(&self, timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let date = timestamp.date_naive();
        let start = match self {
            TimePeriod::Day => date,
            TimePeriod::Week => {
                date.checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))?
            }
            TimePeriod::Month => date.with_day(1)?,
            TimePeriod::AllTime => return None,
        };

        Some(start.and_time(NaiveTime::MIN).and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn week_string_uses_iso_week_year() {
        // 2021-01-01 is a Friday belonging to ISO week 53 of 2020
        let date = Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(TimePeriod::Week.time_string(date), "2020W53");

        let date = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(TimePeriod::Week.time_string(date), "2024W05");
    }

    #[test]
    fn period_strings_round_trip_to_period_type() {
        let date = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        for period in TimePeriod::iter() {
            let string = period.time_string(date);
            assert_eq!(TimePeriod::from_time_period_string(&string), Some(period));
        }
        assert_eq!(TimePeriod::Day.time_string(date), "20240309");
        assert_eq!(TimePeriod::Month.time_string(date), "202403");
    }

    #[test]
    fn week_starts_on_monday() {
        let sunday = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        let start = TimePeriod::Week.start_period(sunday).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(TimePeriod::AllTime.start_period(sunday), None);
    }
}
