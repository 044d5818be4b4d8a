use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

/// Number of consecutive active days ending at `day`, 0 when `day` itself wasn't active.
pub fn run_ending_at(active_dates: &BTreeSet<NaiveDate>, day: NaiveDate) -> u32 {
    let mut length = 0;
    let mut cursor = Some(day);
    while let Some(current) = cursor.filter(|current| active_dates.contains(current)) {
        length += 1;
        cursor = current.checked_sub_days(Days::new(1));
    }
    length
}

pub fn longest_run(active_dates: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in active_dates {
        current = match previous {
            Some(previous) if previous.checked_add_days(Days::new(1)) == Some(day) => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}

/// The streak as it stands on `today`: it survives until the end of the day after the last
/// active day, after that it is broken even though nothing was recorded yet.
pub fn effective_streak(current: u32, last_active_day: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_active_day {
        Some(last) if last >= today.checked_sub_days(Days::new(1)).unwrap_or(today) => current,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn days(list: &[u32]) -> BTreeSet<NaiveDate> {
        list.iter().map(|&d| day(d)).collect()
    }

    #[test]
    fn runs() {
        let active = days(&[1, 2, 3, 5, 6, 9]);
        assert_eq!(run_ending_at(&active, day(3)), 3);
        assert_eq!(run_ending_at(&active, day(6)), 2);
        assert_eq!(run_ending_at(&active, day(9)), 1);
        assert_eq!(run_ending_at(&active, day(4)), 0);
        assert_eq!(longest_run(&active), 3);
        assert_eq!(longest_run(&BTreeSet::new()), 0);
    }

    #[test]
    fn filling_a_gap_joins_runs() {
        let mut active = days(&[1, 2, 4, 5, 6]);
        assert_eq!(longest_run(&active), 3);
        active.insert(day(3));
        assert_eq!(longest_run(&active), 6);
        assert_eq!(run_ending_at(&active, day(6)), 6);
    }

    #[test]
    fn month_boundary_extends() {
        let active: BTreeSet<_> = [
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ]
        .into();
        assert_eq!(longest_run(&active), 2);
        assert_eq!(
            run_ending_at(&active, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            2
        );
    }

    #[test]
    fn stale_streak_reports_zero() {
        assert_eq!(effective_streak(4, Some(day(10)), day(10)), 4);
        assert_eq!(effective_streak(4, Some(day(10)), day(11)), 4);
        assert_eq!(effective_streak(4, Some(day(10)), day(12)), 0);
        assert_eq!(effective_streak(0, None, day(12)), 0);
    }
}
