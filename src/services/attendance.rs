use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    HalfDay,
    Absent,
    WorkFromHome,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::HalfDay => "half_day",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::WorkFromHome => "work_from_home",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(AttendanceStatus::Present),
            "late" => Some(AttendanceStatus::Late),
            "half_day" => Some(AttendanceStatus::HalfDay),
            "absent" => Some(AttendanceStatus::Absent),
            "work_from_home" => Some(AttendanceStatus::WorkFromHome),
            _ => None,
        }
    }
}

/// Thresholds taken from the company settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttendancePolicy {
    pub office_start: NaiveTime,
    pub late_grace_minutes: i32,
    pub half_day_hours: f64,
    pub absent_below_hours: f64,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            office_start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            late_grace_minutes: 15,
            half_day_hours: 4.5,
            absent_below_hours: 2.0,
        }
    }
}

impl AttendancePolicy {
    pub fn late_after(&self) -> NaiveTime {
        self.office_start + Duration::minutes(i64::from(self.late_grace_minutes))
    }
}

/// Hours between the two punches, zero if check-out precedes check-in.
pub fn worked_hours(check_in: NaiveTime, check_out: NaiveTime) -> f64 {
    let minutes = (check_out - check_in).num_minutes();
    if minutes <= 0 {
        return 0.0;
    }
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

pub fn derive_status(
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    policy: &AttendancePolicy,
) -> AttendanceStatus {
    let Some(check_in) = check_in else {
        return AttendanceStatus::Absent;
    };
    if let Some(check_out) = check_out {
        let hours = worked_hours(check_in, check_out);
        if hours < policy.absent_below_hours {
            return AttendanceStatus::Absent;
        }
        if hours < policy.half_day_hours {
            return AttendanceStatus::HalfDay;
        }
    }
    if check_in > policy.late_after() {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Status of a day after its punches change. Approved work-from-home days
/// keep that status.
pub fn status_after_punches(
    current: Option<AttendanceStatus>,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    policy: &AttendancePolicy,
) -> AttendanceStatus {
    match current {
        Some(AttendanceStatus::WorkFromHome) => AttendanceStatus::WorkFromHome,
        _ => derive_status(check_in, check_out, policy),
    }
}

/// Status a work-from-home day falls back to once the approval is withdrawn.
/// `None` means nothing was punched and the day's record should go.
pub fn status_without_work_from_home(
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    policy: &AttendancePolicy,
) -> Option<AttendanceStatus> {
    check_in.map(|_| derive_status(check_in, check_out, policy))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatistics {
    pub total_employees: i64,
    pub present_today: i64,
    pub absent_today: i64,
    pub late_today: i64,
    pub half_day_today: i64,
    pub work_from_home_today: i64,
    pub attendance_rate: f64,
    pub punctuality_rate: f64,
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}

/// Day overview over the statuses recorded for `total_employees` active
/// employees. Employees without a record count as absent.
pub fn overview<I>(total_employees: i64, statuses: I) -> AttendanceStatistics
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let (mut present, mut late, mut half_day, mut wfh) = (0, 0, 0, 0);
    for status in statuses {
        match status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Late => late += 1,
            AttendanceStatus::HalfDay => half_day += 1,
            AttendanceStatus::WorkFromHome => wfh += 1,
            AttendanceStatus::Absent => {}
        }
    }
    let attended = present + late + half_day + wfh;
    AttendanceStatistics {
        total_employees,
        present_today: attended,
        absent_today: (total_employees - attended).max(0),
        late_today: late,
        half_day_today: half_day,
        work_from_home_today: wfh,
        attendance_rate: percent(attended, total_employees),
        punctuality_rate: percent(attended - late, attended),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub working_days: i64,
    pub recorded_days: i64,
    pub present: i64,
    pub late: i64,
    pub half_day: i64,
    pub work_from_home: i64,
    pub absent: i64,
    pub attendance_rate: f64,
    pub punctuality_rate: f64,
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// One employee's figures over `[from, to]`. Weekdays are working days, and
/// so is any weekend day with a record. Working days without an attended
/// record count as absent.
pub fn summarize_range<I>(from: NaiveDate, to: NaiveDate, records: I) -> AttendanceSummary
where
    I: IntoIterator<Item = (NaiveDate, AttendanceStatus)>,
{
    let weekdays = from
        .iter_days()
        .take_while(|day| *day <= to)
        .filter(|day| !is_weekend(*day))
        .count() as i64;
    let (mut recorded, mut weekend_records) = (0, 0);
    let (mut present, mut late, mut half_day, mut wfh) = (0, 0, 0, 0);
    for (date, status) in records {
        if date < from || date > to {
            continue;
        }
        recorded += 1;
        if is_weekend(date) {
            weekend_records += 1;
        }
        match status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Late => late += 1,
            AttendanceStatus::HalfDay => half_day += 1,
            AttendanceStatus::WorkFromHome => wfh += 1,
            AttendanceStatus::Absent => {}
        }
    }
    let working_days = weekdays + weekend_records;
    let attended = present + late + half_day + wfh;
    AttendanceSummary {
        working_days,
        recorded_days: recorded,
        present,
        late,
        half_day,
        work_from_home: wfh,
        absent: (working_days - attended).max(0),
        attendance_rate: percent(attended, working_days),
        punctuality_rate: percent(attended - late, attended),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn missing_check_in_is_absent() {
        let policy = AttendancePolicy::default();
        assert_eq!(derive_status(None, Some(t(18, 0)), &policy), AttendanceStatus::Absent);
    }

    #[test]
    fn late_threshold_is_exclusive() {
        let policy = AttendancePolicy::default();
        assert_eq!(derive_status(Some(t(9, 45)), None, &policy), AttendanceStatus::Present);
        assert_eq!(derive_status(Some(t(9, 46)), None, &policy), AttendanceStatus::Late);
    }

    #[test]
    fn short_days_are_half_or_absent() {
        let policy = AttendancePolicy::default();
        assert_eq!(
            derive_status(Some(t(9, 0)), Some(t(13, 29)), &policy),
            AttendanceStatus::HalfDay
        );
        assert_eq!(
            derive_status(Some(t(9, 0)), Some(t(13, 30)), &policy),
            AttendanceStatus::Present
        );
        assert_eq!(
            derive_status(Some(t(9, 0)), Some(t(10, 59)), &policy),
            AttendanceStatus::Absent
        );
        assert_eq!(
            derive_status(Some(t(9, 0)), Some(t(11, 0)), &policy),
            AttendanceStatus::HalfDay
        );
    }

    #[test]
    fn half_day_wins_over_late() {
        let policy = AttendancePolicy::default();
        assert_eq!(
            derive_status(Some(t(11, 0)), Some(t(14, 0)), &policy),
            AttendanceStatus::HalfDay
        );
        assert_eq!(
            derive_status(Some(t(11, 0)), Some(t(19, 0)), &policy),
            AttendanceStatus::Late
        );
    }

    #[test]
    fn worked_hours_never_negative() {
        assert_eq!(worked_hours(t(18, 0), t(9, 0)), 0.0);
        assert_eq!(worked_hours(t(9, 0), t(17, 45)), 8.75);
    }

    #[test]
    fn overview_counts_and_rates() {
        use AttendanceStatus::*;
        let stats = overview(10, vec![Present, Present, Late, HalfDay, WorkFromHome, Absent]);
        assert_eq!(stats.present_today, 5);
        assert_eq!(stats.absent_today, 5);
        assert_eq!(stats.late_today, 1);
        assert_eq!(stats.attendance_rate, 50.0);
        assert_eq!(stats.punctuality_rate, 80.0);
    }

    #[test]
    fn overview_of_empty_company() {
        let stats = overview(0, Vec::new());
        assert_eq!(stats.attendance_rate, 0.0);
        assert_eq!(stats.punctuality_rate, 0.0);
        assert_eq!(stats.absent_today, 0);
    }

    #[test]
    fn status_round_trips_storage_form() {
        assert_eq!(AttendanceStatus::parse("half_day"), Some(AttendanceStatus::HalfDay));
        assert_eq!(AttendanceStatus::WorkFromHome.as_str(), "work_from_home");
        assert_eq!(AttendanceStatus::parse("holiday"), None);
    }

    #[test]
    fn punch_corrections_keep_work_from_home() {
        let policy = AttendancePolicy::default();
        let (check_in, check_out) = (Some(t(11, 0)), Some(t(14, 0)));
        assert_eq!(
            status_after_punches(Some(AttendanceStatus::WorkFromHome), check_in, check_out, &policy),
            AttendanceStatus::WorkFromHome
        );
        assert_eq!(
            status_after_punches(Some(AttendanceStatus::Absent), check_in, check_out, &policy),
            AttendanceStatus::HalfDay
        );
        assert_eq!(status_after_punches(None, check_in, None, &policy), AttendanceStatus::Late);
    }

    #[test]
    fn withdrawn_work_from_home_falls_back_to_punches() {
        let policy = AttendancePolicy::default();
        assert_eq!(status_without_work_from_home(None, None, &policy), None);
        assert_eq!(
            status_without_work_from_home(Some(t(10, 30)), Some(t(19, 0)), &policy),
            Some(AttendanceStatus::Late)
        );
        assert_eq!(
            status_without_work_from_home(Some(t(9, 0)), None, &policy),
            Some(AttendanceStatus::Present)
        );
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn range_summary_counts_missing_weekdays_as_absent() {
        use AttendanceStatus::*;
        // Mon 2 June to Sun 8 June: five weekdays
        let records = vec![(d(2), Present), (d(3), Late), (d(4), WorkFromHome), (d(5), Absent)];
        let summary = summarize_range(d(2), d(8), records);
        assert_eq!(summary.working_days, 5);
        assert_eq!(summary.recorded_days, 4);
        assert_eq!(summary.absent, 2);
        assert_eq!(summary.attendance_rate, 60.0);
        assert_eq!(summary.punctuality_rate, 66.7);
    }

    #[test]
    fn weekend_work_adds_a_working_day() {
        use AttendanceStatus::*;
        let records = vec![(d(7), Present), (d(9), Present), (d(30), Present)];
        let summary = summarize_range(d(7), d(9), records);
        assert_eq!(summary.working_days, 2);
        assert_eq!(summary.recorded_days, 2);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.attendance_rate, 100.0);
    }

    #[test]
    fn empty_range_summary() {
        let summary = summarize_range(d(7), d(8), Vec::new());
        assert_eq!(summary.working_days, 0);
        assert_eq!(summary.attendance_rate, 0.0);
        assert_eq!(summary.absent, 0);
    }
}
