use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Yesterday,
    /// Monday of the current week through today.
    Week,
    /// First of the current month through today.
    #[default]
    Month,
    LastMonth,
}

impl Period {
    /// Inclusive date range covered by the period, as seen on `today`.
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Today => (today, today),
            Period::Yesterday => {
                let yesterday = today - Duration::days(1);
                (yesterday, yesterday)
            }
            Period::Week => {
                let since_monday = i64::from(today.weekday().num_days_from_monday());
                (today - Duration::days(since_monday), today)
            }
            Period::Month => (today.with_day(1).unwrap_or(today), today),
            Period::LastMonth => {
                let first_of_month = today.with_day(1).unwrap_or(today);
                let last_of_previous = first_of_month - Duration::days(1);
                (last_of_previous.with_day(1).unwrap_or(last_of_previous), last_of_previous)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    InProgress,
    Blocked,
}

/// One line of a daily report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 0.0, max = 24.0))]
    pub hours: f64,
    pub status: TaskStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReportStatistics {
    pub total_employees: i64,
    pub employees_with_tasks: i64,
    pub task_reporting_rate: f64,
    pub total_reports: i64,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub blocked_tasks: i64,
    pub completion_rate: f64,
    pub total_hours: f64,
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}

/// Aggregates the reports filed by `total_employees` active employees.
pub fn overview<'a, I>(total_employees: i64, reports: I) -> TaskReportStatistics
where
    I: IntoIterator<Item = (Uuid, &'a [TaskItem])>,
{
    let mut reporters = HashSet::new();
    let (mut total_reports, mut total_tasks, mut completed, mut blocked) = (0, 0, 0, 0);
    let mut total_hours = 0.0;
    for (employee_id, tasks) in reports {
        reporters.insert(employee_id);
        total_reports += 1;
        for task in tasks {
            total_tasks += 1;
            total_hours += task.hours;
            match task.status {
                TaskStatus::Completed => completed += 1,
                TaskStatus::Blocked => blocked += 1,
                TaskStatus::InProgress => {}
            }
        }
    }
    let employees_with_tasks = reporters.len() as i64;
    TaskReportStatistics {
        total_employees,
        employees_with_tasks,
        task_reporting_rate: percent(employees_with_tasks, total_employees),
        total_reports,
        total_tasks,
        completed_tasks: completed,
        blocked_tasks: blocked,
        completion_rate: percent(completed, total_tasks),
        total_hours: (total_hours * 100.0).round() / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn task(hours: f64, status: TaskStatus) -> TaskItem {
        TaskItem { title: "payroll run".to_string(), hours, status }
    }

    #[test]
    fn periods_end_today() {
        // a Thursday
        let today = d(2025, 3, 13);
        assert_eq!(Period::Today.range(today), (today, today));
        assert_eq!(Period::Yesterday.range(today), (d(2025, 3, 12), d(2025, 3, 12)));
        assert_eq!(Period::Week.range(today), (d(2025, 3, 10), today));
        assert_eq!(Period::Month.range(today), (d(2025, 3, 1), today));
    }

    #[test]
    fn last_month_wraps_the_year() {
        assert_eq!(Period::LastMonth.range(d(2025, 1, 15)), (d(2024, 12, 1), d(2024, 12, 31)));
        assert_eq!(Period::LastMonth.range(d(2024, 3, 1)), (d(2024, 2, 1), d(2024, 2, 29)));
    }

    #[test]
    fn overview_counts_reporters_once() {
        let (asha, ravi) = (Uuid::new_v4(), Uuid::new_v4());
        let monday = vec![task(5.0, TaskStatus::Completed), task(3.0, TaskStatus::InProgress)];
        let tuesday = vec![task(8.0, TaskStatus::Completed)];
        let blocked = vec![task(1.5, TaskStatus::Blocked)];
        let stats = overview(
            4,
            vec![(asha, monday.as_slice()), (asha, tuesday.as_slice()), (ravi, blocked.as_slice())],
        );
        assert_eq!(stats.employees_with_tasks, 2);
        assert_eq!(stats.task_reporting_rate, 50.0);
        assert_eq!(stats.total_reports, 3);
        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.completion_rate, 50.0);
        assert_eq!(stats.blocked_tasks, 1);
        assert_eq!(stats.total_hours, 17.5);
    }

    #[test]
    fn overview_without_reports() {
        let stats = overview(0, Vec::new());
        assert_eq!(stats.task_reporting_rate, 0.0);
        assert_eq!(stats.completion_rate, 0.0);
    }

    #[test]
    fn task_hours_are_bounded() {
        assert!(task(25.0, TaskStatus::Completed).validate().is_err());
        assert!(task(7.5, TaskStatus::InProgress).validate().is_ok());
    }
}
