use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use crate::utils::auth::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Casual,
    Earned,
    Maternity,
    Paternity,
}

impl LeaveType {
    pub const ALL: [LeaveType; 5] = [
        LeaveType::Sick,
        LeaveType::Casual,
        LeaveType::Earned,
        LeaveType::Maternity,
        LeaveType::Paternity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveType::Sick => "sick",
            LeaveType::Casual => "casual",
            LeaveType::Earned => "earned",
            LeaveType::Maternity => "maternity",
            LeaveType::Paternity => "paternity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

/// Status shared by leave, regularization and WFH requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Pending and approved requests hold their dates against new requests.
    pub fn holds_dates(&self) -> bool {
        !matches!(self, RequestStatus::Rejected)
    }
}

/// A correction that moves a request back onto its dates must pass the
/// overlap check again.
pub fn reclaims_dates(from: RequestStatus, to: RequestStatus) -> bool {
    !from.holds_dates() && to.holds_dates()
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum LeaveError {
    #[error("end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("cannot move a request from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error("only hr or admin can decide a request")]
    DecisionRequiresStaff,
    #[error("only an admin can correct a decided request")]
    CorrectionRequiresAdmin,
    #[error("request spans {days} days, at most {max} are allowed")]
    SpanTooLong { days: i32, max: i32 },
}

/// Longest leave a single request may cover (26 weeks of maternity leave).
pub const MAX_LEAVE_DAYS: i32 = 182;
/// Longest work-from-home stretch a single request may cover.
pub const MAX_WFH_DAYS: i32 = 90;

/// Inclusive number of calendar days between `start` and `end`.
pub fn day_count(start: NaiveDate, end: NaiveDate) -> Result<i32, LeaveError> {
    if end < start {
        return Err(LeaveError::InvalidRange { start, end });
    }
    Ok((end - start).num_days() as i32 + 1)
}

/// [`day_count`], refusing requests longer than `max` days.
pub fn checked_span(start: NaiveDate, end: NaiveDate, max: i32) -> Result<i32, LeaveError> {
    let days = day_count(start, end)?;
    if days > max {
        return Err(LeaveError::SpanTooLong { days, max });
    }
    Ok(days)
}

/// Days of `[start, end]` that fall inside `[from, to]`, zero when disjoint.
pub fn days_within(start: NaiveDate, end: NaiveDate, from: NaiveDate, to: NaiveDate) -> i32 {
    let (start, end) = (start.max(from), end.min(to));
    if end < start {
        return 0;
    }
    (end - start).num_days() as i32 + 1
}

/// True when the range `[start, end]` intersects `[window_start, window_end]`:
/// it starts inside the window, ends inside it, or spans it.
pub fn overlaps(
    start: NaiveDate,
    end: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> bool {
    (start >= window_start && start <= window_end)
        || (end >= window_start && end <= window_end)
        || (start <= window_start && end >= window_end)
}

/// Appends the SQL form of [`overlaps`] over the `start_date`/`end_date`
/// columns, binding the window bounds.
pub fn push_overlap(
    query: &mut QueryBuilder<'_, Postgres>,
    window_start: NaiveDate,
    window_end: NaiveDate,
) {
    query
        .push("((start_date >= ")
        .push_bind(window_start)
        .push(" AND start_date <= ")
        .push_bind(window_end)
        .push(") OR (end_date >= ")
        .push_bind(window_start)
        .push(" AND end_date <= ")
        .push_bind(window_end)
        .push(") OR (start_date <= ")
        .push_bind(window_start)
        .push(" AND end_date >= ")
        .push_bind(window_end)
        .push("))");
}

/// Checks that `role` may move a request from `from` to `to`.
///
/// Pending requests are decided by hr or admin. Decided requests stay as
/// they are unless an admin corrects them.
pub fn check_transition(
    from: RequestStatus,
    to: RequestStatus,
    role: Role,
) -> Result<(), LeaveError> {
    if !role.is_staff() {
        return Err(LeaveError::DecisionRequiresStaff);
    }
    if from == to {
        return Err(LeaveError::InvalidTransition { from: from.as_str(), to: to.as_str() });
    }
    if from.is_terminal() && role != Role::Admin {
        return Err(LeaveError::CorrectionRequiresAdmin);
    }
    Ok(())
}

/// Approved leave days per type.
pub fn summarize<I>(approved: I) -> BTreeMap<LeaveType, i64>
where
    I: IntoIterator<Item = (LeaveType, i32)>,
{
    let mut totals: BTreeMap<LeaveType, i64> =
        LeaveType::ALL.into_iter().map(|t| (t, 0)).collect();
    for (leave_type, days) in approved {
        *totals.entry(leave_type).or_default() += i64::from(days);
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_count_is_inclusive() {
        assert_eq!(day_count(d(2025, 3, 10), d(2025, 3, 10)), Ok(1));
        assert_eq!(day_count(d(2025, 2, 27), d(2025, 3, 2)), Ok(4));
        assert_eq!(day_count(d(2024, 2, 27), d(2024, 3, 2)), Ok(5));
    }

    #[test]
    fn day_count_rejects_reversed_range() {
        assert_eq!(
            day_count(d(2025, 3, 11), d(2025, 3, 10)),
            Err(LeaveError::InvalidRange { start: d(2025, 3, 11), end: d(2025, 3, 10) })
        );
    }

    #[test]
    fn overlap_catches_each_clause() {
        let (ws, we) = (d(2025, 5, 10), d(2025, 5, 20));
        // starts inside
        assert!(overlaps(d(2025, 5, 15), d(2025, 5, 25), ws, we));
        // ends inside
        assert!(overlaps(d(2025, 5, 1), d(2025, 5, 12), ws, we));
        // spans
        assert!(overlaps(d(2025, 5, 1), d(2025, 5, 31), ws, we));
        // contained
        assert!(overlaps(d(2025, 5, 12), d(2025, 5, 13), ws, we));
    }

    #[test]
    fn overlap_boundaries_touching_count() {
        let (ws, we) = (d(2025, 5, 10), d(2025, 5, 20));
        assert!(overlaps(d(2025, 5, 1), d(2025, 5, 10), ws, we));
        assert!(overlaps(d(2025, 5, 20), d(2025, 5, 22), ws, we));
    }

    #[test]
    fn disjoint_ranges_do_not_overlap() {
        let (ws, we) = (d(2025, 5, 10), d(2025, 5, 20));
        assert!(!overlaps(d(2025, 5, 1), d(2025, 5, 9), ws, we));
        assert!(!overlaps(d(2025, 5, 21), d(2025, 6, 2), ws, we));
    }

    #[test]
    fn overlap_sql_mirrors_predicate() {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT * FROM leaves WHERE ");
        push_overlap(&mut query, d(2025, 5, 10), d(2025, 5, 20));
        assert_eq!(
            query.sql(),
            "SELECT * FROM leaves WHERE ((start_date >= $1 AND start_date <= $2) \
             OR (end_date >= $3 AND end_date <= $4) \
             OR (start_date <= $5 AND end_date >= $6))"
        );
    }

    #[test]
    fn staff_decide_pending_requests() {
        use RequestStatus::*;
        assert!(check_transition(Pending, Approved, Role::Hr).is_ok());
        assert!(check_transition(Pending, Rejected, Role::Admin).is_ok());
        assert_eq!(
            check_transition(Pending, Approved, Role::Employee),
            Err(LeaveError::DecisionRequiresStaff)
        );
        assert!(check_transition(Pending, Pending, Role::Admin).is_err());
    }

    #[test]
    fn decided_requests_need_admin_correction() {
        use RequestStatus::*;
        assert_eq!(
            check_transition(Approved, Rejected, Role::Hr),
            Err(LeaveError::CorrectionRequiresAdmin)
        );
        assert!(check_transition(Approved, Rejected, Role::Admin).is_ok());
        assert!(check_transition(Rejected, Pending, Role::Admin).is_ok());
        assert!(check_transition(Approved, Approved, Role::Admin).is_err());
    }

    #[test]
    fn summary_lists_every_type() {
        let totals = summarize(vec![
            (LeaveType::Sick, 2),
            (LeaveType::Sick, 3),
            (LeaveType::Earned, 5),
        ]);
        assert_eq!(totals[&LeaveType::Sick], 5);
        assert_eq!(totals[&LeaveType::Earned], 5);
        assert_eq!(totals[&LeaveType::Casual], 0);
        assert_eq!(totals.len(), 5);
    }

    #[test]
    fn long_requests_are_refused() {
        assert_eq!(checked_span(d(2025, 1, 1), d(2025, 3, 31), MAX_WFH_DAYS), Ok(90));
        assert_eq!(
            checked_span(d(2025, 1, 1), d(2025, 4, 1), MAX_WFH_DAYS),
            Err(LeaveError::SpanTooLong { days: 91, max: 90 })
        );
        assert_eq!(
            checked_span(d(2025, 1, 1), d(9999, 12, 31), MAX_LEAVE_DAYS),
            Err(LeaveError::SpanTooLong { days: 2_912_808, max: 182 })
        );
        assert!(matches!(
            checked_span(d(2025, 1, 2), d(2025, 1, 1), MAX_LEAVE_DAYS),
            Err(LeaveError::InvalidRange { .. })
        ));
    }

    #[test]
    fn leave_across_new_year_splits_between_years() {
        let (start, end) = (d(2025, 12, 29), d(2026, 1, 3));
        assert_eq!(days_within(start, end, d(2025, 1, 1), d(2025, 12, 31)), 3);
        assert_eq!(days_within(start, end, d(2026, 1, 1), d(2026, 12, 31)), 3);
        assert_eq!(days_within(start, end, d(2027, 1, 1), d(2027, 12, 31)), 0);
        assert_eq!(days_within(d(2025, 3, 3), d(2025, 3, 7), d(2025, 1, 1), d(2025, 12, 31)), 5);
    }

    #[test]
    fn only_corrections_out_of_rejected_recheck_overlap() {
        use RequestStatus::*;
        assert!(reclaims_dates(Rejected, Approved));
        assert!(reclaims_dates(Rejected, Pending));
        assert!(!reclaims_dates(Pending, Approved));
        assert!(!reclaims_dates(Approved, Rejected));
        assert!(!reclaims_dates(Approved, Pending));
    }
}
