//! Attendance arithmetic. Everything here is recomputed per request from
//! ledger counts; nothing is stored.

use serde::{Serialize, Serializer};

/// Attended share of a denominator, rounded to two decimals.
///
/// Serialized the way clients already consume it: a fixed two-decimal string
/// such as `"30.00"`, or the bare number `0` when there is nothing to divide by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    Undefined,
    Value(f64),
}

impl Percentage {
    pub fn of(attended: u64, total: u64) -> Self {
        if total == 0 {
            return Percentage::Undefined;
        }
        let raw = attended as f64 / total as f64 * 100.0;
        Percentage::Value(round_off_2_decimal(raw))
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Percentage::Undefined => 0.0,
            Percentage::Value(v) => v,
        }
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Percentage::Undefined => s.serialize_u8(0),
            Percentage::Value(v) => s.serialize_str(&format!("{:.2}", v)),
        }
    }
}

/// Half-up rounding to two decimals.
pub fn round_off_2_decimal(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Self view / per-student view of one student's attendance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub total_activities: u64,
    pub attended_activities: u64,
    pub attendance_percentage: Percentage,
}

impl StudentStats {
    pub fn new(total_activities: u64, attended_activities: u64) -> Self {
        Self {
            total_activities,
            attended_activities,
            attendance_percentage: Percentage::of(attended_activities, total_activities),
        }
    }
}

/// Per-activity counts. Only what the ledger holds is reported; absent rows
/// are never synthesized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityStats {
    pub total: u64,
    pub present: u64,
    pub absent: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_students: u64,
    pub total_activities: u64,
    pub total_attendance_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_denominator_is_plain_zero() {
        assert_eq!(Percentage::of(0, 0), Percentage::Undefined);
        assert_eq!(serde_json::to_value(Percentage::of(0, 0)).unwrap(), json!(0));
        assert_eq!(Percentage::of(5, 0).as_f64(), 0.0);
    }

    #[test]
    fn bounds_of_attendance() {
        assert_eq!(serde_json::to_value(Percentage::of(0, 7)).unwrap(), json!("0.00"));
        assert_eq!(serde_json::to_value(Percentage::of(7, 7)).unwrap(), json!("100.00"));
    }

    #[test]
    fn three_of_ten_is_thirty() {
        let stats = StudentStats::new(10, 3);
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            json!({
                "totalActivities": 10,
                "attendedActivities": 3,
                "attendancePercentage": "30.00"
            })
        );
    }

    #[test]
    fn thirds_round_to_two_places() {
        assert_eq!(Percentage::of(1, 3).as_f64(), 33.33);
        assert_eq!(Percentage::of(2, 3).as_f64(), 66.67);
    }
}
