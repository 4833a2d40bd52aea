use serde::{Serialize, Serializer};

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(raw: &str) -> Option<Self> {
                match raw.trim() {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Comma-separated list of accepted values, for error messages.
            pub fn choices() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.as_str())
            }
        }
    };
}

string_enum!(Role {
    Student => "student",
    Teacher => "teacher",
});

string_enum!(ActivityStatus {
    Upcoming => "upcoming",
    Ongoing => "ongoing",
    Completed => "completed",
    Cancelled => "cancelled",
});

string_enum!(AttendanceStatus {
    Present => "present",
    Absent => "absent",
});

string_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

string_enum!(TargetAudience {
    All => "all",
    Students => "students",
    Specific => "specific",
});

/// Declared head-count limit of an activity. Advisory only: marking never
/// checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capacity {
    #[default]
    Unlimited,
    Limited(u32),
}

impl Capacity {
    pub fn from_column(v: Option<i64>) -> Self {
        match v {
            Some(n) if n > 0 => Capacity::Limited(n as u32),
            _ => Capacity::Unlimited,
        }
    }

    pub fn to_column(self) -> Option<i64> {
        match self {
            Capacity::Unlimited => None,
            Capacity::Limited(n) => Some(i64::from(n)),
        }
    }
}

impl Serialize for Capacity {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Capacity::Unlimited => s.serialize_none(),
            Capacity::Limited(n) => s.serialize_some(n),
        }
    }
}

/// Resolved caller identity, handed explicitly to every protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub year: Option<i64>,
    pub is_active: bool,
    pub created_at: String,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            role: self.role,
        }
    }
}

/// Creator summary embedded in list and detail responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub description: String,
    pub club_name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub max_capacity: Capacity,
    pub attendance_open: bool,
    pub attendance_open_time: Option<String>,
    pub attendance_close_time: Option<String>,
    pub status: ActivityStatus,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub activity_id: String,
    pub status: AttendanceStatus,
    pub marked_at: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub target_audience: TargetAudience,
    pub club_name: Option<String>,
    pub created_by: String,
    pub is_active: bool,
    pub expiry_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
