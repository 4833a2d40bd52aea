use thiserror::Error;

/// Reasons a request is rejected as conflicting with stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    DuplicateUser,
    DuplicateRecord,
    GateClosed,
}

impl ConflictKind {
    pub fn code(self) -> &'static str {
        match self {
            ConflictKind::DuplicateUser => "duplicate_user",
            ConflictKind::DuplicateRecord => "duplicate_record",
            ConflictKind::GateClosed => "gate_closed",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict { kind: ConflictKind, message: String },
    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Error::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Error::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn conflict(kind: ConflictKind, message: impl Into<String>) -> Self {
        Error::Conflict {
            kind,
            message: message.into(),
        }
    }

    pub fn gate_closed() -> Self {
        Self::conflict(
            ConflictKind::GateClosed,
            "Attendance is not open for this activity",
        )
    }

    pub fn duplicate_record() -> Self {
        Self::conflict(
            ConflictKind::DuplicateRecord,
            "Attendance already marked for this activity",
        )
    }

    pub fn status(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Conflict { .. } => 400,
            Error::Unauthenticated(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_failed",
            Error::Unauthenticated(_) => "unauthenticated",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::Conflict { kind, .. } => kind.code(),
            Error::Internal(_) => "internal",
        }
    }

    pub fn is_conflict(&self, kind: ConflictKind) -> bool {
        matches!(self, Error::Conflict { kind: k, .. } if *k == kind)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Internal(e.to_string())
    }
}
