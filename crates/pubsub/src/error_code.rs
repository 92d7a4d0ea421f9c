use std::fmt::{Display, Formatter, Result as FmtResult};

/// Broker-independent classification of driver errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorCode {
    /// Not an error.
    Ok,

    /// The operation was cancelled by the caller.
    Canceled,

    /// The destination or subscription does not exist.
    NotFound,

    /// The system is not in a state required for the operation.
    FailedPrecondition,

    /// The caller is not allowed to perform the operation.
    PermissionDenied,

    /// A quota or limit was exceeded.
    ResourceExhausted,

    /// The operation did not finish before its deadline.
    DeadlineExceeded,

    /// Any error that does not fit another code.
    Unknown,
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Ok => "OK",
            Self::Canceled => "Canceled",
            Self::NotFound => "NotFound",
            Self::FailedPrecondition => "FailedPrecondition",
            Self::PermissionDenied => "PermissionDenied",
            Self::ResourceExhausted => "ResourceExhausted",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::Unknown => "Unknown",
        };

        f.write_str(name)
    }
}
