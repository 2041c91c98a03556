use std::panic::Location;

/// Error kinds that can occur in spacely-lib
#[derive(Debug)]
pub enum ErrorKind {
    AccountNotConnected,
    Decode(String),
    Empty(String),
    FromUtf8(std::string::FromUtf8Error),
    General(String),
    Indexer(String),
    Internal(String),
    InvalidAddress(String),
    InvalidAmount(String),
    InvalidEvent(String),
    InvalidMessage(String),
    InvalidUsername(String),
    Io(std::io::Error),
    JoinError(tokio::task::JoinError),
    Lmdb(heed::Error),
    NotInitialized(&'static str),
    Offline,
    ParseInt(std::num::ParseIntError),
    ReqwestHttpError(reqwest::Error),
    SerdeJson(serde_json::Error),
    ShuttingDown,
    Submission(TxFailure),
    TimeFormat(time::error::Format),
    UnknownCommand(String),
    UrlParse(url::ParseError),
    Usage(String, String), // error, usage line
    ViewRejected { status: u16, message: String },
    ViewStatus(reqwest::StatusCode),
    WalletNotConnected,
    WalletNotFound(String),
    WalletNotInstalled(String),
    Wallet(String),
}

/// Errors that can occur in spacely-lib, including the file and line number
/// where they were generated
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    location: &'static Location<'static>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.kind, self.location)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        match self {
            AccountNotConnected => write!(f, "No account is connected"),
            Decode(s) => write!(f, "View result decode error: {s}"),
            Empty(s) => write!(f, "{s} is empty"),
            FromUtf8(e) => write!(f, "UTF-8 error: {e}"),
            General(s) => write!(f, "{s}"),
            Indexer(s) => write!(f, "Indexer: {s}"),
            Internal(s) => write!(f, "INTERNAL: {s}"),
            InvalidAddress(s) => write!(f, "Invalid address: {s}"),
            InvalidAmount(s) => write!(f, "Invalid amount: {s}"),
            InvalidEvent(s) => write!(f, "Invalid event: {s}"),
            InvalidMessage(s) => write!(f, "Invalid message: {s}"),
            InvalidUsername(s) => write!(f, "Invalid username: {s}"),
            Io(e) => write!(f, "I/O Error: {e}"),
            JoinError(e) => write!(f, "Task join error: {e}"),
            Lmdb(e) => write!(f, "LMDB: {e}"),
            NotInitialized(s) => write!(f, "{s} used before initialization"),
            Offline => write!(f, "Offline"),
            ParseInt(e) => write!(f, "Bad integer: {e}"),
            ReqwestHttpError(e) => write!(f, "HTTP (reqwest) error: {e}"),
            SerdeJson(e) => write!(f, "SerdeJson Error: {e}"),
            ShuttingDown => write!(f, "Shutting down"),
            Submission(failure) => write!(f, "{}", failure.user_message()),
            TimeFormat(e) => write!(f, "Time format: {e}"),
            UnknownCommand(s) => write!(f, "Unknown command: {s}"),
            UrlParse(e) => write!(f, "URL parse: {e}"),
            Usage(e, u) => write!(f, "{}\n\nUsage: {}", e, u),
            ViewRejected { status, message } => {
                write!(f, "View function rejected ({status}): {message}")
            }
            ViewStatus(s) => write!(f, "View request failed: {s}"),
            WalletNotConnected => write!(f, "Please connect your wallet"),
            WalletNotFound(s) => write!(f, "No wallet named {s}"),
            WalletNotInstalled(s) => write!(f, "Wallet {s} is not installed"),
            Wallet(s) => write!(f, "Wallet: {s}"),
        }
    }
}

impl Error {
    /// Whether trying the same thing again later might succeed.
    ///
    /// Network trouble, timeouts, rate limiting and server errors are transient.
    /// A view function that aborted, a decode failure or a validation failure
    /// will fail again the same way.
    pub fn is_transient(&self) -> bool {
        match &self.kind {
            ErrorKind::ReqwestHttpError(e) => !e.is_builder() && !e.is_decode(),
            ErrorKind::Offline => true,
            ErrorKind::ViewStatus(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            ErrorKind::ViewRejected { status, .. } => *status >= 500 || *status == 429,
            ErrorKind::Indexer(_) => true,
            _ => false,
        }
    }
}

/// Why a submitted transaction failed, as far as we can tell from the
/// wallet's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxFailure {
    ProfileExists,
    Rejected,
    InsufficientFunds,
    NoHash,
    Other(String),
}

impl TxFailure {
    /// Wallets and nodes only hand us free-form text, so we look for the
    /// phrases they are known to use.
    pub fn classify(message: &str) -> TxFailure {
        let lower = message.to_lowercase();
        if message.contains("E_PROFILE_EXISTS") || lower.contains("already exists") {
            TxFailure::ProfileExists
        } else if lower.contains("rejected") {
            TxFailure::Rejected
        } else if lower.contains("insufficient") {
            TxFailure::InsufficientFunds
        } else {
            TxFailure::Other(message.to_owned())
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            TxFailure::ProfileExists => "Profile already exists for this wallet".to_owned(),
            TxFailure::Rejected => "Transaction was rejected".to_owned(),
            TxFailure::InsufficientFunds => "Insufficient funds for gas fees".to_owned(),
            TxFailure::NoHash => "Transaction failed - no hash returned".to_owned(),
            TxFailure::Other(s) if s.is_empty() => "Transaction failed".to_owned(),
            TxFailure::Other(s) => s.clone(),
        }
    }
}

// Note: we impl Into because our typical pattern is ErrorKind::Variant.into()
//       when we tried implementing From, the location was deep in rust code's
//       blanket into implementation, which wasn't the line number we wanted.
//
//       As for converting other error types, the ? operator uses From so it
//       is correct.
#[allow(clippy::from_over_into)]
impl Into<Error> for ErrorKind {
    #[track_caller]
    fn into(self) -> Error {
        Error {
            kind: self,
            location: Location::caller(),
        }
    }
}

impl From<String> for Error {
    #[track_caller]
    fn from(s: String) -> Error {
        Error {
            kind: ErrorKind::General(s),
            location: Location::caller(),
        }
    }
}

impl From<&str> for Error {
    #[track_caller]
    fn from(s: &str) -> Error {
        Error {
            kind: ErrorKind::General(s.to_string()),
            location: Location::caller(),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    #[track_caller]
    fn from(e: tokio::task::JoinError) -> Error {
        Error {
            kind: ErrorKind::JoinError(e),
            location: Location::caller(),
        }
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(e: std::io::Error) -> Error {
        Error {
            kind: ErrorKind::Io(e),
            location: Location::caller(),
        }
    }
}

impl From<heed::Error> for Error {
    #[track_caller]
    fn from(e: heed::Error) -> Error {
        Error {
            kind: ErrorKind::Lmdb(e),
            location: Location::caller(),
        }
    }
}

impl From<std::num::ParseIntError> for Error {
    #[track_caller]
    fn from(e: std::num::ParseIntError) -> Error {
        Error {
            kind: ErrorKind::ParseInt(e),
            location: Location::caller(),
        }
    }
}

impl From<reqwest::Error> for Error {
    #[track_caller]
    fn from(e: reqwest::Error) -> Error {
        Error {
            kind: ErrorKind::ReqwestHttpError(e),
            location: Location::caller(),
        }
    }
}

impl From<serde_json::Error> for Error {
    #[track_caller]
    fn from(e: serde_json::Error) -> Error {
        Error {
            kind: ErrorKind::SerdeJson(e),
            location: Location::caller(),
        }
    }
}

impl From<time::error::Format> for Error {
    #[track_caller]
    fn from(e: time::error::Format) -> Error {
        Error {
            kind: ErrorKind::TimeFormat(e),
            location: Location::caller(),
        }
    }
}

impl From<url::ParseError> for Error {
    #[track_caller]
    fn from(e: url::ParseError) -> Error {
        Error {
            kind: ErrorKind::UrlParse(e),
            location: Location::caller(),
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    #[track_caller]
    fn from(e: std::string::FromUtf8Error) -> Error {
        Error {
            kind: ErrorKind::FromUtf8(e),
            location: Location::caller(),
        }
    }
}
