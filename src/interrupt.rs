//! Ways the request pipeline stops early.

//! Every stage returns `Flow<T>`; an `Err` unwinds to
//! `FileRouter::handle`, which is the only place turning it into a
//! response (through `ErrorFlow`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Interrupt {
    #[error("not found: {0}")]
    NotFound(String),
    /// A middleware or content handler failed.
    #[error("middleware failure: {0}")]
    MiddlewareFailure(String),
    #[error("error status {code}")]
    Status { code: u16, message: Option<String> },
    #[error("redirect to {uri:?}")]
    Redirect { uri: String, permanent: bool },
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

pub type Flow<T> = Result<T, Interrupt>;

impl Interrupt {
    pub fn status(code: u16) -> Self {
        Interrupt::Status { code, message: None }
    }

    pub fn redirect(uri: impl Into<String>, permanent: bool) -> Self {
        Interrupt::Redirect { uri: uri.into(), permanent }
    }

    /// The HTTP status the response will carry.
    pub fn status_code(&self) -> u16 {
        match self {
            Interrupt::NotFound(_) => 404,
            Interrupt::MiddlewareFailure(_) => 500,
            Interrupt::Status { code, .. } =>
                if (400..=599).contains(code) { *code } else { 500 },
            Interrupt::Redirect { permanent, .. } =>
                if *permanent { 301 } else { 302 },
            Interrupt::Internal(_) => 500,
        }
    }

    /// A message meant for the visitor, if any. Only failures of
    /// the page's own handlers carry one; internal errors are kept
    /// to the log.
    pub fn message(&self) -> Option<&str> {
        match self {
            Interrupt::MiddlewareFailure(m) => Some(m),
            Interrupt::Status { message, .. } => message.as_deref(),
            _ => None
        }
    }
}
