use {
    std::{fmt, io::Error as IoError, string::FromUtf8Error},
    thiserror::Error,
};

pub type CrateResult<T> = std::result::Result<T, CrateError>;

#[derive(Debug)]
pub struct CrateError {
    time: i64,
    inner: Err,
}

impl CrateError {
    pub fn categorize(&self) -> Category {
        self.inner.categorize()
    }

    /// True for errors the source process attributes to user input rather
    /// than an internal bug.
    pub fn is_user_attributable(&self) -> bool {
        matches!(
            self.categorize(),
            Category::UserArguments | Category::UserCommand | Category::UserExpression
        )
    }
}

impl fmt::Display for CrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for CrateError {}

impl<F> From<F> for CrateError
where
    F: Into<Err>,
{
    fn from(f: F) -> Self {
        Self {
            time: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            inner: f.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Err {
    /// a bucket's token set covers every possible delimiter byte.
    #[error("group arguments use all bytes")]
    UserArguments,
    /// spawning a pipeline stage's child failed.
    #[error("{program}: command not found or not executable ({source})")]
    UserCommand { program: String, source: IoError },
    /// the grouping callable raised on a token.
    #[error("grouping expression failed on {0:?}")]
    UserExpression(String),
    /// a delimiter is requested but the eligibility set is exhausted.
    #[error("no delimiter byte is available for this group")]
    NoDelimiter,
    /// `delimiter()` called with no key while in per-bucket mode.
    #[error("a group key is required to resolve a delimiter in per-bucket mode")]
    DelimiterNeedsKey,
    #[error("{source}")]
    Io {
        #[from]
        source: IoError,
    },
    #[error("invalid text encoding: {source}")]
    Utf8 {
        #[from]
        source: FromUtf8Error,
    },
}

impl Err {
    pub fn categorize(&self) -> Category {
        match self {
            Self::UserArguments | Self::NoDelimiter | Self::DelimiterNeedsKey => {
                Category::UserArguments
            }
            Self::UserCommand { .. } => Category::UserCommand,
            Self::UserExpression(_) => Category::UserExpression,
            Self::Io { .. } | Self::Utf8 { .. } => Category::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    UserArguments,
    UserCommand,
    UserExpression,
    Internal,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = match self {
            Self::UserArguments => "UserArguments",
            Self::UserCommand => "UserCommand",
            Self::UserExpression => "UserExpression",
            Self::Internal => "Internal",
        };
        write!(f, "{}", output)
    }
}

pub trait LogError {
    fn ref_log(&self, level: tracing::Level);

    fn log(self, level: tracing::Level) -> Self
    where
        Self: Sized,
    {
        (&self).ref_log(level);
        self
    }
}

impl<T> LogError for CrateResult<T> {
    fn ref_log(&self, level: tracing::Level) {
        match self {
            Ok(_) => (),
            Err(e) => e.ref_log(level),
        }
    }

    fn log(self, level: tracing::Level) -> Self
    where
        Self: Sized,
    {
        match self {
            ok @ Ok(_) => ok,
            Err(e) => Err(e.log(level)),
        }
    }
}

impl LogError for CrateError {
    fn ref_log(&self, level: tracing::Level) {
        match level {
            tracing::Level::ERROR => {
                error!(kind = %self.categorize(), time = self.time, message = %self.inner)
            }
            tracing::Level::WARN => {
                warn!(kind = %self.categorize(), time = self.time, message = %self.inner)
            }
            tracing::Level::INFO => {
                info!(kind = %self.categorize(), time = self.time, message = %self.inner)
            }
            tracing::Level::DEBUG => {
                debug!(kind = %self.categorize(), time = self.time, message = %self.inner)
            }
            tracing::Level::TRACE => {
                trace!(kind = %self.categorize(), time = self.time, message = %self.inner)
            }
        }
    }
}

use tracing::{debug, error, info, trace, warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_groups_delimiter_errors_under_user_arguments() {
        let e: CrateError = Err::NoDelimiter.into();
        assert_eq!(e.categorize(), Category::UserArguments);
        assert!(e.is_user_attributable());
    }

    #[test]
    fn io_errors_are_not_user_attributable() {
        let io = IoError::new(std::io::ErrorKind::Other, "boom");
        let e: CrateError = io.into();
        assert_eq!(e.categorize(), Category::Internal);
        assert!(!e.is_user_attributable());
    }
}
