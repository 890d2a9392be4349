//! Error types used by the eventvisor runtime, its consumers and the broker.
//!
//! This module defines one enum per concern:
//!
//! - [`RuntimeError`]: errors raised by the consumer server itself.
//! - [`SubscriptionError`]: terminal failures reported by a subscription transport.
//! - [`HandlerError`]: failures reported by user handlers (logged, never escalated).
//! - [`IdError`]: distributed ID generation failures.
//! - [`BrokerError`]: fan-out broker failures.
//! - [`ConfigError`]: configuration loading failures.
//!
//! It also carries [`ErrorKind`], the small closed taxonomy the surrounding
//! HTTP/RPC layers map to status codes. The dispatch core never produces it
//! itself; handlers may use it to classify their own failures.
//!
//! Every error provides `as_label` (stable snake_case) for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the consumer server.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `serve` was called twice, or a consumer was added after serving started.
    #[error("server already started")]
    AlreadyStarted,

    /// Drain did not finish within the configured grace period.
    #[error("shutdown timeout {grace:?} exceeded; stuck consumers: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Consumers whose drain did not complete in time.
        stuck: Vec<String>,
    },

    /// A consumer task died outside its handlers; its drain did not run.
    #[error("consumers panicked: {consumers:?}")]
    ConsumerPanicked {
        /// Names of the consumers that died.
        consumers: Vec<String>,
    },

    /// OS signal listeners could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::AlreadyStarted.as_label(), "runtime_already_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::ConsumerPanicked { .. } => "runtime_consumer_panicked",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Terminal failure of a subscription's receive operation.
///
/// Any error returned from [`Subscription::receive`](crate::consumer::Subscription::receive)
/// means the transport will not yield further messages. The dispatcher never retries.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscription was shut down or its source closed.
    #[error("subscription closed")]
    Closed,

    /// Transport-specific failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl SubscriptionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscriptionError::Closed => "subscription_closed",
            SubscriptionError::Transport(_) => "subscription_transport",
        }
    }
}

/// # Failure reported by a message handler.
///
/// Handler results are only logged and published on the lifecycle bus; they
/// never stop the dispatcher.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler failed while processing the message.
    #[error("{kind}: {message}")]
    Failed {
        /// Classification of the failure.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// Handler observed cancellation and stopped early.
    #[error("handler cancelled")]
    Canceled,
}

impl HandlerError {
    /// Shorthand for a classified failure.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        HandlerError::Failed {
            kind,
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Failed { kind, .. } => kind.as_label(),
            HandlerError::Canceled => "handler_canceled",
        }
    }
}

/// # Distributed ID generation failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The generator's 39-bit time budget is exhausted.
    #[error("id generator time overflow")]
    TimeOverflow,

    /// The configured start time lies in the future.
    #[error("id generator start time is ahead of the clock")]
    StartInFuture,

    /// The generator produced the reserved broadcast value `0`.
    #[error("id generator produced the reserved zero id")]
    Zero,
}

impl IdError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            IdError::TimeOverflow => "id_time_overflow",
            IdError::StartInFuture => "id_start_in_future",
            IdError::Zero => "id_zero",
        }
    }
}

/// # Fan-out broker failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BrokerError {
    /// A subscriber ID could not be generated.
    #[error("cannot assign subscriber id: {0}")]
    Id(#[from] IdError),

    /// Writing to a stream client failed.
    #[error("stream write failed: {0}")]
    Io(#[from] std::io::Error),

    /// An event could not be encoded for the wire.
    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::Id(_) => "broker_id",
            BrokerError::Io(_) => "broker_io",
            BrokerError::Encode(_) => "broker_encode",
        }
    }
}

/// # Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file or environment could not be parsed into [`Config`](crate::Config).
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Invalid(Box::new(e))
    }
}

/// Closed taxonomy of application-level failures.
///
/// Surrounding HTTP/RPC layers map these to transport status codes; see
/// [`ErrorKind::http_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Entity was not found.
    NotFound,
    /// A request field is missing.
    RequiredField,
    /// A request field has an invalid format.
    InvalidField,
    /// A request field is out of range.
    OutOfRange,
    /// No parameters were supplied.
    EmptyBody,
    /// Entity already exists.
    AlreadyExists,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::RequiredField => "required_field",
            ErrorKind::InvalidField => "invalid_field",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::EmptyBody => "empty_body",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP status code for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::RequiredField
            | ErrorKind::InvalidField
            | ErrorKind::OutOfRange
            | ErrorKind::EmptyBody => 400,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ErrorKind::NotFound => "resource not found",
            ErrorKind::RequiredField => "missing required request field",
            ErrorKind::InvalidField => "request field has an invalid format",
            ErrorKind::OutOfRange => "request field is out of range",
            ErrorKind::EmptyBody => "no parameters found",
            ErrorKind::AlreadyExists => "resource already exists",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(text)
    }
}
