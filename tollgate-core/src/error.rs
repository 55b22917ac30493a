//! Error kinds shared across the component kernel, the request pipeline,
//! and the network endpoint.
//!
//! [`Error`] enumerates the kinds from the error-handling design: config
//! validation, lifecycle misuse, routing/rate-limit/TLS/protocol failures.
//! Anything coming from a handler or a plugged-in component that doesn't
//! fit a named kind is carried as an opaque [`AnyError`].

/// A type alias for `anyhow::Error`, representing any error type.
///
/// Used at crate boundaries where the concrete source of failure is not
/// meaningful to the caller (handler panics, component-supplied errors).
pub type AnyError = anyhow::Error;

/// A type alias for `Result<T, E>` where `E` defaults to [`AnyError`].
pub type AnyResult<T, E = AnyError> = std::result::Result<T, E>;

/// The named error kinds of the system. Each propagates according to the
/// policy documented on the variant.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration failed to parse or a component rejected its config.
    /// Only raised at load/reload time; never after a successful swap.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A `PathMap::add` collided with an existing `(path, wildcard)` binding.
    #[error("path already bound: {0}")]
    AlreadyBound(String),

    /// A named lookup (component, application, host) found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A lifecycle method was called from a state that doesn't allow it
    /// (e.g. `start()` on a `running` component).
    #[error("illegal state transition: {0}")]
    IllegalState(String),

    /// HTTP framing or SNI parsing failed for a single connection.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The TLS handshake failed for a single connection.
    #[error("tls handshake failure: {0}")]
    HandshakeFailure(String),

    /// A request handler returned an error (as opposed to `NotHandled`).
    #[error("handler failure: {0}")]
    HandlerFailure(#[source] AnyError),

    /// A rate limiter denied a grant; surfaces to the client as 429.
    #[error("rate limited")]
    RateLimited,

    /// An in-flight wait was cancelled by the caller's context ending.
    #[error("cancelled")]
    Cancelled,

    /// A bounded wait (drain grace, request timeout) expired.
    #[error("timed out")]
    Timeout,

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Whether this error kind should end only the current connection,
    /// as opposed to aborting a whole reload or startup.
    pub fn is_connection_scoped(&self) -> bool {
        matches!(
            self,
            Error::ProtocolViolation(_)
                | Error::HandshakeFailure(_)
                | Error::IoError(_)
                | Error::HandlerFailure(_)
        )
    }
}

#[macro_export]
macro_rules! bail_into {
    ($msg:literal $(,)?) => {
        return Err(::anyhow::anyhow!($msg).into())
    };
    ($err:expr $(,)?) => {
        return Err(::anyhow::anyhow!($err).into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err(::anyhow::anyhow!($fmt, $($arg)*).into())
    };
}
