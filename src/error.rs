use thiserror::Error;

/// Errors caused by invalid input at the instrumentation boundary.
///
/// These are always rejected before any state is mutated: an operation that
/// returns an `InputError` has not been partially applied.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    /// A timer was created with an empty tag set.
    #[error("timers must have at least one tag")]
    EmptyTagSet,

    /// A tag was created with an empty name.
    #[error("tag names must not be empty")]
    EmptyTagName,

    /// A pre-computed timer value was negative or not a finite number.
    #[error("timer values must be finite and non-negative (got {value})")]
    InvalidValue {
        /// The offending value, in seconds.
        value: f64,
    },

    /// A timer handle did not refer to a live timer.
    #[error("no such timer")]
    UnknownTimer,

    /// A stop was requested for a timer that is already stopped.
    #[error("timer is already stopped")]
    AlreadyStopped,
}

/// Errors caused by a malformed collector address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The address was empty.
    #[error("collector address must not be empty")]
    Empty,

    /// A bracketed host was never closed, e.g. `[::1`.
    #[error("unterminated '[' in collector address")]
    UnterminatedBracket,

    /// A bracketed host was followed by something other than `:port`.
    #[error("unexpected trailing characters after ']' in collector address")]
    TrailingGarbage,

    /// The port part was present but not a valid port number.
    #[error("invalid port '{port}' in collector address")]
    InvalidPort {
        /// The part of the address that failed to parse as a port.
        port: String,
    },
}
