//! # Return codes and errors
//!
//! Every command produces a [`ReturnCode`]. Positive variants carry extra
//! information about a non-error outcome (a conditional insert that found
//! the key already there, a range query with nothing in it); negative
//! variants are errors. [`Error`] is the subset commands actually construct
//! while they run; [`From<Error> for ReturnCode`] folds it into the single
//! outward-facing taxonomy.
use std::fmt;

/// Closed set of outcomes a command execution can produce.
///
/// Invariant violations (an `expires` entry without a matching `main`
/// entry, for example) are not part of this enum: those are fatal and the
/// process aborts, per the engine's error-handling design.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum ReturnCode {
    /// Success.
    Ok,
    /// Conditional insert found the key present.
    OkButAlreadyExist,
    /// Key (or element) absent.
    OkNotExist,
    /// Compact success carrying scalar 1.
    OkButCOne,
    /// Compact success carrying scalar 0.
    OkButCZero,
    /// Range query yielded no items.
    OkRangeHaveNone,
    /// Optimistic-concurrency conflict.
    ErrVersionError,
    /// Key exists but wrong type.
    ErrWrongTypeError,
    /// Size cap reached; partial work may have occurred.
    ErrDataLenLimited,
    /// Index outside valid range.
    ErrOutOfRange,
    /// Parse failure: not an integer.
    ErrIsNotInteger,
    /// Parse failure: not a double.
    ErrIsNotDouble,
    /// Parse failure: not a number.
    ErrIsNotNumber,
    /// Numeric result outside the target width.
    ErrIncDecrOverflow,
    /// Malformed command shape.
    ErrSyntaxError,
    /// `argc` mismatch.
    ErrWrongNumberArguments,
    /// A `DENY_OOM` command was refused.
    ErrReachMaxMemory,
    /// Allocator failure on a recoverable path.
    ErrMemoryAllocateError,
    /// DB index out of range.
    ErrNamespaceError,
}

impl ReturnCode {
    /// Negative codes are errors; everything else is a (possibly unusual)
    /// success.
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            ReturnCode::Ok
                | ReturnCode::OkButAlreadyExist
                | ReturnCode::OkNotExist
                | ReturnCode::OkButCOne
                | ReturnCode::OkButCZero
                | ReturnCode::OkRangeHaveNone
        )
    }
}

/// Errors a command can fail with. Every variant maps to exactly one
/// [`ReturnCode`] error member.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Error {
    /// Optimistic-concurrency conflict (stale `version_in`).
    VersionError,
    /// Key exists but holds a value of a different type.
    WrongType,
    /// A size cap was reached before all requested work completed.
    DataLenLimited,
    /// An index argument fell outside the valid range.
    OutOfRange,
    /// A value could not be parsed as an integer.
    NotAnInteger,
    /// A value could not be parsed as a double.
    NotADouble,
    /// A value could not be parsed as any kind of number.
    NotANumber,
    /// An increment/decrement pushed the result outside the target width.
    IncrDecrOverflow,
    /// The command's arguments were malformed.
    Syntax,
    /// The number of arguments did not match the command's arity.
    WrongNumberOfArguments,
    /// A `DENY_OOM` command was refused because the memory budget is full.
    ReachMaxMemory,
    /// A recoverable allocation failed.
    MemoryAllocate,
    /// The requested database index does not exist.
    NoSuchDatabase,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::VersionError => "stale version for this key",
            Error::WrongType => "operation against a key holding the wrong kind of value",
            Error::DataLenLimited => "size cap reached",
            Error::OutOfRange => "index out of range",
            Error::NotAnInteger => "value is not an integer or out of range",
            Error::NotADouble => "value is not a valid float",
            Error::NotANumber => "value is not a number",
            Error::IncrDecrOverflow => "increment or decrement would overflow",
            Error::Syntax => "syntax error",
            Error::WrongNumberOfArguments => "wrong number of arguments",
            Error::ReachMaxMemory => "command not allowed when used memory > 'maxmemory'",
            Error::MemoryAllocate => "out of memory allocating for this command",
            Error::NoSuchDatabase => "DB index is out of range",
        };
        f.write_str(msg)
    }
}

impl From<Error> for ReturnCode {
    fn from(err: Error) -> ReturnCode {
        match err {
            Error::VersionError => ReturnCode::ErrVersionError,
            Error::WrongType => ReturnCode::ErrWrongTypeError,
            Error::DataLenLimited => ReturnCode::ErrDataLenLimited,
            Error::OutOfRange => ReturnCode::ErrOutOfRange,
            Error::NotAnInteger => ReturnCode::ErrIsNotInteger,
            Error::NotADouble => ReturnCode::ErrIsNotDouble,
            Error::NotANumber => ReturnCode::ErrIsNotNumber,
            Error::IncrDecrOverflow => ReturnCode::ErrIncDecrOverflow,
            Error::Syntax => ReturnCode::ErrSyntaxError,
            Error::WrongNumberOfArguments => ReturnCode::ErrWrongNumberArguments,
            Error::ReachMaxMemory => ReturnCode::ErrReachMaxMemory,
            Error::MemoryAllocate => ReturnCode::ErrMemoryAllocateError,
            Error::NoSuchDatabase => ReturnCode::ErrNamespaceError,
        }
    }
}
