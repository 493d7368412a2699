use crate::link::LinkError;

/// Raised when a value does not satisfy an [`crate::encoding::Encoding`]'s structural
/// constraints, either on `validate` or inside `serialize`.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EncodingError {
    #[error("expected a numeric value")]
    NotANumber,
    #[error("value {0} is negative, an unsigned integer is expected")]
    NegativeValue(f64),
    #[error("value {0} is not an integral number")]
    NotIntegral(f64),
    #[error("value {value} does not fit in {width} byte(s)")]
    OutOfRange { value: f64, width: u8 },
    #[error("expected {expected} array elements, got {actual}")]
    ArrayLengthMismatch { expected: usize, actual: usize },
    #[error("expected a cycle timer value")]
    NotATimer,
    #[error("only 0 to 4 switching times are supported, got {0}")]
    TooManyCycles(usize),
    #[error("expected an operating status value")]
    NotOperatingStatus,
    #[error("operating status can only be written as OFF or ON")]
    InvalidOperatingStatusWrite,
    #[error("expected a system time value")]
    NotASystemTime,
}

/// Raised when bytes coming back from the device cannot be interpreted by an
/// [`crate::encoding::Encoding`]. Distinct from [`EncodingError`]: this always means the
/// *device*, not the caller, produced something out of spec.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodingError {
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("cycle timer terminator byte is not at an even index")]
    TimerTerminatorMisaligned,
    #[error("cycle timer has non-0xFF bytes after its terminator")]
    TimerTrailingData,
    #[error("cycle timer hour/minute out of the valid range")]
    TimerOutOfRange,
}

/// Raised when a [`crate::unit::Unit`] rejects an otherwise well-typed value.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UnitValidationError {
    #[error("value does not match this unit's expected shape")]
    TypeMismatch,
    #[error("expected a list of values")]
    NotAnArray,
    #[error("value {value} may not be smaller than {lower}")]
    BelowLowerBound { value: f64, lower: f64 },
    #[error("value {value} may not be bigger than {upper}")]
    AboveUpperBound { value: f64, upper: f64 },
    #[error("expected an integral number")]
    NotIntegral,
    #[error("cycle minute must be a multiple of 10")]
    MinuteNotAMultipleOfTen,
    #[error("cycle times must be between 00:00 and 24:00")]
    OutOfDayRange,
    #[error("cycle end time must be after its start time")]
    EndBeforeStart,
    #[error("cycle times must not overlap")]
    OverlappingCycles,
}

/// Top-level error returned by the storage/connection/cache layers to their callers.
///
/// See the variant docs for which operation(s) can raise each one.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown parameter \"{0}\"")]
    UnknownParameter(String),

    #[error("child index {index} out of range for \"{parent}\" (must be < {count})")]
    ChildIndexOutOfRange {
        parent: String,
        index: usize,
        count: usize,
    },

    #[error("\"{0}\" is read-only")]
    ReadOnlyViolation(String),

    /// Writing to a child parameter that would require a nonzero byte offset into its
    /// parent's base address. `resolve_child` always computes an absolute address for
    /// children, so this can currently only be raised by a storage implementation that
    /// deliberately keeps the offset form; see DESIGN.md.
    #[error("write to \"{0}\" requires a non-zero address offset, which is not supported")]
    UnalignedWrite(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Decoding(#[from] DecodingError),

    #[error(transparent)]
    UnitValidation(#[from] UnitValidationError),

    #[error("the device signalled resynchronization; the command was not completed")]
    ProtocolResync,

    #[error("the device rejected the write")]
    DeviceFailure,

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("the protocol runner has shut down")]
    RunnerShutDown,
}

/// Errors raised while registering parameters in a [`crate::parameter::ParameterStorage`].
///
/// Distinct from [`CoreError`]: registration happens once at startup, not per call, so
/// callers of `read_param`/`set_param` never see this type.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StorageError {
    #[error("parameter \"{0}\" is already registered")]
    DuplicateParameter(String),
}
