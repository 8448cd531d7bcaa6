//! Error handling primitives shared across the toolbox.
//!
//! Errors come in two tiers. Recoverable errors leave the session untouched
//! and surface as a sentinel on the C boundary; fatal errors are reported
//! through the message sink and then terminate the process.

use std::sync::Once;

use crate::common::log::Messenger;

/// Stable error codes that cross the FFI boundary.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BftCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// Parameter name not present in the lookup table.
    UnknownParameter = 1,
    /// Line index past the current line count.
    LineOutOfRange = 2,
    /// Mandatory pointer argument was null.
    NullPointer = 3,
    /// Input failed validation.
    InvalidInput = 4,
    /// Fractional-delay resampling requested without a filter bank.
    MissingFilterBank = 5,
    /// Buffer could not be allocated or released.
    Allocation = 6,
}

/// Canonical error type for the toolbox.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BftError {
    /// Parameter name not in the lookup table. The only recoverable error.
    #[error("could not find parameter {0:?}")]
    UnknownParameter(String),

    /// Line index past the configured line count.
    #[error("line {index} out of range, {count} lines configured")]
    LineOutOfRange { index: usize, count: usize },

    /// Mandatory pointer argument was null.
    #[error("{0} is a null pointer")]
    NullPointer(&'static str),

    /// Buffer length does not match the declared dimensions.
    #[error("{what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Element count differs from the transducer or the stored line.
    #[error("transducer has {expected} elements, got {actual}")]
    ElementCountMismatch { expected: usize, actual: usize },

    /// Any other validation failure.
    #[error("{0}")]
    InvalidInput(String),

    /// Coefficient count is not `banks * taps`, or either is zero.
    #[error("filter bank of {banks} x {taps} taps does not match {len} coefficients")]
    InvalidFilterBank { banks: usize, taps: usize, len: usize },

    /// Filter-bank resampling requested before a bank was attached.
    #[error("set filter bank first")]
    MissingFilterBank,

    /// Pixel focusing used while more than one line is configured.
    #[error("{lines} lines configured with pixel focusing, only a single pixel line is supported")]
    PixelModeConflict { lines: usize },

    /// Pointer handed back was never exported by the toolbox.
    #[error("pointer was not allocated by the toolbox")]
    UnknownBuffer,

    /// Output buffer could not be reserved.
    #[error("could not allocate {0}")]
    Allocation(&'static str),
}

/// Result alias used throughout the crate.
pub type BftResult<T> = Result<T, BftError>;

impl BftError {
    /// Shorthand for [`BftError::InvalidInput`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Shorthand for [`BftError::ShapeMismatch`].
    pub fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Machine parsable code for the C boundary.
    pub fn code(&self) -> BftCode {
        match self {
            BftError::UnknownParameter(_) => BftCode::UnknownParameter,
            BftError::LineOutOfRange { .. } => BftCode::LineOutOfRange,
            BftError::NullPointer(_) => BftCode::NullPointer,
            BftError::ShapeMismatch { .. }
            | BftError::ElementCountMismatch { .. }
            | BftError::InvalidInput(_)
            | BftError::InvalidFilterBank { .. }
            | BftError::PixelModeConflict { .. } => BftCode::InvalidInput,
            BftError::MissingFilterBank => BftCode::MissingFilterBank,
            BftError::UnknownBuffer | BftError::Allocation(_) => BftCode::Allocation,
        }
    }

    /// Only an unknown parameter name is recoverable on the C boundary.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BftError::UnknownParameter(_))
    }
}

const FAULT_BANNER: [&str; 9] = [
    "\t***********************************************************\n",
    "\t*                                                         *\n",
    "\t* Beamforming Toolbox message :                           *\n",
    "\t*                                                         *\n",
    "\t* Fatal fault caught                                      *\n",
    "\t* One of the probable causes is bad memory pointer        *\n",
    "\t* Check if you have supplied wrong transducer definition  *\n",
    "\t*                                                         *\n",
    "\t***********************************************************\n",
];

static FAULT_OBSERVER: Once = Once::new();

/// Install the process-wide fault observer.
///
/// The hook prints the diagnostic banner and hands over to the previously
/// installed hook. It never recovers: with `panic = "abort"` the process
/// still terminates.
///
/// The banner goes straight to standard output, not through the
/// [`Messenger`]: the hook is process-wide and outlives any one session's
/// sink.
pub fn install_fault_observer() {
    FAULT_OBSERVER.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            for line in FAULT_BANNER {
                print!("{line}");
            }
            previous(info);
        }));
    });
}

/// Report a fatal error and terminate.
pub fn fatal(messenger: &Messenger, func: &str, err: &BftError) -> ! {
    tracing::error!(func, code = err.code() as u32, error = %err, "fatal toolbox error");
    messenger.diag(func, &err.to_string());
    panic!("{func}: {err}");
}
