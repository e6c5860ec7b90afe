//! Error codes
//!
//! Fallible bootloader functions return [`Result`] with an [`ErrorCode`]. At the
//! boundary with code that still speaks in plain integers the result is flattened
//! into a signed value: `0` on success, the negated code on failure (`-10001`
//! means [`ErrorCode::InvalidState`]).
//!
//! Codes are grouped into families by magnitude so that independent subsystems
//! can claim their own range.

use core::fmt;

use defmt::Format;

use crate::checksum;

/// Return value meaning success
pub const OK: i16 = 0;

/// First code of the state family
pub const STATE_BASE: i16 = 10000;
/// First code of the image family
pub const IMAGE_BASE: i16 = 20000;

/// Positive error code
#[repr(i16)]
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Format)]
pub enum ErrorCode {
    /// Operation is not allowed in the current state
    InvalidState = STATE_BASE + 1,
    /// Application descriptor is blank or its checksum does not match
    DescriptorCorrupted = IMAGE_BASE + 1,
    /// Output buffer cannot hold the data
    BufferTooShort = IMAGE_BASE + 2,
    /// Image does not fit in the application region
    ImageTooLarge = IMAGE_BASE + 3,
    /// Image checksum does not match the descriptor
    ImageCorrupted = IMAGE_BASE + 4,
    /// Image storage could not be read
    ImageReadFailed = IMAGE_BASE + 5,
}

pub type Result<T = ()> = core::result::Result<T, ErrorCode>;

impl ErrorCode {
    const ALL: [ErrorCode; 6] = [
        Self::InvalidState,
        Self::DescriptorCorrupted,
        Self::BufferTooShort,
        Self::ImageTooLarge,
        Self::ImageCorrupted,
        Self::ImageReadFailed,
    ];

    /// Positive code value
    #[inline]
    pub const fn code(self) -> i16 {
        self as i16
    }

    /// Negated code, as returned from integer-returning functions
    #[inline]
    pub const fn retval(self) -> i16 {
        -(self as i16)
    }

    /// Look up a positive code
    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        use ErrorCode::*;
        match *self {
            InvalidState => "Invalid state",
            DescriptorCorrupted => "Application descriptor corrupted",
            BufferTooShort => "Buffer too short",
            ImageTooLarge => "Image too large",
            ImageCorrupted => "Image corrupted",
            ImageReadFailed => "Image read failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl From<checksum::Error> for ErrorCode {
    fn from(e: checksum::Error) -> Self {
        match e {
            checksum::Error::ChecksumInvalid => Self::DescriptorCorrupted,
            checksum::Error::BufTooShort => Self::BufferTooShort,
        }
    }
}

/// Flatten a result into a return value: `0` or the negated error code
#[inline]
pub fn into_retval(result: Result) -> i16 {
    match result {
        Ok(()) => OK,
        Err(e) => e.retval(),
    }
}

/// Interpret a return value
///
/// Returns `None` for values that do not follow the convention: positive values
/// and negated codes that are not defined.
pub fn from_retval(retval: i16) -> Option<Result> {
    match retval {
        OK => Some(Ok(())),
        r if r < 0 => r.checked_neg()
            .and_then(ErrorCode::from_code)
            .map(Err),
        _ => None,
    }
}
