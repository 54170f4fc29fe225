

pub type Result<T> = std::result::Result<T, Error>;
pub type PassiveResult = Result<()>;

pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;


/// The five error kinds the design distinguishes: malformed input and
/// configuration errors are both `Invalid` (the message says which); I/O
/// failure is `Io`; invariant violations are `Corrupt` and additionally
/// `debug_assert!` before being constructed, so a debug build aborts with a
/// backtrace while a release build still returns a catchable error; range
/// or overflow during predictor or scale encoding is `NotEncodable` and is
/// recovered locally by the codec registry, never surfacing to a caller.
#[derive(Debug)]
pub enum Error {
    NotSupported(String),
    Invalid(String),

    /// This error can also occur when reading invalid files,
    /// where the number of bytes to read does not match the input stream length.
    Io(IoError),

    /// An internal invariant was violated (allocator double-free, a split
    /// that would produce a negative surplus, cache map/list disagreement).
    Corrupt(String),

    /// A predictor's residual overflowed signed 32-bit range, or a scaled
    /// float value fell outside the representable integer range. Recovered
    /// locally: the caller tries another codec or stores the tile uncompressed.
    NotEncodable,
}


impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::NotSupported(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(false, "invariant violated: {}", message);
        Error::Corrupt(message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Invalid(message) => write!(formatter, "invalid data: {}", message),
            Error::NotSupported(message) => write!(formatter, "not supported: {}", message),
            Error::Io(io) => write!(formatter, "i/o error: {}", io),
            Error::Corrupt(message) => write!(formatter, "internal invariant violated: {}", message),
            Error::NotEncodable => write!(formatter, "value cannot be encoded by this codec"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(io) => Some(io),
            _ => None,
        }
    }
}


/// Enable using the `?` operator on io::Result
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        Error::Io(error)
    }
}

#[inline]
pub fn usize_to_i32(value: usize) -> Result<i32> {
    if value > i32::MAX as usize { Err(Error::invalid("value too large for a 32-bit field")) }
    else { Ok(value as i32) }
}
