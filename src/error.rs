use thiserror::Error;

/// All errors that can occur while querying or relocating clusters
#[derive(Debug, Error)]
pub enum Error {
    #[error("Operating system error {code}: {}", os_message(.code))]
    Os { code: u32 },

    #[error("Decoded header field {field} is {value}, expected 0")]
    InvariantViolation { field: &'static str, value: i64 },

    #[error("Response truncated: need {needed} bytes at offset {offset}, only {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Bitmap size of {bits} bits cannot be represented")]
    BitmapTooLarge { bits: i64 },

    #[error("Failed to allocate a {bytes} byte scratch buffer")]
    ScratchAllocation { bytes: usize },

    #[error("Invalid volume name or path: '{0}'")]
    InvalidName(String),

    #[error("Session has already been released")]
    SessionReleased,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device control requests are not supported on this platform")]
    Unsupported,
}

impl Error {
    /// Platform error code, if this error came from the OS
    pub fn os_code(&self) -> Option<u32> {
        match self {
            Error::Os { code } => Some(*code),
            _ => None,
        }
    }
}

fn os_message(code: &u32) -> String {
    std::io::Error::from_raw_os_error(*code as i32).to_string()
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_code() {
        assert_eq!(Error::Os { code: 5 }.os_code(), Some(5));
        assert_eq!(Error::SessionReleased.os_code(), None);
    }

    #[test]
    fn test_invariant_message() {
        let err = Error::InvariantViolation {
            field: "starting LCN",
            value: 42,
        };
        assert_eq!(
            err.to_string(),
            "Decoded header field starting LCN is 42, expected 0"
        );
    }
}
