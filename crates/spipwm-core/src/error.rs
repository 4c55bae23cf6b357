use thiserror::Error;

/// Transaction fields that do not fit the 16-bit serial frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidArgument {
    #[error("address 0x{0:X} does not fit in 7 bits (0-127)")]
    AddressOutOfRange(u32),
    #[error("data 0x{0:X} does not fit in 8 bits (0-255)")]
    DataOutOfRange(u32),
}

/// Failure of a single driver call.
///
/// `E` is the error type of the bus environment the driver was handed.
#[derive(Debug, Error)]
pub enum DriveError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
    #[error("bus access failed")]
    Bus(#[source] E),
}

impl<E> DriveError<E>
where
    E: std::error::Error + 'static,
{
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
