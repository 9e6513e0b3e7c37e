pub type AppResult<T> = Result<T, AppError>;

/// Exit code for address resolution failures and startup/usage errors.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code when every resolved candidate refused the connection.
pub const EXIT_CONNECT_FAILED: u8 = 2;
/// Exit code when the encoded posting could not be transmitted.
pub const EXIT_SEND_FAILED: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// general errors
    #[error("illegal state: {0}")]
    IllegalStateError(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),

    /// connection lifecycle errors
    #[error("getaddrinfo: {0}")]
    Resolution(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to bind: {0}")]
    Bind(String),

    #[error("listen: {0}")]
    Listen(String),

    #[error("accept: {0}")]
    Accept(String),

    #[error("couldn't send data: {0}")]
    Send(String),

    #[error("failed to dispatch connection: {0}")]
    Dispatch(String),
}

impl AppError {
    /// Process exit code reported by the binaries for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Connect(_) => EXIT_CONNECT_FAILED,
            AppError::Send(_) => EXIT_SEND_FAILED,
            _ => EXIT_FAILURE,
        }
    }
}
