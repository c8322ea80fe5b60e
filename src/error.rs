use crate::domain::DatasetError;

/// Application-level error carrying the process exit code.
///
/// Exit codes: 2 = bad input or configuration, 3 = not enough data to fit,
/// 4 = numerical or internal failure.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<DatasetError> for AppError {
    fn from(err: DatasetError) -> Self {
        let code = match err {
            DatasetError::Empty => 3,
            _ => 2,
        };
        AppError::new(code, format!("Invalid dataset: {err}"))
    }
}
