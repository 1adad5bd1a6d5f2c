// error.rs

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("radio error: {0}")]
    Radio(String),
    #[error("firmware error: {0}")]
    Firmware(String),
    #[error("{0}")]
    Message(String),
    #[cfg(target_os = "espidf")]
    #[error("ESP-IDF error: {0}")]
    Esp(#[from] esp_idf_sys::EspError),
}

pub type AppResult<T> = Result<T, AppError>;

// EOF
