use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A templated deadline (month/day) does not exist in the target year,
    /// e.g. Feb 29 outside a leap year. Treated as a per-entity skip by the
    /// jobs, never a batch abort.
    #[error("Invalid calendar date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("Date arithmetic out of range: {0}")]
    OutOfRange(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
