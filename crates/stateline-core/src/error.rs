use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid job type range: {from} is greater than {to}")]
    InvalidJobTypeRange { from: u32, to: u32 },

    #[error("Job vector exceeds maximum dimension of {max} (got {actual})")]
    DimensionTooLarge { max: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
