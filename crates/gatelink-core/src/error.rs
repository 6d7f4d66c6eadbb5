use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid link configuration: {0}")]
    InvalidConfig(String),

    // Protocol errors
    #[error("Invalid acknowledgement byte: {0:?}")]
    InvalidAck(char),

    #[error("Invalid access status: {0}")]
    InvalidStatus(String),
}

pub type Result<T> = std::result::Result<T, Error>;
