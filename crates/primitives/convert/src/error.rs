#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Value {value} is out of range for {target}")]
    ValueOutOfRange { value: String, target: &'static str },
    #[error("Hex string is missing the 0x prefix")]
    MissingPrefix,
    #[error("Hex quantity is empty")]
    EmptyQuantity,
    #[error("Hex quantity has leading zeros")]
    LeadingZeros,
    #[error("Hex quantity must be lower-case")]
    NotLowerCase,
    #[error("Invalid hex digit {0:?}")]
    InvalidHexDigit(char),
    #[error("Hex data has an odd number of digits")]
    OddLength,
    #[error("Expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl CodecError {
    pub fn out_of_range(value: impl std::fmt::Display, target: &'static str) -> Self {
        Self::ValueOutOfRange { value: value.to_string(), target }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
