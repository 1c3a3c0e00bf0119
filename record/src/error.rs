use std::{error::Error, fmt, io};

use safetensors::SafeTensorError;

use crate::DType;

/// The record module's result type.
pub type Result<T> = std::result::Result<T, RecordErr>;

/// Failures while building, reshaping or persisting records.
#[derive(Debug)]
pub enum RecordErr {
    MissingKey(String),
    BatchMismatch {
        key: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    DtypeMismatch {
        key: String,
        got: DType,
        expected: DType,
    },
    ShapeMismatch {
        key: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    KeysMismatch {
        got: Vec<String>,
        expected: Vec<String>,
    },
    /// Records with different batch sizes were stacked.
    StackBatchMismatch {
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    EmptyStack,
    InvalidSpec(String),
    Shape(ndarray::ShapeError),
    Io(io::Error),
    Safetensors(SafeTensorError),
    Metadata(String),
}

impl fmt::Display for RecordErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordErr::MissingKey(key) => write!(f, "key {key:?} not found in record"),
            RecordErr::BatchMismatch { key, got, expected } => write!(
                f,
                "batch size mismatch for {key:?}: got leading dims {got:?}, expected {expected:?}"
            ),
            RecordErr::DtypeMismatch { key, got, expected } => {
                write!(f, "dtype mismatch for {key:?}: got {got}, expected {expected}")
            }
            RecordErr::ShapeMismatch { key, got, expected } => {
                write!(f, "shape mismatch for {key:?}: got {got:?}, expected {expected:?}")
            }
            RecordErr::KeysMismatch { got, expected } => {
                write!(f, "records hold different keys: got {got:?}, expected {expected:?}")
            }
            RecordErr::StackBatchMismatch { got, expected } => write!(
                f,
                "records hold different batch sizes: got {got:?}, expected {expected:?}"
            ),
            RecordErr::EmptyStack => write!(f, "cannot stack an empty sequence of records"),
            RecordErr::InvalidSpec(msg) => write!(f, "invalid action spec: {msg}"),
            RecordErr::Shape(e) => write!(f, "shape error: {e}"),
            RecordErr::Io(e) => write!(f, "io error: {e}"),
            RecordErr::Safetensors(e) => write!(f, "safetensors error: {e}"),
            RecordErr::Metadata(msg) => write!(f, "invalid record metadata: {msg}"),
        }
    }
}

impl Error for RecordErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RecordErr::Shape(e) => Some(e),
            RecordErr::Io(e) => Some(e),
            RecordErr::Safetensors(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ndarray::ShapeError> for RecordErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<io::Error> for RecordErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SafeTensorError> for RecordErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Safetensors(value)
    }
}
