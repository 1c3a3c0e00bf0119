use std::{error::Error, fmt, io};

use record::RecordErr;

/// The exploration module's result type.
pub type Result<T> = std::result::Result<T, ExploreErr>;

/// Failures of exploration wrappers and recorders.
#[derive(Debug)]
pub enum ExploreErr {
    /// The epsilon schedule would increase over time.
    InvalidEpsilon { init: f32, end: f32 },
    /// A decay step was requested with an annealing horizon of zero steps.
    NonPositiveAnnealing { what: &'static str },
    /// The wrapped policy already writes one of the wrapper's bookkeeping keys.
    DuplicateKeys(Vec<String>),
    /// A frame that is neither `[H, W]` grayscale nor `[H, W, 3]` color.
    InvalidFrame { shape: Vec<usize> },
    /// A reset mask whose length doesn't match the batch.
    ResetMaskMismatch { got: usize, expected: usize },
    /// A recorder was dumped with nothing to write.
    EmptyBuffer { recorder: &'static str },
    /// The video sink failed its capability check.
    SinkUnavailable(String),
    /// Invalid configuration.
    Config(String),
    Record(RecordErr),
    Io(io::Error),
}

impl fmt::Display for ExploreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExploreErr::InvalidEpsilon { init, end } => write!(
                f,
                "eps should decrease over time or be constant, got eps_init={init} and eps_end={end}"
            ),
            ExploreErr::NonPositiveAnnealing { what } => write!(
                f,
                "{what} needs a strictly positive number of annealing steps"
            ),
            ExploreErr::DuplicateKeys(keys) => write!(f, "got multiple identical output keys: {keys:?}"),
            ExploreErr::InvalidFrame { shape } => write!(f, "invalid observation shape, got: {shape:?}"),
            ExploreErr::ResetMaskMismatch { got, expected } => write!(
                f,
                "reset mask has {got} entries but the batch holds {expected} elements"
            ),
            ExploreErr::EmptyBuffer { recorder } => write!(f, "{recorder} has nothing buffered to dump"),
            ExploreErr::SinkUnavailable(msg) => write!(f, "video sink unavailable: {msg}"),
            ExploreErr::Config(msg) => write!(f, "invalid config: {msg}"),
            ExploreErr::Record(e) => write!(f, "record error: {e}"),
            ExploreErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ExploreErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExploreErr::Record(e) => Some(e),
            ExploreErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RecordErr> for ExploreErr {
    fn from(value: RecordErr) -> Self {
        Self::Record(value)
    }
}

impl From<io::Error> for ExploreErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for the binary.
impl From<ExploreErr> for io::Error {
    fn from(value: ExploreErr) -> Self {
        match value {
            ExploreErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
