mod error;
mod record;
mod spec;
mod tensor;

pub use error::{RecordErr, Result};
pub use record::Record;
pub use spec::ActionSpec;
pub use tensor::{DType, Tensor};
