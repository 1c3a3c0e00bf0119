pub mod builder;
pub mod config;
pub mod egreedy;
pub mod error;
pub mod mode;
pub mod ou;
pub mod policy;
pub mod recorder;
pub mod schedule;

pub use builder::ExplorationBuilder;
pub use config::{EGreedyConfig, ExplorationConfig, OuConfig, RecorderConfig, VideoConfig};
pub use egreedy::EGreedy;
pub use error::{ExploreErr, Result};
pub use mode::{ExplorationCtx, ExplorationMode, Reset};
pub use ou::{NOISE_KEY, OuParams, OuProcess, OuWrapper, STEPS_KEY};
pub use policy::{LinearActor, Policy};
pub use recorder::{ClipFileSink, RecordRecorder, VideoRecorder, VideoSink};
pub use schedule::EpsilonSchedule;
