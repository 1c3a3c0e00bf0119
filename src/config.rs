use std::{fs, num::NonZeroUsize, path::Path};

use serde::Deserialize;

use crate::{EpsilonSchedule, ExploreErr, OuParams, Result};

/// Everything needed to build the exploration wrappers and recorders of a rollout.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Seeds every generated rng, a random seed is used when missing.
    pub seed: Option<u64>,
    pub egreedy: EGreedyConfig,
    pub ou: OuConfig,
    pub video: VideoConfig,
    pub recorder: RecorderConfig,
}

impl ExplorationConfig {
    /// Loads a configuration from a JSON file. Missing fields take their default value.
    ///
    /// # Arguments
    /// * `path` - The path of the JSON file.
    ///
    /// # Returns
    /// A validated configuration or `ExploreErr::Config`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ExploreErr::Config(format!("cannot read '{}': {e}", path.display())))?;

        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ExploreErr::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.egreedy.schedule()?;
        self.ou.schedule()?;
        self.video.skip()?;
        self.video.keys()?;
        self.recorder.skip()?;
        Ok(())
    }
}

fn nonzero(value: usize, field: &str) -> Result<NonZeroUsize> {
    NonZeroUsize::new(value).ok_or_else(|| ExploreErr::Config(format!("{field} must be positive")))
}

/// Epsilon-greedy exploration settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EGreedyConfig {
    pub eps_init: f32,
    pub eps_end: f32,
    pub annealing_num_steps: usize,
}

impl Default for EGreedyConfig {
    fn default() -> Self {
        Self {
            eps_init: 1.0,
            eps_end: 0.1,
            annealing_num_steps: 1000,
        }
    }
}

impl EGreedyConfig {
    pub fn schedule(&self) -> Result<EpsilonSchedule> {
        EpsilonSchedule::new(self.eps_init, self.eps_end, self.annealing_num_steps)
    }
}

/// Ornstein-Uhlenbeck exploration settings. The process parameters sit at the same level as the
/// schedule ones.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OuConfig {
    #[serde(flatten)]
    pub params: OuParams,
    pub eps_init: f32,
    pub eps_end: f32,
    pub annealing_num_steps: usize,
    /// Project the noisy action back into the action spec.
    pub safe: bool,
}

impl Default for OuConfig {
    fn default() -> Self {
        Self {
            params: OuParams::default(),
            eps_init: 1.0,
            eps_end: 0.1,
            annealing_num_steps: 1000,
            safe: true,
        }
    }
}

impl OuConfig {
    pub fn schedule(&self) -> Result<EpsilonSchedule> {
        EpsilonSchedule::new(self.eps_init, self.eps_end, self.annealing_num_steps)
    }
}

/// Video recorder settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub tag: String,
    pub keys: Vec<String>,
    pub skip: usize,
    pub fps: u32,
    /// Where clips are written.
    pub dir: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            tag: "rollout".to_string(),
            keys: vec!["next_pixels".to_string()],
            skip: 2,
            fps: 6,
            dir: "videos".to_string(),
        }
    }
}

impl VideoConfig {
    pub fn skip(&self) -> Result<NonZeroUsize> {
        nonzero(self.skip, "video.skip")
    }

    /// Returns the keys frames are read from, at least one is required.
    pub fn keys(&self) -> Result<&[String]> {
        if self.keys.is_empty() {
            return Err(ExploreErr::Config("video.keys must not be empty".into()));
        }

        Ok(&self.keys)
    }
}

/// Record recorder settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub out_file_base: String,
    pub skip_reset: bool,
    pub skip: usize,
    /// Keys to keep in each snapshot, all of them when empty.
    pub keys: Vec<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            out_file_base: "rollout".to_string(),
            skip_reset: true,
            skip: 4,
            keys: Vec::new(),
        }
    }
}

impl RecorderConfig {
    pub fn skip(&self) -> Result<NonZeroUsize> {
        nonzero(self.skip, "recorder.skip")
    }
}
