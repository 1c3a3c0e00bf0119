use log::debug;

use crate::{ExploreErr, Result};

/// Linear epsilon decay from `eps_init` down to `eps_end` over `annealing_steps` frames.
#[derive(Debug, Clone, PartialEq)]
pub struct EpsilonSchedule {
    eps_init: f32,
    eps_end: f32,
    annealing_steps: usize,
    eps: f32,
}

impl EpsilonSchedule {
    /// Creates a new `EpsilonSchedule`.
    ///
    /// # Arguments
    /// * `eps_init` - The initial epsilon value.
    /// * `eps_end` - The final epsilon value.
    /// * `annealing_steps` - The amount of frames it takes for epsilon to reach `eps_end`.
    ///
    /// # Returns
    /// An error if `eps_end > eps_init`.
    pub fn new(eps_init: f32, eps_end: f32, annealing_steps: usize) -> Result<Self> {
        if eps_end > eps_init {
            return Err(ExploreErr::InvalidEpsilon {
                init: eps_init,
                end: eps_end,
            });
        }

        Ok(Self {
            eps_init,
            eps_end,
            annealing_steps,
            eps: eps_init,
        })
    }

    /// Decays epsilon by `frames` frames. Once `eps_end` is reached this is a no-op.
    ///
    /// # Arguments
    /// * `frames` - The number of frames since the last step.
    ///
    /// # Returns
    /// An error if frames are to be decayed with an annealing horizon of zero.
    pub fn step(&mut self, frames: usize) -> Result<()> {
        if frames == 0 {
            return Ok(());
        }

        if self.annealing_steps == 0 {
            return Err(ExploreErr::NonPositiveAnnealing {
                what: "epsilon decay",
            });
        }

        let delta = (self.eps_init - self.eps_end) / self.annealing_steps as f32;
        self.eps = (self.eps - delta * frames as f32).max(self.eps_end);
        debug!(frames = frames; "epsilon decayed to {}", self.eps);
        Ok(())
    }

    /// Returns the current epsilon.
    pub fn current(&self) -> f32 {
        self.eps
    }

    pub fn eps_init(&self) -> f32 {
        self.eps_init
    }

    pub fn eps_end(&self) -> f32 {
        self.eps_end
    }

    pub fn annealing_steps(&self) -> usize {
        self.annealing_steps
    }

    /// Restores epsilon to its initial value.
    pub fn reset(&mut self) {
        self.eps = self.eps_init;
    }
}
