use crate::{ExploreErr, Result};

/// Whether wrappers should perturb the actions of the policy they wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExplorationMode {
    /// Stochastic action selection, the default when collecting data.
    #[default]
    Random,
    /// Plain policy output, used for evaluation.
    Deterministic,
}

impl ExplorationMode {
    pub fn is_random(self) -> bool {
        matches!(self, ExplorationMode::Random)
    }
}

/// Which batch elements begin a new trajectory on this call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reset {
    #[default]
    Continue,
    All,
    /// One flag per batch element, in row major order over the batch dims.
    Mask(Vec<bool>),
}

impl Reset {
    /// Expands the signal into one flag per batch element.
    ///
    /// # Arguments
    /// * `numel` - The number of elements in the batch.
    ///
    /// # Returns
    /// `None` when no element is reset, or an error if a mask has the wrong length.
    pub fn flags(&self, numel: usize) -> Result<Option<Vec<bool>>> {
        match self {
            Reset::Continue => Ok(None),
            Reset::All => Ok(Some(vec![true; numel])),
            Reset::Mask(mask) if mask.len() != numel => Err(ExploreErr::ResetMaskMismatch {
                got: mask.len(),
                expected: numel,
            }),
            Reset::Mask(mask) if mask.iter().any(|&m| m) => Ok(Some(mask.clone())),
            Reset::Mask(_) => Ok(None),
        }
    }
}

/// Per call context handed to every `Policy::forward`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplorationCtx {
    pub mode: ExplorationMode,
    pub reset: Reset,
}

impl ExplorationCtx {
    pub fn random() -> Self {
        Self::default()
    }

    pub fn deterministic() -> Self {
        Self {
            mode: ExplorationMode::Deterministic,
            reset: Reset::Continue,
        }
    }

    /// Returns the same context, flagging new trajectories.
    pub fn with_reset(mut self, reset: Reset) -> Self {
        self.reset = reset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_mode_is_random() {
        assert!(ExplorationMode::default().is_random());
        assert!(ExplorationCtx::random().mode.is_random());
        assert!(!ExplorationCtx::deterministic().mode.is_random());
    }

    #[test]
    fn reset_flags() {
        assert_eq!(Reset::Continue.flags(3).unwrap(), None);
        assert_eq!(Reset::All.flags(2).unwrap(), Some(vec![true, true]));
        assert_eq!(Reset::Mask(vec![false, false]).flags(2).unwrap(), None);
        assert_eq!(
            Reset::Mask(vec![false, true]).flags(2).unwrap(),
            Some(vec![false, true])
        );
        assert!(Reset::Mask(vec![true]).flags(2).is_err());
    }
}
