use ndarray::IxDyn;
use rand::{Rng, rngs::StdRng};
use record::{ActionSpec, Record, RecordErr};

use crate::{EpsilonSchedule, ExplorationCtx, Policy, Result};

/// Epsilon-greedy wrapper around a deterministic policy.
///
/// While exploring, each batch element has its action replaced by a random action from the
/// policy's spec with probability epsilon.
pub struct EGreedy<P, R = StdRng> {
    policy: P,
    schedule: EpsilonSchedule,
    rng: R,
}

impl<P: Policy, R: Rng> EGreedy<P, R> {
    /// Creates a new `EGreedy` wrapper.
    ///
    /// # Arguments
    /// * `policy` - The deterministic policy to wrap.
    /// * `schedule` - The epsilon decay schedule.
    /// * `rng` - The random number generator used for both the coin flips and the random actions.
    pub fn new(policy: P, schedule: EpsilonSchedule, rng: R) -> Self {
        Self {
            policy,
            schedule,
            rng,
        }
    }

    /// A step of epsilon decay, see `EpsilonSchedule::step`.
    pub fn step(&mut self, frames: usize) -> Result<()> {
        self.schedule.step(frames)
    }

    /// Returns the current epsilon.
    pub fn eps(&self) -> f32 {
        self.schedule.current()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn into_inner(self) -> P {
        self.policy
    }

    fn explore(&mut self, record: &mut Record) -> Result<()> {
        let numel = record.numel_batch();
        if numel == 0 {
            return Ok(());
        }

        let eps = self.schedule.current();
        let cond: Vec<bool> = (0..numel).map(|_| self.rng.random::<f32>() < eps).collect();
        if !cond.iter().any(|&c| c) {
            return Ok(());
        }

        let key = self.policy.action_key().to_string();
        let action = record.get_f32(&key)?;
        let shape = action.shape().to_vec();
        let spec = self.policy.spec();
        check_action_dim(&key, &shape, spec)?;

        let rest = action.len() / numel;
        let mut out = action
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((numel, rest))
            .map_err(RecordErr::from)?;
        let random = spec
            .rand(&shape[..shape.len() - 1], &mut self.rng)
            .into_shape_with_order((numel, rest))
            .map_err(RecordErr::from)?;

        for (i, _) in cond.iter().enumerate().filter(|(_, c)| **c) {
            out.row_mut(i).assign(&random.row(i));
        }

        let out = out.into_shape_with_order(IxDyn(&shape)).map_err(RecordErr::from)?;
        record.set_(&key, out)?;
        Ok(())
    }
}

impl<P: Policy, R: Rng> Policy for EGreedy<P, R> {
    fn forward(&mut self, record: &mut Record, ctx: &ExplorationCtx) -> Result<()> {
        self.policy.forward(record, ctx)?;
        if ctx.mode.is_random() {
            self.explore(record)?;
        }

        Ok(())
    }

    fn out_keys(&self) -> Vec<String> {
        self.policy.out_keys()
    }

    fn action_key(&self) -> &str {
        self.policy.action_key()
    }

    fn spec(&self) -> &ActionSpec {
        self.policy.spec()
    }
}

pub(crate) fn check_action_dim(key: &str, shape: &[usize], spec: &ActionSpec) -> Result<()> {
    if shape.last() != Some(&spec.dim()) {
        let mut expected = shape[..shape.len().saturating_sub(1)].to_vec();
        expected.push(spec.dim());
        return Err(RecordErr::ShapeMismatch {
            key: key.to_string(),
            got: shape.to_vec(),
            expected,
        }
        .into());
    }

    Ok(())
}
