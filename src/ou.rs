use log::debug;
use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};
use ndarray_rand::RandomExt;
use rand::{Rng, rngs::StdRng};
use rand_distr::StandardNormal;
use record::{ActionSpec, DType, Record, RecordErr, Tensor};
use serde::Deserialize;

use crate::{
    EpsilonSchedule, ExploreErr, ExplorationCtx, Policy, Result, egreedy::check_action_dim,
};

pub const NOISE_KEY: &str = "_ou_prev_noise";
pub const STEPS_KEY: &str = "_ou_steps";

/// Parameters of the Ornstein-Uhlenbeck process.
///
/// Noise equation:
///     noise = prev_noise + theta * (mu - prev_noise) * dt + current_sigma * sqrt(dt) * W
/// Sigma equation:
///     current_sigma = max(sigma_min, -(sigma - sigma_min) / n_steps_annealing * n_steps + sigma)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OuParams {
    pub theta: f32,
    pub mu: f32,
    pub sigma: f32,
    pub dt: f32,
    /// Initial value of the process.
    pub x0: f32,
    /// When missing, sigma is not annealed.
    pub sigma_min: Option<f32>,
    pub n_steps_annealing: usize,
}

impl Default for OuParams {
    fn default() -> Self {
        Self {
            theta: 0.15,
            mu: 0.,
            sigma: 0.2,
            dt: 1e-2,
            x0: 0.,
            sigma_min: None,
            n_steps_annealing: 1000,
        }
    }
}

/// Auto-correlated exploration noise whose state lives in the record.
///
/// The previous noise and the step count of each batch element are kept under `NOISE_KEY` and
/// `STEPS_KEY`. They're zero initialized the first time a record without them is seen, and must
/// be zeroed (externally or through `OuProcess::reset`) when a new trajectory starts, otherwise
/// the step count keeps increasing across rollouts.
#[derive(Debug, Clone)]
pub struct OuProcess {
    params: OuParams,
    sigma_min: f32,
    /// Steps after which sigma sits at `sigma_min`, `None` when sigma is not annealed.
    annealing_end: Option<i64>,
    m: f64,
    c: f64,
    action_key: String,
}

impl OuProcess {
    /// Creates a new `OuProcess`.
    ///
    /// # Arguments
    /// * `params` - The process parameters.
    /// * `action_key` - The key of the action the noise is added to.
    ///
    /// # Returns
    /// An error if sigma is to be annealed over zero steps.
    pub fn new(params: OuParams, action_key: impl Into<String>) -> Result<Self> {
        let (m, sigma_min, annealing_end) = match params.sigma_min {
            Some(_) if params.n_steps_annealing == 0 => {
                return Err(ExploreErr::NonPositiveAnnealing {
                    what: "sigma annealing",
                });
            }
            Some(sigma_min) => (
                -(f64::from(params.sigma) - f64::from(sigma_min))
                    / params.n_steps_annealing as f64,
                sigma_min,
                Some(params.n_steps_annealing as i64),
            ),
            None => (0., params.sigma, None),
        };

        Ok(Self {
            params,
            sigma_min,
            annealing_end,
            m,
            c: f64::from(params.sigma),
            action_key: action_key.into(),
        })
    }

    pub fn params(&self) -> &OuParams {
        &self.params
    }

    /// The keys written into the record next to the action.
    pub fn out_keys(&self) -> Vec<String> {
        vec![NOISE_KEY.to_string(), STEPS_KEY.to_string()]
    }

    /// Returns the sigma used after `n_steps` steps of a trajectory.
    pub fn current_sigma(&self, n_steps: i64) -> f32 {
        match self.annealing_end {
            Some(end) if n_steps >= end => self.sigma_min,
            _ => ((self.m * n_steps as f64 + self.c) as f32).max(self.sigma_min),
        }
    }

    /// Adds a fresh noise sample to the record's action and advances the process.
    ///
    /// # Arguments
    /// * `record` - The record holding the action and the process state.
    /// * `eps` - The scale of the noise added to the action.
    /// * `rng` - The random number generator.
    pub fn add_sample<R: Rng>(&self, record: &mut Record, eps: f32, rng: &mut R) -> Result<()> {
        if !record.contains(NOISE_KEY) {
            self.make_noise_pair(record)?;
        }

        let numel = record.numel_batch();
        let action = record.get_f32(&self.action_key)?;
        let shape = action.shape().to_vec();
        if numel == 0 {
            return Ok(());
        }

        let rest = action.len() / numel;
        let action = flatten(action, numel, rest)?;

        let stored = record.get_f32(NOISE_KEY)?;
        if stored.shape() != shape.as_slice() {
            return Err(RecordErr::ShapeMismatch {
                key: NOISE_KEY.into(),
                got: stored.shape().to_vec(),
                expected: shape,
            }
            .into());
        }
        let prev = flatten(stored, numel, rest)? + self.params.x0;

        let steps = record.get_i64(STEPS_KEY)?.clone();
        if steps.len() != numel {
            return Err(RecordErr::ShapeMismatch {
                key: STEPS_KEY.into(),
                got: steps.shape().to_vec(),
                expected: steps_shape(record.batch_size()),
            }
            .into());
        }

        let OuParams { theta, mu, dt, .. } = self.params;
        let sigma = Array1::from_iter(steps.iter().map(|&n| self.current_sigma(n)))
            .insert_axis(Axis(1));
        let w = Array2::<f32>::random_using((numel, rest), StandardNormal, rng);
        let noise = &prev + &((mu - &prev) * (theta * dt)) + &(sigma * dt.sqrt()) * &w;

        let stored = (&noise - self.params.x0).into_shape_with_order(IxDyn(&shape));
        let action = (action + &(noise * eps)).into_shape_with_order(IxDyn(&shape));

        record.set_(NOISE_KEY, stored.map_err(RecordErr::from)?)?;
        record.set_(&self.action_key, action.map_err(RecordErr::from)?)?;
        record.set_(STEPS_KEY, steps + 1)?;
        Ok(())
    }

    /// Zeroes the process state of the flagged batch elements.
    ///
    /// # Arguments
    /// * `record` - The record holding the process state.
    /// * `flags` - One flag per batch element, `true` for elements starting a new trajectory.
    pub fn reset(&self, record: &mut Record, flags: &[bool]) -> Result<()> {
        if !record.contains(NOISE_KEY) {
            return Ok(());
        }

        let numel = record.numel_batch();
        if flags.len() != numel {
            return Err(ExploreErr::ResetMaskMismatch {
                got: flags.len(),
                expected: numel,
            });
        }

        if flags.iter().all(|&f| f) {
            record.get_f32_mut(NOISE_KEY)?.fill(0.);
            record.get_i64_mut(STEPS_KEY)?.fill(0);
            return Ok(());
        }

        let noise = record.get_f32(NOISE_KEY)?;
        let shape = noise.shape().to_vec();
        let mut noise = flatten(noise, numel, noise.len() / numel.max(1))?;
        let mut steps = record.get_i64(STEPS_KEY)?.clone();

        for (i, _) in flags.iter().enumerate().filter(|(_, f)| **f) {
            noise.row_mut(i).fill(0.);
            if let Some(n) = steps.iter_mut().nth(i) {
                *n = 0;
            }
        }

        let noise = noise
            .into_shape_with_order(IxDyn(&shape))
            .map_err(RecordErr::from)?;
        record.set_(NOISE_KEY, noise)?;
        record.set_(STEPS_KEY, steps)?;
        Ok(())
    }

    fn make_noise_pair(&self, record: &mut Record) -> Result<()> {
        let shape = record.get(&self.action_key)?.shape().to_vec();
        let steps = steps_shape(record.batch_size());
        record.set(NOISE_KEY, Tensor::zeros(DType::F32, &shape))?;
        record.set(STEPS_KEY, Tensor::zeros(DType::I64, &steps))?;
        Ok(())
    }
}

fn steps_shape(batch_size: &[usize]) -> Vec<usize> {
    let mut shape = batch_size.to_vec();
    shape.push(1);
    shape
}

fn flatten(a: &ArrayD<f32>, rows: usize, cols: usize) -> Result<Array2<f32>> {
    let flat = a
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((rows, cols))
        .map_err(RecordErr::from)?;
    Ok(flat)
}

/// Ornstein-Uhlenbeck exploration wrapper, as presented in "Continuous control with deep
/// reinforcement learning" (https://arxiv.org/pdf/1509.02971.pdf).
///
/// Adds auto-correlated noise scaled by a decaying epsilon to a continuous policy's action.
pub struct OuWrapper<P, R = StdRng> {
    policy: P,
    ou: OuProcess,
    schedule: EpsilonSchedule,
    safe: bool,
    rng: R,
}

impl<P: Policy, R: Rng> OuWrapper<P, R> {
    /// Creates a new `OuWrapper`, projecting actions back into the spec after every call.
    ///
    /// # Arguments
    /// * `policy` - The policy to wrap.
    /// * `params` - The parameters of the noise process.
    /// * `schedule` - The decay schedule of the noise scale.
    /// * `rng` - The random number generator.
    ///
    /// # Returns
    /// An error if the process parameters are invalid or the policy already writes one of the
    /// process' keys.
    pub fn new(policy: P, params: OuParams, schedule: EpsilonSchedule, rng: R) -> Result<Self> {
        let ou = OuProcess::new(params, policy.action_key())?;

        let mut out_keys = policy.out_keys();
        out_keys.extend(ou.out_keys());
        let mut unique = out_keys.clone();
        unique.sort();
        unique.dedup();
        if unique.len() != out_keys.len() {
            return Err(ExploreErr::DuplicateKeys(out_keys));
        }

        Ok(Self {
            policy,
            ou,
            schedule,
            safe: true,
            rng,
        })
    }

    /// Whether out of bounds actions are projected into the spec.
    pub fn with_safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }

    /// Updates the noise scale, see `EpsilonSchedule::step`.
    ///
    /// # Arguments
    /// * `frames` - The number of frames of the current batch.
    pub fn step(&mut self, frames: usize) -> Result<()> {
        self.schedule.step(frames)
    }

    pub fn eps(&self) -> f32 {
        self.schedule.current()
    }

    pub fn process(&self) -> &OuProcess {
        &self.ou
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<P: Policy, R: Rng> Policy for OuWrapper<P, R> {
    fn forward(&mut self, record: &mut Record, ctx: &ExplorationCtx) -> Result<()> {
        self.policy.forward(record, ctx)?;

        if ctx.mode.is_random() {
            if let Some(flags) = ctx.reset.flags(record.numel_batch())? {
                debug!(
                    resets = flags.iter().filter(|&&f| f).count();
                    "resetting ou state"
                );
                self.ou.reset(record, &flags)?;
            }

            self.ou
                .add_sample(record, self.schedule.current(), &mut self.rng)?;
        }

        if self.safe {
            let key = self.policy.action_key();
            let spec = self.policy.spec();
            let action = record.get_f32_mut(key)?;
            check_action_dim(key, action.shape(), spec)?;
            spec.project(action);
        }

        Ok(())
    }

    fn out_keys(&self) -> Vec<String> {
        let mut keys = self.policy.out_keys();
        keys.extend(self.ou.out_keys());
        keys
    }

    fn action_key(&self) -> &str {
        self.policy.action_key()
    }

    fn spec(&self) -> &ActionSpec {
        self.policy.spec()
    }
}
