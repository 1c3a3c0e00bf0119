use ndarray::{Array1, ArrayD, Axis, IxDyn};
use ndarray_rand::RandomExt;
use rand::{Rng, distr::StandardUniform};

use crate::{RecordErr, Result};

/// The valid range of a policy's action output.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpec {
    /// A continuous box, `low[i] <= a[i] <= high[i]` for every dimension.
    Bounded { low: Array1<f32>, high: Array1<f32> },
    /// A discrete action over `n` choices, encoded one-hot.
    OneHot { n: usize },
}

impl ActionSpec {
    /// Creates a new bounded spec.
    ///
    /// # Arguments
    /// * `low` - The inclusive lower bound of each dimension.
    /// * `high` - The inclusive upper bound of each dimension.
    ///
    /// # Returns
    /// An error if the bounds differ in length or `low > high` in any dimension.
    pub fn bounded(low: Array1<f32>, high: Array1<f32>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(RecordErr::InvalidSpec(format!(
                "low has {} dims but high has {}",
                low.len(),
                high.len()
            )));
        }

        if low.iter().zip(&high).any(|(l, h)| l > h) {
            return Err(RecordErr::InvalidSpec(format!(
                "lower bound {low} exceeds upper bound {high}"
            )));
        }

        Ok(Self::Bounded { low, high })
    }

    /// Creates a bounded spec with the same scalar bounds in every dimension.
    pub fn uniform(low: f32, high: f32, dim: usize) -> Result<Self> {
        Self::bounded(Array1::from_elem(dim, low), Array1::from_elem(dim, high))
    }

    /// Creates a one-hot spec over `n` choices.
    pub fn one_hot(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(RecordErr::InvalidSpec("one-hot spec needs at least one choice".into()));
        }

        Ok(Self::OneHot { n })
    }

    /// The size of the action's last dimension.
    pub fn dim(&self) -> usize {
        match self {
            ActionSpec::Bounded { low, .. } => low.len(),
            ActionSpec::OneHot { n } => *n,
        }
    }

    /// Draws a random action for every element of the batch.
    ///
    /// # Arguments
    /// * `batch` - The leading batch shape.
    /// * `rng` - The random number generator.
    ///
    /// # Returns
    /// A tensor of shape `[...batch, dim]`.
    pub fn rand<R: Rng>(&self, batch: &[usize], rng: &mut R) -> ArrayD<f32> {
        let mut shape = batch.to_vec();
        shape.push(self.dim());

        match self {
            ActionSpec::Bounded { low, high } => {
                let u = ArrayD::<f32>::random_using(IxDyn(&shape), StandardUniform, rng);
                let range = high - low;
                u * &range + low
            }
            ActionSpec::OneHot { n } => {
                let mut sample = ArrayD::zeros(IxDyn(&shape));
                for mut lane in sample.lanes_mut(Axis(shape.len() - 1)) {
                    lane[rng.random_range(0..*n)] = 1.;
                }
                sample
            }
        }
    }

    /// Projects an action onto the spec in place.
    pub fn project(&self, action: &mut ArrayD<f32>) {
        let last = Axis(action.ndim().saturating_sub(1));
        match self {
            ActionSpec::Bounded { low, high } => {
                for mut lane in action.lanes_mut(last) {
                    lane.zip_mut_with(low, |a, &l| *a = a.max(l));
                    lane.zip_mut_with(high, |a, &h| *a = a.min(h));
                }
            }
            ActionSpec::OneHot { .. } => {
                for mut lane in action.lanes_mut(last) {
                    let argmax = lane
                        .iter()
                        .enumerate()
                        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                            if v > best.1 { (i, v) } else { best }
                        })
                        .0;
                    lane.fill(0.);
                    if let Some(hot) = lane.get_mut(argmax) {
                        *hot = 1.;
                    }
                }
            }
        }
    }

    /// Whether every action in the batch lies within the spec.
    pub fn is_in(&self, action: &ArrayD<f32>) -> bool {
        if action.shape().last() != Some(&self.dim()) {
            return false;
        }

        let last = Axis(action.ndim() - 1);
        match self {
            ActionSpec::Bounded { low, high } => action.lanes(last).into_iter().all(|lane| {
                lane.iter()
                    .zip(low.iter().zip(high))
                    .all(|(a, (l, h))| l <= a && a <= h)
            }),
            ActionSpec::OneHot { .. } => action.lanes(last).into_iter().all(|lane| {
                lane.iter().all(|&a| a == 0. || a == 1.) && lane.sum() == 1.
            }),
        }
    }
}
