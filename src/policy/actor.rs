use ndarray::{Array2, IxDyn};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;
use record::{ActionSpec, Record, RecordErr};

use super::Policy;
use crate::{ExploreErr, ExplorationCtx, Result};

/// A deterministic linear policy: `action = observation · W`.
#[derive(Debug, Clone)]
pub struct LinearActor {
    weights: Array2<f32>,
    spec: ActionSpec,
    in_key: String,
    out_key: String,
}

impl LinearActor {
    /// Creates a new `LinearActor` reading `"observation"` and writing `"action"`.
    ///
    /// # Arguments
    /// * `weights` - An `[in, out]` weight matrix.
    /// * `spec` - The action spec, its dimension must equal `out`.
    ///
    /// # Returns
    /// An error if the weights and the spec disagree on the action dimension.
    pub fn new(weights: Array2<f32>, spec: ActionSpec) -> Result<Self> {
        if weights.ncols() != spec.dim() {
            return Err(RecordErr::ShapeMismatch {
                key: "weights".into(),
                got: weights.shape().to_vec(),
                expected: vec![weights.nrows(), spec.dim()],
            }
            .into());
        }

        Ok(Self {
            weights,
            spec,
            in_key: "observation".into(),
            out_key: "action".into(),
        })
    }

    /// Creates a `LinearActor` with LeCun uniform weights.
    ///
    /// # Arguments
    /// * `in_dim` - The size of the observation's last dimension.
    /// * `spec` - The action spec.
    /// * `rng` - The random number generator.
    pub fn random<R: Rng>(in_dim: usize, spec: ActionSpec, rng: &mut R) -> Result<Self> {
        let range = (3. / in_dim as f32).sqrt();
        let distribution =
            Uniform::new(-range, range).map_err(|e| ExploreErr::Config(format!("actor weights: {e}")))?;
        let weights = Array2::random_using((in_dim, spec.dim()), distribution, rng);
        Self::new(weights, spec)
    }

    /// Changes the keys the actor reads from and writes to.
    pub fn with_keys(mut self, in_key: impl Into<String>, out_key: impl Into<String>) -> Self {
        self.in_key = in_key.into();
        self.out_key = out_key.into();
        self
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }
}

impl Policy for LinearActor {
    fn forward(&mut self, record: &mut Record, _ctx: &ExplorationCtx) -> Result<()> {
        let obs = record.get_f32(&self.in_key)?;
        let in_dim = self.weights.nrows();
        let shape = obs.shape();

        if shape.last() != Some(&in_dim) {
            return Err(RecordErr::ShapeMismatch {
                key: self.in_key.clone(),
                got: shape.to_vec(),
                expected: vec![in_dim],
            }
            .into());
        }

        let mut out_shape = shape[..shape.len() - 1].to_vec();
        out_shape.push(self.weights.ncols());

        let rows = obs.len() / in_dim.max(1);
        let flat = obs.to_shape((rows, in_dim)).map_err(RecordErr::from)?;
        let action = flat
            .dot(&self.weights)
            .into_shape_with_order(IxDyn(&out_shape))
            .map_err(RecordErr::from)?;

        record.set(self.out_key.clone(), action)?;
        Ok(())
    }

    fn out_keys(&self) -> Vec<String> {
        vec![self.out_key.clone()]
    }

    fn action_key(&self) -> &str {
        &self.out_key
    }

    fn spec(&self) -> &ActionSpec {
        &self.spec
    }
}
