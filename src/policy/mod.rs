mod actor;

pub use actor::LinearActor;

use record::{ActionSpec, Record};

use crate::{ExplorationCtx, Result};

/// A module that reads a record and writes its action into it.
///
/// Exploration wrappers are themselves policies, so they can be stacked.
pub trait Policy {
    /// Runs the policy, writing its outputs into `record`.
    ///
    /// # Arguments
    /// * `record` - The record to read inputs from and write outputs to.
    /// * `ctx` - The exploration context of this call.
    fn forward(&mut self, record: &mut Record, ctx: &ExplorationCtx) -> Result<()>;

    /// The keys this policy writes, the action key first.
    fn out_keys(&self) -> Vec<String>;

    /// The key the action is written under.
    fn action_key(&self) -> &str;

    /// The valid range of the action.
    fn spec(&self) -> &ActionSpec;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn forward(&mut self, record: &mut Record, ctx: &ExplorationCtx) -> Result<()> {
        (**self).forward(record, ctx)
    }

    fn out_keys(&self) -> Vec<String> {
        (**self).out_keys()
    }

    fn action_key(&self) -> &str {
        (**self).action_key()
    }

    fn spec(&self) -> &ActionSpec {
        (**self).spec()
    }
}
