use std::{num::NonZeroUsize, path::PathBuf};

use log::{debug, warn};
use record::Record;

use super::tagged;
use crate::{ExploreErr, Result};

/// Records snapshots of the records coming out of an environment and saves them, stacked, to
/// `<out_file_base>[_<suffix>]_tensordict.safetensors` when dumped.
pub struct RecordRecorder {
    out_file_base: String,
    skip_reset: bool,
    skip: NonZeroUsize,
    keys: Vec<String>,
    iter: usize,
    count: usize,
    snapshots: Vec<Record>,
}

impl RecordRecorder {
    /// Creates a new `RecordRecorder` that records whole records and drops the first snapshot of
    /// each dump.
    ///
    /// # Arguments
    /// * `out_file_base` - The prefix of the written files.
    /// * `skip` - Only every `skip`-th record is kept.
    pub fn new(out_file_base: impl Into<String>, skip: NonZeroUsize) -> Self {
        Self {
            out_file_base: out_file_base.into(),
            skip_reset: true,
            skip,
            keys: Vec::new(),
            iter: 0,
            count: 0,
            snapshots: Vec::new(),
        }
    }

    /// Whether the first snapshot, usually the one produced by the environment's reset, is
    /// discarded on dump.
    pub fn with_skip_reset(mut self, skip_reset: bool) -> Self {
        self.skip_reset = skip_reset;
        self
    }

    /// Restricts the snapshots to the given keys. An empty list keeps every key.
    pub fn with_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Feeds a record, leaving it untouched.
    pub fn apply(&mut self, record: &Record) -> Result<()> {
        self.count += 1;
        if self.count % self.skip.get() == 0 {
            let snapshot = if self.keys.is_empty() {
                record.clone()
            } else {
                record.select(&self.keys)?
            };
            self.snapshots.push(snapshot);
        }

        Ok(())
    }

    /// Stacks the buffered snapshots and saves them.
    ///
    /// # Arguments
    /// * `suffix` - An optional suffix appended to the file base.
    ///
    /// # Returns
    /// The path of the written file.
    pub fn dump(&mut self, suffix: Option<&str>) -> Result<PathBuf> {
        let skip = usize::from(self.skip_reset).min(self.snapshots.len());
        let snapshots = &self.snapshots[skip..];
        if snapshots.is_empty() {
            warn!(
                "record recorder {:?} dumped with {} snapshot(s), nothing to write",
                self.out_file_base,
                self.snapshots.len()
            );
            return Err(ExploreErr::EmptyBuffer {
                recorder: "record recorder",
            });
        }

        let tag = tagged(&self.out_file_base, suffix);
        let path = PathBuf::from(format!("{tag}_tensordict.safetensors"));
        let stacked = Record::stack(snapshots)?;
        stacked.save(&path)?;
        debug!(iter = self.iter, snapshots = snapshots.len(); "records dumped to {}", path.display());

        self.iter += 1;
        self.count = 0;
        self.snapshots.clear();
        Ok(path)
    }

    /// Returns the amount of buffered snapshots.
    pub fn buffered(&self) -> usize {
        self.snapshots.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn iteration(&self) -> usize {
        self.iter
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use ndarray::array;

    use super::*;

    fn base(name: &str) -> String {
        let dir = env::temp_dir().join(format!("record-recorder-{}", std::process::id()));
        dir.join(name).to_string_lossy().into_owned()
    }

    fn step_record(t: f32) -> Record {
        let mut record = Record::new([1]);
        record.set("reward", array![[t]].into_dyn()).unwrap();
        record.set("done", array![[0_i64]].into_dyn()).unwrap();
        record
    }

    #[test]
    fn keeps_every_skip_th_record() {
        let mut rec = RecordRecorder::new(base("skip"), NonZeroUsize::new(4).unwrap());
        for t in 0..10 {
            rec.apply(&step_record(t as f32)).unwrap();
        }

        assert_eq!(rec.buffered(), 2);
        assert_eq!(rec.count(), 10);
    }

    #[test]
    fn dump_drops_reset_snapshot() {
        let mut rec = RecordRecorder::new(base("reset"), NonZeroUsize::new(1).unwrap());
        for t in 0..4 {
            rec.apply(&step_record(t as f32)).unwrap();
        }

        let path = rec.dump(None).unwrap();
        let dumped = Record::load(&path).unwrap();
        assert_eq!(dumped.batch_size(), &[3, 1]);
        assert_eq!(
            dumped.get_f32("reward").unwrap(),
            &array![[[1.0_f32]], [[2.0]], [[3.0]]].into_dyn()
        );
        assert_eq!(rec.buffered(), 0);
        assert_eq!(rec.count(), 0);
        assert_eq!(rec.iteration(), 1);
    }

    #[test]
    fn dump_keeps_everything_without_skip_reset() {
        let mut rec = RecordRecorder::new(base("noreset"), NonZeroUsize::new(1).unwrap())
            .with_skip_reset(false)
            .with_keys(["reward"]);
        for t in 0..3 {
            rec.apply(&step_record(t as f32)).unwrap();
        }

        let path = rec.dump(Some("eval")).unwrap();
        assert!(path.to_string_lossy().ends_with("noreset_eval_tensordict.safetensors"));

        let dumped = Record::load(&path).unwrap();
        assert_eq!(dumped.keys().collect::<Vec<_>>(), vec!["reward"]);
        assert_eq!(dumped.batch_size(), &[3, 1]);
    }

    #[test]
    fn dump_without_snapshots_fails() {
        let mut rec = RecordRecorder::new(base("empty"), NonZeroUsize::new(1).unwrap());
        assert!(matches!(rec.dump(None), Err(ExploreErr::EmptyBuffer { .. })));

        rec.apply(&step_record(0.)).unwrap();
        assert!(rec.dump(None).is_err());
        assert_eq!(rec.buffered(), 1);
    }

    #[test]
    fn missing_key_is_reported() {
        let mut rec = RecordRecorder::new(base("missing"), NonZeroUsize::new(1).unwrap())
            .with_keys(["pixels"]);
        assert!(rec.apply(&step_record(0.)).is_err());
    }
}
