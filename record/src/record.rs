use std::{collections::{BTreeMap, HashMap}, fs, path::Path};

use log::debug;
use ndarray::ArrayD;
use safetensors::{SafeTensors, tensor::TensorView};

use crate::{DType, RecordErr, Result, Tensor};

const BATCH_SIZE_KEY: &str = "batch_size";

/// A batched mapping from names to tensors.
///
/// Every entry's shape starts with the record's batch size, so a record of batch size `[8]` can
/// hold an `[8, 4]` observation and an `[8, 2]` action side by side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    batch_size: Vec<usize>,
    entries: BTreeMap<String, Tensor>,
}

impl Record {
    /// Creates a new empty `Record`.
    ///
    /// # Arguments
    /// * `batch_size` - The leading dimensions shared by every entry.
    pub fn new(batch_size: impl Into<Vec<usize>>) -> Self {
        Self {
            batch_size: batch_size.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn batch_size(&self) -> &[usize] {
        &self.batch_size
    }

    /// Returns the number of elements in the batch, 1 for an unbatched record.
    pub fn numel_batch(&self) -> usize {
        self.batch_size.iter().product()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Result<&Tensor> {
        self.entries
            .get(key)
            .ok_or_else(|| RecordErr::MissingKey(key.to_string()))
    }

    pub fn get_f32(&self, key: &str) -> Result<&ArrayD<f32>> {
        let tensor = self.get(key)?;
        tensor.as_f32().ok_or_else(|| dtype_err(key, tensor, DType::F32))
    }

    pub fn get_i64(&self, key: &str) -> Result<&ArrayD<i64>> {
        let tensor = self.get(key)?;
        tensor.as_i64().ok_or_else(|| dtype_err(key, tensor, DType::I64))
    }

    pub fn get_u8(&self, key: &str) -> Result<&ArrayD<u8>> {
        let tensor = self.get(key)?;
        tensor.as_u8().ok_or_else(|| dtype_err(key, tensor, DType::U8))
    }

    pub fn get_f32_mut(&mut self, key: &str) -> Result<&mut ArrayD<f32>> {
        let tensor = self
            .entries
            .get_mut(key)
            .ok_or_else(|| RecordErr::MissingKey(key.to_string()))?;

        let got = tensor.dtype();
        tensor.as_f32_mut().ok_or_else(|| RecordErr::DtypeMismatch {
            key: key.to_string(),
            got,
            expected: DType::F32,
        })
    }

    pub fn get_i64_mut(&mut self, key: &str) -> Result<&mut ArrayD<i64>> {
        let tensor = self
            .entries
            .get_mut(key)
            .ok_or_else(|| RecordErr::MissingKey(key.to_string()))?;

        let got = tensor.dtype();
        tensor.as_i64_mut().ok_or_else(|| RecordErr::DtypeMismatch {
            key: key.to_string(),
            got,
            expected: DType::I64,
        })
    }

    /// Inserts or replaces an entry.
    ///
    /// # Arguments
    /// * `key` - The entry's name.
    /// * `tensor` - The entry's value, its leading dims must equal the batch size.
    ///
    /// # Returns
    /// An error if the tensor doesn't carry the record's batch size.
    pub fn set(&mut self, key: impl Into<String>, tensor: impl Into<Tensor>) -> Result<()> {
        let key = key.into();
        let tensor = tensor.into();
        let nbatch = self.batch_size.len();
        let shape = tensor.shape();

        if shape.len() < nbatch || shape[..nbatch] != self.batch_size[..] {
            return Err(RecordErr::BatchMismatch {
                key,
                got: shape[..nbatch.min(shape.len())].to_vec(),
                expected: self.batch_size.clone(),
            });
        }

        self.entries.insert(key, tensor);
        Ok(())
    }

    /// Overwrites an existing entry in place, keeping its dtype and shape.
    ///
    /// # Returns
    /// An error if the key is missing or the new value differs in dtype or shape.
    pub fn set_(&mut self, key: &str, tensor: impl Into<Tensor>) -> Result<()> {
        let tensor = tensor.into();
        let current = self
            .entries
            .get_mut(key)
            .ok_or_else(|| RecordErr::MissingKey(key.to_string()))?;

        if current.dtype() != tensor.dtype() {
            return Err(RecordErr::DtypeMismatch {
                key: key.to_string(),
                got: tensor.dtype(),
                expected: current.dtype(),
            });
        }

        if current.shape() != tensor.shape() {
            return Err(RecordErr::ShapeMismatch {
                key: key.to_string(),
                got: tensor.shape().to_vec(),
                expected: current.shape().to_vec(),
            });
        }

        *current = tensor;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Tensor> {
        self.entries.remove(key)
    }

    /// Returns a new record holding only the given keys.
    ///
    /// # Returns
    /// An error if any key is missing.
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> Result<Record> {
        let mut selected = Record::new(self.batch_size.clone());
        for key in keys {
            let key = key.as_ref();
            selected.entries.insert(key.to_string(), self.get(key)?.clone());
        }

        Ok(selected)
    }

    /// Stacks records along a new leading batch dimension.
    ///
    /// # Arguments
    /// * `records` - Records with identical batch size, keys, dtypes and shapes.
    ///
    /// # Returns
    /// A record of batch size `[records.len(), ...batch_size]`.
    pub fn stack(records: &[Record]) -> Result<Record> {
        let first = records.first().ok_or(RecordErr::EmptyStack)?;
        let expected: Vec<String> = first.entries.keys().cloned().collect();

        for record in &records[1..] {
            if record.batch_size != first.batch_size {
                return Err(RecordErr::StackBatchMismatch {
                    got: record.batch_size.clone(),
                    expected: first.batch_size.clone(),
                });
            }
            if !record.entries.keys().eq(first.entries.keys()) {
                return Err(RecordErr::KeysMismatch {
                    got: record.entries.keys().cloned().collect(),
                    expected,
                });
            }
        }

        let mut batch_size = vec![records.len()];
        batch_size.extend_from_slice(&first.batch_size);

        let mut stacked = Record::new(batch_size);
        for key in &expected {
            let items: Vec<&Tensor> = records.iter().filter_map(|r| r.entries.get(key)).collect();
            stacked.set(key.clone(), Tensor::stack(key, &items)?)?;
        }

        Ok(stacked)
    }

    /// Writes the record to `path` in the safetensors format.
    ///
    /// The batch size is kept in the file's metadata.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes: Vec<(&String, &Tensor, Vec<u8>)> = self
            .entries
            .iter()
            .map(|(key, tensor)| (key, tensor, tensor.to_bytes()))
            .collect();

        let views = bytes
            .iter()
            .map(|(key, tensor, data)| {
                let view = TensorView::new(tensor.dtype().into(), tensor.shape().to_vec(), data)?;
                Ok((key.as_str(), view))
            })
            .collect::<Result<Vec<_>>>()?;

        let batch_size = serde_json::to_string(&self.batch_size)
            .map_err(|e| RecordErr::Metadata(e.to_string()))?;
        let metadata = Some(HashMap::from([(BATCH_SIZE_KEY.to_string(), batch_size)]));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        safetensors::serialize_to_file(views, &metadata, path)?;
        debug!(entries = self.entries.len(); "record written to {}", path.display());
        Ok(())
    }

    /// Reads a record previously written by `Record::save`.
    pub fn load(path: impl AsRef<Path>) -> Result<Record> {
        let buffer = fs::read(path)?;
        let (_, metadata) = SafeTensors::read_metadata(&buffer)?;
        let batch_size = metadata
            .metadata()
            .as_ref()
            .and_then(|m| m.get(BATCH_SIZE_KEY))
            .ok_or_else(|| RecordErr::Metadata(format!("missing {BATCH_SIZE_KEY:?}")))?;
        let batch_size: Vec<usize> =
            serde_json::from_str(batch_size).map_err(|e| RecordErr::Metadata(e.to_string()))?;

        let tensors = SafeTensors::deserialize(&buffer)?;
        let mut record = Record::new(batch_size);
        for (key, view) in tensors.tensors() {
            let tensor = Tensor::from_bytes(&key, view.dtype(), view.shape(), view.data())?;
            record.set(key, tensor)?;
        }

        Ok(record)
    }
}

fn dtype_err(key: &str, tensor: &Tensor, expected: DType) -> RecordErr {
    RecordErr::DtypeMismatch {
        key: key.to_string(),
        got: tensor.dtype(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, array};

    use super::*;

    fn sample_record(offset: f32) -> Record {
        let mut record = Record::new([2]);
        record
            .set("observation", array![[offset, 1.], [2., 3.]].into_dyn())
            .unwrap();
        record
            .set("steps", ArrayD::<i64>::zeros(IxDyn(&[2, 1])))
            .unwrap();
        record
    }

    #[test]
    fn set_checks_batch_size() {
        let mut record = Record::new([3]);
        let err = record
            .set("x", ArrayD::<f32>::zeros(IxDyn(&[2, 4])))
            .unwrap_err();
        assert!(matches!(err, RecordErr::BatchMismatch { .. }));

        let err = Record::new([3, 2])
            .set("x", ArrayD::<f32>::zeros(IxDyn(&[3])))
            .unwrap_err();
        assert!(matches!(err, RecordErr::BatchMismatch { .. }));
    }

    #[test]
    fn set_in_place_keeps_shape() {
        let mut record = sample_record(0.);
        assert!(record.set_("observation", ArrayD::<f32>::zeros(IxDyn(&[2, 3]))).is_err());
        assert!(record.set_("steps", ArrayD::<f32>::zeros(IxDyn(&[2, 1]))).is_err());
        assert!(record.set_("missing", ArrayD::<f32>::zeros(IxDyn(&[2]))).is_err());

        record
            .set_("steps", ArrayD::<i64>::ones(IxDyn(&[2, 1])))
            .unwrap();
        assert_eq!(record.get_i64("steps").unwrap().sum(), 2);
    }

    #[test]
    fn typed_getters_check_dtype() {
        let record = sample_record(0.);
        assert!(record.get_f32("observation").is_ok());
        assert!(matches!(
            record.get_f32("steps"),
            Err(RecordErr::DtypeMismatch { .. })
        ));
        assert!(matches!(
            record.get_u8("nope"),
            Err(RecordErr::MissingKey(_))
        ));
    }

    #[test]
    fn select_copies_only_requested_keys() {
        let record = sample_record(0.);
        let selected = record.select(&["steps"]).unwrap();
        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["steps"]);
        assert_eq!(selected.batch_size(), &[2]);
        assert!(record.select(&["missing"]).is_err());
    }

    #[test]
    fn stack_prepends_batch_dim() {
        let stacked = Record::stack(&[sample_record(0.), sample_record(5.)]).unwrap();
        assert_eq!(stacked.batch_size(), &[2, 2]);
        assert_eq!(stacked.get_f32("observation").unwrap().shape(), &[2, 2, 2]);
        assert_eq!(stacked.get_f32("observation").unwrap()[[1, 0, 0]], 5.);

        assert!(matches!(Record::stack(&[]), Err(RecordErr::EmptyStack)));

        let mut other = sample_record(0.);
        other.remove("steps");
        assert!(matches!(
            Record::stack(&[sample_record(0.), other]),
            Err(RecordErr::KeysMismatch { .. })
        ));
    }

    #[test]
    fn stack_rejects_different_batch_sizes() {
        assert!(matches!(
            Record::stack(&[Record::new([2]), Record::new([3])]),
            Err(RecordErr::StackBatchMismatch { .. })
        ));

        let steps = ArrayD::<i64>::zeros(IxDyn(&[2, 1]));
        let mut flat = Record::new([2]);
        flat.set("steps", steps.clone()).unwrap();
        let mut nested = Record::new([2, 1]);
        nested.set("steps", steps).unwrap();

        let err = Record::stack(&[flat, nested]).unwrap_err();
        assert!(matches!(
            err,
            RecordErr::StackBatchMismatch { got, expected } if got == [2, 1] && expected == [2]
        ));
    }
}
