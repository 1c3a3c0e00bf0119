use std::{env, fs, path::PathBuf};

use ndarray::{ArrayD, IxDyn, array};
use rand::{SeedableRng, rngs::StdRng};
use record::{ActionSpec, DType, Record, Tensor};

fn scratch_path(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("record-it-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn save_then_load_preserves_entries() {
    let mut rng = StdRng::seed_from_u64(3);
    let spec = ActionSpec::uniform(-2., 2., 3).unwrap();

    let mut record = Record::new([4]);
    record.set("action", spec.rand(&[4], &mut rng)).unwrap();
    record
        .set("_ou_steps", ArrayD::<i64>::from_elem(IxDyn(&[4, 1]), 7))
        .unwrap();
    record
        .set("pixels", ArrayD::<u8>::from_elem(IxDyn(&[4, 2, 2, 3]), 200))
        .unwrap();

    let path = scratch_path("roundtrip.safetensors");
    record.save(&path).unwrap();
    let loaded = Record::load(&path).unwrap();

    assert_eq!(loaded, record);
    assert_eq!(loaded.batch_size(), &[4]);
    assert_eq!(loaded.get("pixels").unwrap().dtype(), DType::U8);
}

#[test]
fn stacked_snapshots_can_be_persisted() {
    let snapshots: Vec<Record> = (0..3)
        .map(|t| {
            let mut record = Record::new(Vec::<usize>::new());
            record
                .set("reward", array![t as f32].into_dyn())
                .unwrap();
            record
        })
        .collect();

    let stacked = Record::stack(&snapshots).unwrap();
    let path = scratch_path("stacked.safetensors");
    stacked.save(&path).unwrap();

    let loaded = Record::load(&path).unwrap();
    assert_eq!(loaded.batch_size(), &[3]);
    assert_eq!(
        loaded.get("reward").unwrap(),
        &Tensor::from(array![[0.0_f32], [1.0], [2.0]].into_dyn())
    );
}

#[test]
fn load_missing_file_fails() {
    let path = scratch_path("does-not-exist.safetensors");
    assert!(Record::load(path).is_err());
}
