use std::{env, num::NonZeroUsize, path::PathBuf};

use exploration::{
    EGreedy, EpsilonSchedule, ExplorationBuilder, ExplorationConfig, ExplorationCtx, LinearActor,
    NOISE_KEY, OuParams, OuWrapper, Policy, RecordRecorder, Reset, STEPS_KEY,
};
use ndarray::{ArrayD, IxDyn};
use rand::{SeedableRng, rngs::StdRng};
use record::{ActionSpec, Record};

fn scratch(name: &str) -> PathBuf {
    env::temp_dir()
        .join(format!("exploration-it-{}", std::process::id()))
        .join(name)
}

fn actor(rng: &mut StdRng) -> LinearActor {
    let spec = ActionSpec::uniform(-1., 1., 2).unwrap();
    LinearActor::random(3, spec, rng).unwrap()
}

fn observed(batch: usize) -> Record {
    observed_with(batch, 1.)
}

fn observed_with(batch: usize, value: f32) -> Record {
    let mut record = Record::new([batch]);
    record
        .set("observation", ArrayD::from_elem(IxDyn(&[batch, 3]), value))
        .unwrap();
    record
}

#[test]
fn ou_rollout_keeps_actions_in_bounds_and_counts_steps() {
    let mut rng = StdRng::seed_from_u64(42);
    let params = OuParams {
        sigma: 50.,
        ..OuParams::default()
    };
    let schedule = EpsilonSchedule::new(1., 0.1, 100).unwrap();
    let mut policy = OuWrapper::new(actor(&mut rng), params, schedule, rng).unwrap();

    let mut record = observed(5);
    for _ in 0..10 {
        policy
            .forward(&mut record, &ExplorationCtx::random())
            .unwrap();
        policy.step(5).unwrap();
    }

    let action = record.get_f32("action").unwrap();
    assert!(policy.spec().is_in(action));
    assert!(record.get_i64(STEPS_KEY).unwrap().iter().all(|&n| n == 10));

    let mut mask = vec![false; 5];
    mask[2] = true;
    let ctx = ExplorationCtx::random().with_reset(Reset::Mask(mask));
    policy.forward(&mut record, &ctx).unwrap();

    let steps = record.get_i64(STEPS_KEY).unwrap();
    assert_eq!(steps.iter().copied().collect::<Vec<_>>(), vec![11, 11, 1, 11, 11]);
    assert!((policy.eps() - 0.55).abs() < 1e-5);
}

#[test]
fn stacked_wrappers_explore_only_in_random_mode() {
    let mut rng = StdRng::seed_from_u64(7);
    let inner = actor(&mut rng);
    let ou = OuWrapper::new(
        inner,
        OuParams::default(),
        EpsilonSchedule::new(1., 1., 1).unwrap(),
        StdRng::seed_from_u64(1),
    )
    .unwrap();
    let mut policy = EGreedy::new(
        ou,
        EpsilonSchedule::new(0., 0., 1).unwrap(),
        StdRng::seed_from_u64(2),
    );

    let mut deterministic = observed_with(2, 0.);
    policy
        .forward(&mut deterministic, &ExplorationCtx::deterministic())
        .unwrap();
    assert!(!deterministic.contains(NOISE_KEY));

    let mut random = observed_with(2, 0.);
    policy
        .forward(&mut random, &ExplorationCtx::random())
        .unwrap();
    assert!(random.contains(NOISE_KEY));
    assert_ne!(
        random.get_f32("action").unwrap(),
        deterministic.get_f32("action").unwrap()
    );
}

#[test]
fn ou_rejects_policies_writing_its_keys() {
    let mut rng = StdRng::seed_from_u64(0);
    let inner = actor(&mut rng).with_keys("observation", NOISE_KEY);
    let result = OuWrapper::new(
        inner,
        OuParams::default(),
        EpsilonSchedule::new(1., 0.1, 10).unwrap(),
        rng,
    );
    assert!(result.is_err());
}

#[test]
fn recorded_rollout_is_saved_stacked() {
    let base = scratch("rollout").to_string_lossy().into_owned();
    let mut recorder = RecordRecorder::new(base, NonZeroUsize::new(2).unwrap());
    let mut rng = StdRng::seed_from_u64(3);
    let mut policy = actor(&mut rng);

    for _ in 0..8 {
        let mut record = observed(3);
        policy
            .forward(&mut record, &ExplorationCtx::random())
            .unwrap();
        recorder.apply(&record).unwrap();
    }

    let path = recorder.dump(Some("train")).unwrap();
    let saved = Record::load(&path).unwrap();
    assert_eq!(saved.batch_size(), &[3, 3]);
    assert_eq!(saved.get_f32("action").unwrap().shape(), &[3, 3, 2]);
}

#[test]
fn config_file_drives_builder() {
    let path = scratch("config.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{ "seed": 11, "egreedy": { "eps_init": 1.0, "eps_end": 1.0 } }"#,
    )
    .unwrap();

    let config = ExplorationConfig::from_json_file(&path).unwrap();
    let mut builder = ExplorationBuilder::new(config);
    let mut rng = StdRng::seed_from_u64(5);
    let mut policy = builder.egreedy(actor(&mut rng)).unwrap();

    let mut record = observed(16);
    policy
        .forward(&mut record, &ExplorationCtx::random())
        .unwrap();
    assert!(policy.spec().is_in(record.get_f32("action").unwrap()));
    assert_eq!(policy.eps(), 1.0);

    assert_eq!(policy.policy().weights().shape(), &[3, 2]);
}
