use std::{env, io};

use exploration::{
    ClipFileSink, ExplorationBuilder, ExplorationConfig, ExplorationCtx, ExploreErr, LinearActor,
    Policy, Reset,
};
use log::{info, warn};
use ndarray::{Array, Array2, ArrayD, Axis, IxDyn};
use ndarray_rand::RandomExt;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use record::{ActionSpec, Record};

const NUM_ENVS: usize = 4;
const OBS_DIM: usize = 3;
const ACTION_DIM: usize = 2;
const FRAME_SIZE: usize = 16;
const STEPS: usize = 64;
const DONE_PROB: f64 = 0.05;

fn main() -> io::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => ExplorationConfig::from_json_file(&path)?,
        None => ExplorationConfig::default(),
    };
    info!("rollout config: {config:?}");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut builder = ExplorationBuilder::new(config);
    let spec = ActionSpec::uniform(-1., 1., ACTION_DIM).map_err(ExploreErr::from)?;
    let actor = LinearActor::random(OBS_DIM, spec, &mut rng)?;
    let mut policy = builder.ou(actor)?;

    let sink = ClipFileSink::new(&builder.config().video.dir);
    let mut video = builder.video_recorder(sink)?;
    let mut records = builder.record_recorder()?;
    let pixels_keys = builder.config().video.keys()?.to_vec();

    let mut observation =
        ArrayD::<f32>::random_using(IxDyn(&[NUM_ENVS, OBS_DIM]), StandardNormal, &mut rng);
    let mut state: Option<Record> = None;
    let mut reset = Reset::All;

    for step in 0..STEPS {
        let mut record = state.take().unwrap_or_else(|| Record::new([NUM_ENVS]));
        record
            .set("observation", observation.clone())
            .map_err(ExploreErr::from)?;

        let ctx = ExplorationCtx::random().with_reset(reset);
        policy.forward(&mut record, &ctx)?;

        let action = record
            .get_f32("action")
            .map_err(ExploreErr::from)?
            .clone();
        let reward = action.mapv(|a| -a * a).sum_axis(Axis(1)).insert_axis(Axis(1));
        let done: Vec<bool> = (0..NUM_ENVS).map(|_| rng.random_bool(DONE_PROB)).collect();
        record
            .set("reward", reward.into_dyn())
            .map_err(ExploreErr::from)?;

        let pixels = render(&observation);
        let mut frame = Record::new(Vec::<usize>::new());
        for key in &pixels_keys {
            frame
                .set(key, pixels.clone())
                .map_err(ExploreErr::from)?;
        }
        video.apply(&frame)?;
        records.apply(&record)?;

        policy.step(NUM_ENVS)?;
        info!(step = step, eps = policy.eps(); "rollout step done");

        observation =
            ArrayD::<f32>::random_using(IxDyn(&[NUM_ENVS, OBS_DIM]), StandardNormal, &mut rng);
        reset = Reset::Mask(done);
        state = Some(record);
    }

    video.dump(None)?;
    match records.dump(None) {
        Ok(path) => info!("records written to {}", path.display()),
        Err(e) => warn!("no records written: {e}"),
    }

    Ok(())
}

/// Draws the first environment's observation as a `[H, W, 3]` frame.
fn render(observation: &ArrayD<f32>) -> ArrayD<f32> {
    let levels: Vec<f32> = observation
        .index_axis(Axis(0), 0)
        .iter()
        .map(|v| (v.tanh() + 1.) * 127.5)
        .collect();

    let row = Array2::from_shape_fn((FRAME_SIZE, 3), |(w, c)| {
        levels[c % levels.len()] * w as f32 / FRAME_SIZE as f32
    });
    Array::from_shape_fn((FRAME_SIZE, FRAME_SIZE, 3), |(_, w, c)| row[[w, c]]).into_dyn()
}
