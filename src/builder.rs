use log::debug;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    EGreedy, ExplorationConfig, OuWrapper, Policy, RecordRecorder, Result, VideoRecorder,
    VideoSink,
};

/// Builds exploration wrappers and recorders following an `ExplorationConfig`.
///
/// Every built wrapper owns its rng. With a seed, the n-th wrapper built is seeded with
/// `seed + n`, so runs are reproducible while wrappers don't share a noise stream.
pub struct ExplorationBuilder {
    config: ExplorationConfig,
    built: u64,
}

impl ExplorationBuilder {
    /// Creates a new `ExplorationBuilder`.
    ///
    /// # Arguments
    /// * `config` - The configuration to build from.
    pub fn new(config: ExplorationConfig) -> Self {
        Self { config, built: 0 }
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    /// Wraps `policy` with epsilon-greedy exploration.
    pub fn egreedy<P: Policy>(&mut self, policy: P) -> Result<EGreedy<P>> {
        let schedule = self.config.egreedy.schedule()?;
        let rng = self.next_rng();
        Ok(EGreedy::new(policy, schedule, rng))
    }

    /// Wraps `policy` with Ornstein-Uhlenbeck exploration.
    pub fn ou<P: Policy>(&mut self, policy: P) -> Result<OuWrapper<P>> {
        let config = &self.config.ou;
        let schedule = config.schedule()?;
        let (params, safe) = (config.params, config.safe);
        let rng = self.next_rng();

        Ok(OuWrapper::new(policy, params, schedule, rng)?.with_safe(safe))
    }

    /// Creates a video recorder writing to `sink`.
    pub fn video_recorder<S: VideoSink>(&self, sink: S) -> Result<VideoRecorder<S>> {
        let config = &self.config.video;
        let recorder = VideoRecorder::new(sink, config.tag.clone(), config.skip()?)?
            .with_keys(config.keys()?.iter().cloned())
            .with_fps(config.fps);

        Ok(recorder)
    }

    pub fn record_recorder(&self) -> Result<RecordRecorder> {
        let config = &self.config.recorder;
        let recorder = RecordRecorder::new(config.out_file_base.clone(), config.skip()?)
            .with_skip_reset(config.skip_reset)
            .with_keys(config.keys.iter().cloned());

        Ok(recorder)
    }

    fn next_rng(&mut self) -> StdRng {
        let seed = self.config.seed.map(|seed| seed.wrapping_add(self.built));
        self.built += 1;
        debug!(seeded = seed.is_some(); "generating wrapper rng");
        self.generate_rng(seed)
    }

    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use ndarray::{Array2, ArrayD, IxDyn};
    use record::{ActionSpec, Record};

    use super::*;
    use crate::{ClipFileSink, ExplorationCtx, LinearActor};

    fn actor() -> LinearActor {
        LinearActor::new(Array2::zeros((3, 2)), ActionSpec::uniform(-1., 1., 2).unwrap()).unwrap()
    }

    fn run_ou(seed: u64) -> ArrayD<f32> {
        let config = ExplorationConfig::from_json_str(&format!(r#"{{ "seed": {seed} }}"#)).unwrap();
        let mut builder = ExplorationBuilder::new(config);
        let mut policy = builder.ou(actor()).unwrap();

        let mut record = Record::new([4]);
        record
            .set("observation", ArrayD::<f32>::ones(IxDyn(&[4, 3])))
            .unwrap();
        policy
            .forward(&mut record, &ExplorationCtx::random())
            .unwrap();
        record.get_f32("action").unwrap().clone()
    }

    #[test]
    fn seeded_builders_are_reproducible() {
        assert_eq!(run_ou(3), run_ou(3));
        assert_ne!(run_ou(3), run_ou(4));
    }

    #[test]
    fn builds_wrappers_from_config() {
        let json = r#"{ "egreedy": { "eps_init": 0.5 }, "ou": { "safe": false } }"#;
        let mut builder = ExplorationBuilder::new(ExplorationConfig::from_json_str(json).unwrap());

        let egreedy = builder.egreedy(actor()).unwrap();
        assert_eq!(egreedy.eps(), 0.5);

        let ou = builder.ou(actor()).unwrap();
        assert_eq!(ou.eps(), 1.0);
        assert_eq!(ou.process().params().theta, 0.15);
    }

    #[test]
    fn builds_recorders_from_config() {
        let mut config = ExplorationConfig::default();
        config.video.dir = env::temp_dir()
            .join(format!("builder-videos-{}", std::process::id()))
            .to_string_lossy()
            .into_owned();
        let builder = ExplorationBuilder::new(config);

        let video = builder
            .video_recorder(ClipFileSink::new(&builder.config().video.dir))
            .unwrap();
        assert_eq!(video.buffered(), 0);

        let records = builder.record_recorder().unwrap();
        assert_eq!(records.iteration(), 0);
    }

    #[test]
    fn video_recorder_reads_every_configured_key() {
        let mut config = ExplorationConfig::default();
        config.video.dir = env::temp_dir()
            .join(format!("builder-keys-{}", std::process::id()))
            .to_string_lossy()
            .into_owned();
        config.video.skip = 1;
        config.video.keys = vec!["a".into(), "b".into()];
        let builder = ExplorationBuilder::new(config);
        let sink = ClipFileSink::new(&builder.config().video.dir);
        let mut video = builder.video_recorder(sink).unwrap();

        let mut frame = Record::new(Vec::<usize>::new());
        for key in builder.config().video.keys().unwrap() {
            frame
                .set(key, ArrayD::<f32>::zeros(IxDyn(&[4, 4, 3])))
                .unwrap();
        }
        video.apply(&frame).unwrap();
        assert_eq!(video.buffered(), 2);
        video.dump(None).unwrap();

        let mut config = builder.config().clone();
        config.video.keys.clear();
        let builder = ExplorationBuilder::new(config);
        let sink = ClipFileSink::new(&builder.config().video.dir);
        assert!(matches!(
            builder.video_recorder(sink),
            Err(crate::ExploreErr::Config(_))
        ));
    }
}
