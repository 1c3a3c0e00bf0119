use std::{collections::HashMap, fs, path::PathBuf};

use log::debug;
use ndarray::ArrayView5;
use safetensors::{Dtype, tensor::TensorView};

use crate::{ExploreErr, Result};

/// A destination for recorded clips.
pub trait VideoSink {
    /// Checks once, before any frame is recorded, that the sink is able to write videos.
    fn probe(&mut self) -> Result<()> {
        Ok(())
    }

    /// Writes a clip.
    ///
    /// # Arguments
    /// * `tag` - The name of the clip.
    /// * `clip` - A `[1, T, C, H, W]` clip of 8-bit frames.
    /// * `global_step` - The iteration the clip belongs to.
    /// * `fps` - The playback rate.
    fn add_video(
        &mut self,
        tag: &str,
        clip: ArrayView5<u8>,
        global_step: usize,
        fps: u32,
    ) -> Result<()>;
}

/// Writes each clip as a raw `u8` tensor to `<dir>/<tag>_<global_step>.safetensors`.
#[derive(Debug, Clone)]
pub struct ClipFileSink {
    dir: PathBuf,
}

impl ClipFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn clip_path(&self, tag: &str, global_step: usize) -> PathBuf {
        self.dir.join(format!("{tag}_{global_step}.safetensors"))
    }
}

impl VideoSink for ClipFileSink {
    fn probe(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            ExploreErr::SinkUnavailable(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let meta = fs::metadata(&self.dir)?;
        if !meta.is_dir() || meta.permissions().readonly() {
            return Err(ExploreErr::SinkUnavailable(format!(
                "{} is not a writable directory",
                self.dir.display()
            )));
        }

        Ok(())
    }

    fn add_video(
        &mut self,
        tag: &str,
        clip: ArrayView5<u8>,
        global_step: usize,
        fps: u32,
    ) -> Result<()> {
        let path = self.clip_path(tag, global_step);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data: Vec<u8> = clip.iter().copied().collect();
        let view = TensorView::new(Dtype::U8, clip.shape().to_vec(), &data)
            .map_err(record::RecordErr::from)?;
        let metadata = Some(HashMap::from([("fps".to_string(), fps.to_string())]));

        safetensors::serialize_to_file([("video", view)], &metadata, &path)
            .map_err(record::RecordErr::from)?;
        debug!(global_step = global_step; "clip written to {}", path.display());
        Ok(())
    }
}
