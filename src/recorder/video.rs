use std::num::NonZeroUsize;

use log::{debug, warn};
use ndarray::{Array3, ArrayView3, ArrayViewD, Axis, Ix2, Ix3};
use record::{DType, Record, RecordErr, Tensor};

use super::{VideoSink, tagged};
use crate::{ExploreErr, Result};

const DEFAULT_KEY: &str = "next_pixels";
const DEFAULT_FPS: u32 = 6;

/// Records a series of observations and writes them as a clip to a `VideoSink` when dumped.
pub struct VideoRecorder<S> {
    sink: S,
    tag: String,
    keys: Vec<String>,
    skip: NonZeroUsize,
    fps: u32,
    iter: usize,
    count: usize,
    frames: Vec<Array3<u8>>,
}

impl<S: VideoSink> VideoRecorder<S> {
    /// Creates a new `VideoRecorder` reading `"next_pixels"` at 6 fps.
    ///
    /// # Arguments
    /// * `sink` - Where the clips are written.
    /// * `tag` - The clip tag.
    /// * `skip` - Only every `skip`-th frame is kept.
    ///
    /// # Returns
    /// An error if the sink fails its capability check.
    pub fn new(mut sink: S, tag: impl Into<String>, skip: NonZeroUsize) -> Result<Self> {
        sink.probe()?;

        Ok(Self {
            sink,
            tag: tag.into(),
            keys: vec![DEFAULT_KEY.to_string()],
            skip,
            fps: DEFAULT_FPS,
            iter: 0,
            count: 0,
            frames: Vec::new(),
        })
    }

    /// Changes the record keys frames are read from.
    pub fn with_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Feeds a single frame.
    ///
    /// # Arguments
    /// * `frame` - A `[H, W]` grayscale or `[H, W, 3]` color frame.
    ///
    /// # Returns
    /// An error if the frame has any other shape, in which case it's not counted.
    pub fn observe(&mut self, frame: ArrayViewD<f32>) -> Result<()> {
        let to_u8 = |v: f32| v as u8;
        let chw = match frame.shape() {
            [_, _] => frame
                .into_dimensionality::<Ix2>()
                .map_err(RecordErr::from)?
                .insert_axis(Axis(0))
                .mapv(to_u8),
            [_, _, 3] => frame
                .into_dimensionality::<Ix3>()
                .map_err(RecordErr::from)?
                .permuted_axes([2, 0, 1])
                .mapv(to_u8),
            shape => {
                return Err(ExploreErr::InvalidFrame {
                    shape: shape.to_vec(),
                });
            }
        };

        self.count += 1;
        if self.count % self.skip.get() == 0 {
            self.frames.push(chw);
        }

        Ok(())
    }

    /// Feeds the frames stored under the recorder's keys, leaving the record untouched.
    pub fn apply(&mut self, record: &Record) -> Result<()> {
        for i in 0..self.keys.len() {
            match record.get(&self.keys[i])? {
                Tensor::F32(frame) => self.observe(frame.view())?,
                Tensor::U8(frame) => self.observe(frame.mapv(f32::from).view())?,
                other => {
                    return Err(RecordErr::DtypeMismatch {
                        key: self.keys[i].clone(),
                        got: other.dtype(),
                        expected: DType::U8,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    /// Writes the buffered frames to the sink as a single `[1, T, C, H, W]` clip.
    ///
    /// # Arguments
    /// * `suffix` - An optional suffix appended to the tag.
    pub fn dump(&mut self, suffix: Option<&str>) -> Result<()> {
        if self.frames.is_empty() {
            warn!("video recorder {:?} dumped with no frames", self.tag);
            return Err(ExploreErr::EmptyBuffer {
                recorder: "video recorder",
            });
        }

        let tag = tagged(&self.tag, suffix);
        let views: Vec<ArrayView3<u8>> = self.frames.iter().map(|f| f.view()).collect();
        let clip = ndarray::stack(Axis(0), &views)
            .map_err(RecordErr::from)?
            .insert_axis(Axis(0));

        self.sink.add_video(&tag, clip.view(), self.iter, self.fps)?;
        debug!(iter = self.iter, frames = self.frames.len(); "video {tag:?} dumped");

        self.iter += 1;
        self.count = 0;
        self.frames.clear();
        Ok(())
    }

    /// Returns the amount of buffered frames.
    pub fn buffered(&self) -> usize {
        self.frames.len()
    }

    /// Returns the amount of frames seen since the last dump.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns the amount of clips written so far.
    pub fn iteration(&self) -> usize {
        self.iter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
