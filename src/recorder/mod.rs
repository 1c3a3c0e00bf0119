mod sink;
mod trajectory;
mod video;

pub use sink::{ClipFileSink, VideoSink};
pub use trajectory::RecordRecorder;
pub use video::VideoRecorder;

/// Joins a tag with an optional suffix, `tag_suffix`.
fn tagged(tag: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{tag}_{suffix}"),
        None => tag.to_string(),
    }
}
