//! ffmpeg command lines for the three render steps.
//!
//! A job renders each scene image into a video segment, concatenates the
//! segments with the concat demuxer, then muxes the audio track on top.
//! Paths are passed straight to ffmpeg as separate argv entries, never
//! through a shell.

use std::path::{Path, PathBuf};

/// Scale into the target frame preserving aspect ratio, letterboxing the
/// remainder with black.
pub fn scene_filter(w: u32, h: u32) -> String {
    format!(
        "scale=w={w}:h={h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"
    )
}

/// Render one still image into a `seconds`-long H.264 segment.
pub fn segment_args(
    image: &Path,
    segment: &Path,
    w: u32,
    h: u32,
    fps: u32,
    seconds: f64,
) -> Vec<String> {
    vec![
        "-y".into(),
        "-loop".into(),
        "1".into(),
        "-t".into(),
        format!("{seconds}"),
        "-r".into(),
        format!("{fps}"),
        "-i".into(),
        image.to_string_lossy().into_owned(),
        "-vf".into(),
        scene_filter(w, h),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-movflags".into(),
        "+faststart".into(),
        segment.to_string_lossy().into_owned(),
    ]
}

/// Concatenate the listed segments without re-encoding.
pub fn concat_args(list: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Mux the audio track onto the concatenated video, trimming to the shorter
/// of the two.
pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-i".into(),
        audio.to_string_lossy().into_owned(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-shortest".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Concat demuxer input list, one `file '<path>'` line per segment.
pub fn concat_list(segments: &[PathBuf]) -> String {
    let mut list = String::new();
    for segment in segments {
        list.push_str(&format!("file '{}'\n", segment.to_string_lossy()));
    }
    list
}
