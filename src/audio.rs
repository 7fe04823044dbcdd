use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{PixelioError, PixelioResult};

/// Playable audio handle backed by a remuxed container file. The temp
/// directory holding the file lives as long as the clip does.
pub struct AudioClip {
    path: PathBuf,
    duration_sec: f64,
    _tmp: TempDir,
}

impl AudioClip {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_sec(&self) -> f64 {
        self.duration_sec
    }
}

/// Extracts a playable audio clip from container bytes.
///
/// Web-sourced containers often carry broken timing metadata, so the bytes
/// are remuxed (`-c copy -fflags +genpts`) before the duration is probed.
#[cfg(feature = "media-ffmpeg")]
#[tracing::instrument(skip(video_bytes))]
pub fn extract_audio(video_bytes: &[u8]) -> PixelioResult<AudioClip> {
    let tmp = tempfile::tempdir()
        .map_err(|e| PixelioError::io(format!("failed to create temp directory: {e}")))?;

    let input_path = tmp.path().join("input.video");
    std::fs::write(&input_path, video_bytes)
        .map_err(|e| PixelioError::io(format!("failed to write temp video: {e}")))?;

    let meta = crate::video::probe_video(&input_path)?;
    if !meta.has_audio {
        return Err(PixelioError::decode("container has no audio stream"));
    }

    let fixed_path = tmp
        .path()
        .join(format!("fixed{}", container_extension(&meta.codec_name)));

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(&input_path)
        .args(["-c:v", "copy", "-c:a", "copy", "-fflags", "+genpts"])
        .arg(&fixed_path)
        .output()
        .map_err(|e| PixelioError::io(format!("failed to run ffmpeg for audio remux: {e}")))?;
    if !out.status.success() {
        return Err(PixelioError::decode(format!(
            "ffmpeg audio remux failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let duration_sec = crate::video::probe_video(&fixed_path)?.duration_sec;

    Ok(AudioClip {
        path: fixed_path,
        duration_sec,
        _tmp: tmp,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn extract_audio(_video_bytes: &[u8]) -> PixelioResult<AudioClip> {
    Err(PixelioError::decode(
        "video/audio support requires the 'media-ffmpeg' feature",
    ))
}

/// Matroska handles h264-family streams; everything else we see from the web
/// is vp8/vp9/opus and belongs in webm.
fn container_extension(codec_name: &str) -> &'static str {
    if codec_name.contains("h264") {
        ".mkv"
    } else {
        ".webm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_extension_follows_codec() {
        assert_eq!(container_extension("h264"), ".mkv");
        assert_eq!(container_extension("libx264-ish h264"), ".mkv");
        assert_eq!(container_extension("vp9"), ".webm");
        assert_eq!(container_extension(""), ".webm");
    }
}
