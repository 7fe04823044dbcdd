use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use crate::{
    error::{PixelioError, PixelioResult},
    frame::Frame,
};

/// Container/stream metadata as reported by ffprobe.
#[derive(Clone, Debug, serde::Serialize)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_sec: f64,
    pub codec_name: String,
    pub has_audio: bool,
}

impl VideoMeta {
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(feature = "media-ffmpeg")]
#[tracing::instrument]
pub fn probe_video(source_path: &Path) -> PixelioResult<VideoMeta> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| PixelioError::io(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(PixelioError::decode(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| PixelioError::decode(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| PixelioError::decode("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| PixelioError::decode("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| PixelioError::decode("missing video height from ffprobe"))?;
    let codec_name = video_stream.codec_name.clone().unwrap_or_default();

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| PixelioError::decode("invalid video r_frame_rate"))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoMeta {
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
        codec_name,
        has_audio,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_source_path: &Path) -> PixelioResult<VideoMeta> {
    Err(PixelioError::decode(
        "video/audio support requires the 'media-ffmpeg' feature",
    ))
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

/// Lazy, forward-only stream of decoded rgb24 frames. Frames are pulled from
/// an ffmpeg child process as they are read; reopening is the only way to
/// restart.
pub struct VideoReader {
    meta: VideoMeta,
    child: Child,
    stdout: ChildStdout,
    finished: bool,
    // Keeps the backing file alive for byte-sourced readers.
    _tmp: Option<tempfile::TempDir>,
}

impl VideoReader {
    #[cfg(feature = "media-ffmpeg")]
    pub fn open(source_path: &Path) -> PixelioResult<Self> {
        let meta = probe_video(source_path)?;
        if meta.width == 0 || meta.height == 0 {
            return Err(PixelioError::decode(
                "video frame size is zero (invalid source dimensions)",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(source_path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                PixelioError::io(format!("failed to spawn ffmpeg for video decode: {e}"))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PixelioError::io("failed to open ffmpeg stdout (unexpected)"))?;

        Ok(Self {
            meta,
            child,
            stdout,
            finished: false,
            _tmp: None,
        })
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    pub fn open(_source_path: &Path) -> PixelioResult<Self> {
        Err(PixelioError::decode(
            "video/audio support requires the 'media-ffmpeg' feature",
        ))
    }

    /// Opens a reader over in-memory container bytes by staging them in a
    /// temp file (ffmpeg needs a seekable input for most containers).
    #[cfg(feature = "media-ffmpeg")]
    pub fn from_bytes(video_bytes: &[u8]) -> PixelioResult<Self> {
        let tmp = tempfile::tempdir()
            .map_err(|e| PixelioError::io(format!("failed to create temp directory: {e}")))?;
        let path = tmp.path().join("input.video");
        std::fs::write(&path, video_bytes)
            .map_err(|e| PixelioError::io(format!("failed to write temp video: {e}")))?;

        let mut reader = Self::open(&path)?;
        reader._tmp = Some(tmp);
        Ok(reader)
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    pub fn from_bytes(_video_bytes: &[u8]) -> PixelioResult<Self> {
        Err(PixelioError::decode(
            "video/audio support requires the 'media-ffmpeg' feature",
        ))
    }

    pub fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    fn frame_len(&self) -> usize {
        self.meta.width as usize * self.meta.height as usize * 3
    }

    /// Fills `buf` from the pipe. Returns the byte count actually read,
    /// which is short only at end of stream.
    fn read_frame_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.stdout.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    fn finish(&mut self) -> PixelioResult<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| PixelioError::io(format!("failed to wait for ffmpeg: {e}")))?;
        if !status.success() {
            return Err(PixelioError::decode(format!(
                "ffmpeg video decode exited with status {status}"
            )));
        }
        Ok(())
    }
}

impl Iterator for VideoReader {
    type Item = PixelioResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buf = vec![0u8; self.frame_len()];
        let filled = match self.read_frame_bytes(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                self.finished = true;
                return Some(Err(PixelioError::io(format!(
                    "failed to read frame from ffmpeg: {e}"
                ))));
            }
        };

        if filled == 0 {
            return match self.finish() {
                Ok(()) => None,
                Err(e) => Some(Err(e)),
            };
        }
        if filled < buf.len() {
            self.finished = true;
            return Some(Err(PixelioError::decode(format!(
                "truncated video frame: got {filled} bytes, expected {}",
                buf.len()
            ))));
        }

        Some(Frame::from_raw(self.meta.width, self.meta.height, 3, buf))
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> PixelioResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PixelioError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(PixelioError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // We target yuv420p output for maximum player compatibility.
            return Err(PixelioError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

pub fn default_mp4_config(
    out_path: impl Into<PathBuf>,
    width: u32,
    height: u32,
    fps: u32,
) -> EncodeConfig {
    EncodeConfig {
        width,
        height,
        fps,
        out_path: out_path.into(),
        overwrite: true,
    }
}

/// Encodes rgb24 frames into an mp4 through an ffmpeg child process.
pub struct VideoWriter {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl VideoWriter {
    #[cfg(feature = "media-ffmpeg")]
    pub fn new(cfg: EncodeConfig) -> PixelioResult<Self> {
        cfg.validate()?;
        crate::store::ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(PixelioError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(PixelioError::io(
                "ffmpeg is required for mp4 encoding, but was not found on PATH",
            ));
        }

        // We intentionally use the system `ffmpeg` binary rather than
        // `ffmpeg-next` to avoid native FFmpeg dev header/lib requirements.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if cfg.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            PixelioError::io(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PixelioError::io("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            cfg,
            child,
            stdin: Some(stdin),
        })
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    pub fn new(_cfg: EncodeConfig) -> PixelioResult<Self> {
        Err(PixelioError::encode(
            "video/audio support requires the 'media-ffmpeg' feature",
        ))
    }

    pub fn encode_frame(&mut self, frame: &Frame) -> PixelioResult<()> {
        if frame.channels != 3 {
            return Err(PixelioError::validation(format!(
                "video frames must be rgb (3 channels), got {}",
                frame.channels
            )));
        }
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(PixelioError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(PixelioError::encode("video writer is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&frame.data).map_err(|e| {
            PixelioError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;

        Ok(())
    }

    pub fn finish(mut self) -> PixelioResult<()> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            PixelioError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PixelioError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Writes a finite frame sequence to an mp4 at the given frame rate. The
/// output dimensions come from the first frame.
pub fn write_video(
    out_path: impl Into<PathBuf>,
    frames: impl IntoIterator<Item = Frame>,
    fps: u32,
) -> PixelioResult<()> {
    let mut iter = frames.into_iter();
    let Some(first) = iter.next() else {
        return Err(PixelioError::validation(
            "cannot write a video with no frames",
        ));
    };

    let cfg = default_mp4_config(out_path, first.width, first.height, fps);
    let mut writer = VideoWriter::new(cfg)?;
    writer.encode_frame(&first)?;
    for frame in iter {
        writer.encode_frame(&frame)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_catches_bad_values() {
        let base = EncodeConfig {
            width: 10,
            height: 10,
            fps: 30,
            out_path: PathBuf::from("out/clip.mp4"),
            overwrite: true,
        };
        assert!(base.validate().is_ok());

        let mut zero_w = base.clone();
        zero_w.width = 0;
        assert!(zero_w.validate().is_err());

        let mut odd = base.clone();
        odd.width = 11;
        assert!(odd.validate().is_err());

        let mut no_fps = base;
        no_fps.fps = 0;
        assert!(no_fps.validate().is_err());
    }

    #[test]
    fn ff_ratio_parsing() {
        assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_ff_ratio("0/0"), None);
        assert_eq!(parse_ff_ratio("nonsense"), None);
    }

    #[test]
    fn source_fps_handles_zero_denominator() {
        let meta = VideoMeta {
            width: 64,
            height: 64,
            fps_num: 30,
            fps_den: 0,
            duration_sec: 0.0,
            codec_name: String::new(),
            has_audio: false,
        };
        assert_eq!(meta.source_fps(), 0.0);
    }
}
