use crate::error::{PixelioError, PixelioResult};

/// Row-major, tightly packed 8-bit pixel buffer with 1 to 4 channels.
///
/// Decoded images keep their source channel count (gray = 1, rgb = 3,
/// rgba = 4). Video frames are always 3-channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> PixelioResult<Self> {
        if channels == 0 || channels > 4 {
            return Err(PixelioError::validation(format!(
                "frame channel count must be 1..=4, got {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(PixelioError::validation(format!(
                "frame data size mismatch: got {} bytes, expected {expected} for {width}x{height}x{channels}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> PixelioResult<Self> {
        let len = width as usize * height as usize * channels as usize;
        Self::from_raw(width, height, channels, vec![value; len])
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        debug_assert!(x < self.width && y < self.height);
        let c = self.channels as usize;
        let off = (y as usize * self.width as usize + x as usize) * c;
        &self.data[off..off + c]
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        debug_assert!(x < self.width && y < self.height);
        let c = self.channels as usize;
        let off = (y as usize * self.width as usize + x as usize) * c;
        &mut self.data[off..off + c]
    }

    /// Drops everything past the first 3 channels. Identity when the frame is
    /// already 3-channel; errors on 1/2-channel frames.
    pub fn to_rgb(self) -> PixelioResult<Frame> {
        match self.channels {
            3 => Ok(self),
            4 => {
                let mut rgb = Vec::with_capacity(
                    self.width as usize * self.height as usize * 3,
                );
                for px in self.data.chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                }
                Frame::from_raw(self.width, self.height, 3, rgb)
            }
            c => Err(PixelioError::validation(format!(
                "cannot truncate a {c}-channel frame to rgb"
            ))),
        }
    }
}
