#![forbid(unsafe_code)]

pub mod audio;
pub mod codec;
pub mod error;
pub mod frame;
pub mod overlay;
pub mod store;
pub mod video;

pub use audio::{AudioClip, extract_audio};
pub use codec::{decode_image, encode_image, read_image, write_image};
pub use error::{PixelioError, PixelioResult};
pub use frame::Frame;
pub use overlay::overlay;
pub use store::{ByteStore, FsStore};
pub use video::{
    EncodeConfig, VideoMeta, VideoReader, VideoWriter, default_mp4_config, is_ffmpeg_on_path,
    probe_video, write_video,
};
