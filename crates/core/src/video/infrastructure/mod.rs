pub mod ffmpeg_camera_reader;
pub mod image_codec;
