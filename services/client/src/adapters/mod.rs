pub mod file_store;
pub mod http;
pub mod image_codec;

pub use file_store::FileStore;
pub use http::HttpBackend;
pub use image_codec::RasterCodec;
