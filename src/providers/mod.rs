//! Object store backends

mod s3;
mod s3_client;

pub use s3::{copy_source, S3Store};
pub use s3_client::create_s3_client;
