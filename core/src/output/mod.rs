pub mod bucket;
pub mod writer;

pub use bucket::BucketKey;
pub use writer::{BucketMetadata, OutputWriter};
