//! Rate limiting primitives: [`TokenBucket`].

mod bucket;

pub use bucket::{Grant, TokenBucket, TokenBucketConfig};
