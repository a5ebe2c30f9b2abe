//! Persistent storage: per-file shards with hashed directory fan-out and a
//! single metadata file mirroring the resident bookkeeping.

pub mod metadata;
pub mod shard;
pub mod shard_store;

pub use metadata::MetadataFile;
pub use shard::{SHARD_VERSION, ShardHeader, decode_shard, decode_shard_header, encode_shard};
pub use shard_store::ShardStore;
