//! Apache-2 licensed Ethash DAG bookkeeping.
//!
//! Maps block heights to epochs, epochs to seed hashes and dataset/cache
//! sizes, and keeps the single dataset a node currently hashes against.

// The reference algorithm used is from https://github.com/ethereum/wiki/wiki/Ethash

mod miller_rabin;

pub mod config;
pub mod dag;
pub mod epoch;
pub mod error;
pub mod registry;
pub mod seed;
pub mod service;
pub mod size;

use ethereum_types::H256;
use sha3::{Digest, Keccak256};

pub use config::DagConfig;
pub use dag::{ActiveDag, ActiveDagInfo, BoxError, CacheInfo, DagGenerator, DagInfo};
pub use epoch::{Epoch, EpochCalculator, HeightSource};
pub use error::{Error, ErrorKind, Result};
pub use registry::{DagRegistry, Replacement};
pub use seed::SeedHashCache;
pub use service::DagService;
pub use size::Schedule;

pub const DATASET_BYTES_INIT: u64 = 1073741824; // 2 to the power of 30.
pub const DATASET_BYTES_GROWTH: u64 = 8388608; // 2 to the power of 23.
pub const CACHE_BYTES_INIT: u64 = 16777216; // 2 to the power of 24.
pub const CACHE_BYTES_GROWTH: u64 = 131072; // 2 to the power of 17.
pub const MIX_BYTES: u64 = 128;
pub const HASH_BYTES: u64 = 64;

pub const EPOCH_LENGTH: u64 = 30000;
/// Last epoch whose first block fits a signed 32-bit block number.
pub const MAX_EPOCH: u64 = i32::MAX as u64 / EPOCH_LENGTH;

pub fn keccak_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Get the cache size in bytes for an epoch on the canonical schedule.
pub fn get_cache_size(epoch: Epoch) -> Result<u64> {
    Schedule::default().cache_size(epoch)
}

/// Get the full dataset size in bytes for an epoch on the canonical
/// schedule.
pub fn get_full_size(epoch: Epoch) -> Result<u64> {
    Schedule::default().full_size(epoch)
}

/// Get the seedhash for a given epoch by walking the whole hash chain.
///
/// This is the uncached reference; long-running callers should go through
/// [`SeedHashCache`].
pub fn get_seedhash(epoch: Epoch) -> H256 {
    let mut s = [0u8; 32];
    for _ in 0..epoch.as_u64() {
        s = keccak_256(&s);
    }
    H256::from(s)
}
