use bytes::Bytes;
use ethereum_types::H256;
use serde::Serialize;

use crate::epoch::Epoch;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Port: the engine that fills a dataset for an epoch.
///
/// Generation is long-running and deterministic. The returned buffer must
/// be exactly `full_size` bytes and is never written to afterwards.
pub trait DagGenerator: Send + Sync {
    fn generate(&self, epoch: Epoch, seed: H256, full_size: u64) -> Result<Bytes, BoxError>;
}

impl<F> DagGenerator for F
where
    F: Fn(Epoch, H256, u64) -> Result<Bytes, BoxError> + Send + Sync,
{
    fn generate(&self, epoch: Epoch, seed: H256, full_size: u64) -> Result<Bytes, BoxError> {
        self(epoch, seed, full_size)
    }
}

/// A fully materialized dataset.
///
/// Shared behind an `Arc`; the bytes are released once the registry and
/// every reader have dropped their handle.
pub struct ActiveDag {
    epoch: Epoch,
    seed: H256,
    full_size: u64,
    bytes: Bytes,
}

impl core::fmt::Debug for ActiveDag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActiveDag")
            .field("epoch", &self.epoch)
            .field("seed", &self.seed)
            .field("full_size", &self.full_size)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl ActiveDag {
    pub(crate) fn new(epoch: Epoch, seed: H256, full_size: u64, bytes: Bytes) -> Self {
        Self {
            epoch,
            seed,
            full_size,
            bytes,
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn seed_hash(&self) -> H256 {
        self.seed
    }

    pub fn size(&self) -> u64 {
        self.full_size
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn is_valid_for(&self, number: u64, epoch_length: u64) -> bool {
        number / epoch_length == self.epoch.as_u64()
    }

    pub fn info(&self) -> ActiveDagInfo {
        ActiveDagInfo {
            epoch: self.epoch,
            seedhash: self.seed,
            size: self.full_size,
        }
    }
}

/// Descriptor of the dataset and cache of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DagInfo {
    pub epoch: Epoch,
    pub seedhash: H256,
    pub size: u64,
    pub cache_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub epoch: Epoch,
    pub seedhash: H256,
    pub size: u64,
}

/// What the node currently hashes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveDagInfo {
    pub epoch: Epoch,
    pub seedhash: H256,
    pub size: u64,
}

impl From<DagInfo> for CacheInfo {
    fn from(info: DagInfo) -> Self {
        Self {
            epoch: info.epoch,
            seedhash: info.seedhash,
            size: info.cache_size,
        }
    }
}
