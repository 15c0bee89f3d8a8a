use serde::Deserialize;

use crate::epoch::Epoch;
use crate::error::{Error, Result};
use crate::miller_rabin::is_prime;

/// Growth schedule of the dataset and its cache.
///
/// Both sizes start at an initial byte count, grow linearly per epoch and
/// are then walked down until `size / unit` is prime, which keeps the
/// access pattern from aliasing on cache lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub epoch_length: u64,
    /// Highest epoch the schedule answers for. Anything above it is
    /// reported as [`Error::Overflow`] before sizes or seeds are computed.
    pub max_epoch: u64,
    pub dataset_bytes_init: u64,
    pub dataset_bytes_growth: u64,
    pub cache_bytes_init: u64,
    pub cache_bytes_growth: u64,
    /// Validity unit of the full dataset.
    pub mix_bytes: u64,
    /// Validity unit of the cache.
    pub hash_bytes: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            epoch_length: crate::EPOCH_LENGTH,
            max_epoch: crate::MAX_EPOCH,
            dataset_bytes_init: crate::DATASET_BYTES_INIT,
            dataset_bytes_growth: crate::DATASET_BYTES_GROWTH,
            cache_bytes_init: crate::CACHE_BYTES_INIT,
            cache_bytes_growth: crate::CACHE_BYTES_GROWTH,
            mix_bytes: crate::MIX_BYTES,
            hash_bytes: crate::HASH_BYTES,
        }
    }
}

impl Schedule {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::InvalidConfig(msg.into()));
        if self.epoch_length == 0 {
            return fail("epoch_length must be positive");
        }
        if self.mix_bytes == 0 || self.hash_bytes == 0 {
            return fail("mix_bytes and hash_bytes must be positive");
        }
        if self.dataset_bytes_init <= self.mix_bytes {
            return fail("dataset_bytes_init must exceed mix_bytes");
        }
        if self.cache_bytes_init <= self.hash_bytes {
            return fail("cache_bytes_init must exceed hash_bytes");
        }
        if self.cache_bytes_init >= self.dataset_bytes_init {
            return fail("cache_bytes_init must be smaller than dataset_bytes_init");
        }
        if self.cache_bytes_growth > self.dataset_bytes_growth {
            return fail("cache_bytes_growth must not exceed dataset_bytes_growth");
        }
        Ok(())
    }

    /// Reject epochs whose first block is not addressable or that lie past
    /// `max_epoch`. Every size and seed query goes through here first, so a
    /// single request can never start an unbounded seed chain.
    pub fn check_epoch(&self, epoch: Epoch) -> Result<()> {
        epoch.first_block(self.epoch_length)?;
        if epoch.as_u64() > self.max_epoch {
            return Err(Error::Overflow {
                what: "epoch bound",
                epoch,
            });
        }
        Ok(())
    }

    /// Size in bytes of the full dataset for `epoch`.
    pub fn full_size(&self, epoch: Epoch) -> Result<u64> {
        self.check_epoch(epoch)?;
        sized(
            epoch,
            "full size",
            self.dataset_bytes_init,
            self.dataset_bytes_growth,
            self.mix_bytes,
        )
    }

    /// Size in bytes of the verification cache for `epoch`.
    pub fn cache_size(&self, epoch: Epoch) -> Result<u64> {
        self.check_epoch(epoch)?;
        sized(
            epoch,
            "cache size",
            self.cache_bytes_init,
            self.cache_bytes_growth,
            self.hash_bytes,
        )
    }
}

fn sized(epoch: Epoch, what: &'static str, init: u64, growth: u64, unit: u64) -> Result<u64> {
    let overflow = || Error::Overflow { what, epoch };
    let mut sz = growth
        .checked_mul(epoch.as_u64())
        .and_then(|g| g.checked_add(init))
        .and_then(|s| s.checked_sub(unit))
        .ok_or_else(overflow)?;
    let step = unit.checked_mul(2).ok_or_else(overflow)?;
    while !is_prime(sz / unit) {
        sz = sz.checked_sub(step).ok_or_else(overflow)?;
    }
    Ok(sz)
}
