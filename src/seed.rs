use std::collections::BTreeMap;

use ethereum_types::H256;
use parking_lot::RwLock;

use crate::epoch::Epoch;
use crate::error::{Error, Result};
use crate::keccak_256;

/// Append-only memo of the seed hash chain.
///
/// `seed(0)` is the zero hash and `seed(e) = keccak256(seed(e - 1))`. A cold
/// query resumes from the highest cached epoch at or below the request and
/// chains forward outside the lock; concurrent misses may compute the same
/// links twice, but every writer inserts the same values.
#[derive(Debug)]
pub struct SeedHashCache {
    seeds: RwLock<BTreeMap<u64, H256>>,
    checkpoint_interval: u64,
}

impl Default for SeedHashCache {
    fn default() -> Self {
        let mut seeds = BTreeMap::new();
        seeds.insert(0, H256::zero());
        Self {
            seeds: RwLock::new(seeds),
            checkpoint_interval: 1,
        }
    }
}

impl SeedHashCache {
    /// A cache that keeps every `checkpoint_interval`-th intermediate link
    /// plus every epoch that was explicitly asked for.
    pub fn with_checkpoint_interval(checkpoint_interval: u64) -> Result<Self> {
        if checkpoint_interval == 0 {
            return Err(Error::InvalidConfig(
                "seed checkpoint interval must be positive".into(),
            ));
        }
        Ok(Self {
            checkpoint_interval,
            ..Self::default()
        })
    }

    pub fn seed_hash(&self, epoch: Epoch) -> H256 {
        let target = epoch.as_u64();
        let (start, mut seed) = {
            let seeds = self.seeds.read();
            match seeds.range(..=target).next_back() {
                Some((&e, &seed)) if e == target => return seed,
                Some((&e, &seed)) => (e, seed),
                // genesis is inserted on construction
                None => (0, H256::zero()),
            }
        };

        tracing::trace!(from = start, to = target, "extending seed hash chain");
        let mut fresh = Vec::new();
        for e in start + 1..=target {
            seed = H256::from(keccak_256(seed.as_bytes()));
            if e == target || e % self.checkpoint_interval == 0 {
                fresh.push((e, seed));
            }
        }

        let mut seeds = self.seeds.write();
        for (e, s) in fresh {
            seeds.entry(e).or_insert(s);
        }
        seed
    }

    /// Number of epochs whose seed is held, genesis included.
    pub fn cached_epochs(&self) -> usize {
        self.seeds.read().len()
    }
}
