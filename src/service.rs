//! Read-only DAG queries for the node's RPC layer.
//!
//! Every query that takes an optional epoch falls back to the chain's
//! current epoch. Descriptors for explicit epochs are computed fresh from
//! the schedule and the seed chain and never touch the registry.

use std::sync::Arc;

use ethereum_types::H256;

use crate::config::DagConfig;
use crate::dag::{ActiveDagInfo, CacheInfo, DagGenerator, DagInfo};
use crate::epoch::{Epoch, EpochCalculator, HeightSource};
use crate::error::Result;
use crate::registry::DagRegistry;
use crate::seed::SeedHashCache;
use crate::size::Schedule;

pub struct DagService {
    calculator: EpochCalculator,
    schedule: Schedule,
    seeds: Arc<SeedHashCache>,
    registry: Arc<DagRegistry>,
    heights: Arc<dyn HeightSource>,
}

impl DagService {
    pub fn new(
        schedule: Schedule,
        seeds: Arc<SeedHashCache>,
        registry: Arc<DagRegistry>,
        heights: Arc<dyn HeightSource>,
    ) -> Result<Self> {
        schedule.validate()?;
        Ok(Self {
            calculator: EpochCalculator::new(schedule.epoch_length)?,
            schedule,
            seeds,
            registry,
            heights,
        })
    }

    /// Wire a service and its registry from configuration.
    pub fn from_config(
        config: &DagConfig,
        heights: Arc<dyn HeightSource>,
        generator: Arc<dyn DagGenerator>,
    ) -> Result<Self> {
        config.validate()?;
        let seeds = Arc::new(SeedHashCache::with_checkpoint_interval(
            config.seed_checkpoint_interval,
        )?);
        let registry = DagRegistry::new(config.schedule, Arc::clone(&seeds), generator)?
            .release_previous_early(config.release_previous_early);
        Self::new(config.schedule, seeds, Arc::new(registry), heights)
    }

    pub fn registry(&self) -> &Arc<DagRegistry> {
        &self.registry
    }

    pub fn heights(&self) -> &dyn HeightSource {
        self.heights.as_ref()
    }

    /// Pick the requested or current epoch and reject it if it lies past the
    /// schedule's bound, before anything touches the seed chain.
    fn resolve(&self, epoch: Option<Epoch>) -> Result<Epoch> {
        let epoch = match epoch {
            Some(epoch) => epoch,
            None => self.get_epoch()?,
        };
        self.schedule.check_epoch(epoch)?;
        Ok(epoch)
    }

    pub fn get_epoch(&self) -> Result<Epoch> {
        self.calculator.current_epoch(self.heights.as_ref())
    }

    pub fn get_seed_hash(&self, epoch: Option<Epoch>) -> Result<H256> {
        let epoch = self.resolve(epoch)?;
        Ok(self.seeds.seed_hash(epoch))
    }

    pub fn get_dag_size(&self, epoch: Option<Epoch>) -> Result<u64> {
        self.schedule.full_size(self.resolve(epoch)?)
    }

    pub fn get_cache_size(&self, epoch: Option<Epoch>) -> Result<u64> {
        self.schedule.cache_size(self.resolve(epoch)?)
    }

    pub fn get_dag_info(&self, epoch: Epoch) -> Result<DagInfo> {
        let epoch = self.resolve(Some(epoch))?;
        let size = self.schedule.full_size(epoch)?;
        let cache_size = self.schedule.cache_size(epoch)?;
        Ok(DagInfo {
            epoch,
            seedhash: self.seeds.seed_hash(epoch),
            size,
            cache_size,
        })
    }

    pub fn get_cache_info(&self, epoch: Epoch) -> Result<CacheInfo> {
        let epoch = self.resolve(Some(epoch))?;
        let size = self.schedule.cache_size(epoch)?;
        Ok(CacheInfo {
            epoch,
            seedhash: self.seeds.seed_hash(epoch),
            size,
        })
    }

    /// Descriptor of the dataset the registry currently publishes.
    pub fn get_active_dag(&self) -> Result<ActiveDagInfo> {
        self.registry.active_dag().map(|dag| dag.info())
    }
}
