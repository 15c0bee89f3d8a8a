//! The single in-memory dataset a node hashes against.
//!
//! Readers take `Arc` handles out of the registry. Publishing a new dataset
//! swaps the handle under a write lock, so every read that starts after a
//! publication observes the new epoch. The previous dataset is freed when
//! the last reader lets go of it, never on the swap itself.
//!
//! While a generation is in flight `active_dag` answers
//! [`Error::NotReady`] instead of blocking. A generator that fails or
//! panics leaves the registry as it was before the replacement started.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dag::{ActiveDag, DagGenerator};
use crate::epoch::{Epoch, EpochCalculator, HeightSource};
use crate::error::{Error, Result};
use crate::seed::SeedHashCache;
use crate::size::Schedule;

/// Outcome of a [`DagRegistry::replace`] request.
#[derive(Debug, Clone)]
pub enum Replacement {
    /// The dataset for the requested epoch was generated and published.
    Published(Arc<ActiveDag>),
    /// The requested epoch was already active.
    Unchanged(Arc<ActiveDag>),
    /// Another caller is generating `in_flight`; its result will be
    /// discarded and `wanted` generated next on that caller's thread.
    ///
    /// If the in-flight build fails instead, `wanted` is dropped with it and
    /// has to be requested again.
    Queued { in_flight: Epoch, wanted: Epoch },
}

impl Replacement {
    /// The dataset this call made available, if any.
    pub fn dag(&self) -> Option<&Arc<ActiveDag>> {
        match self {
            Self::Published(dag) | Self::Unchanged(dag) => Some(dag),
            Self::Queued { .. } => None,
        }
    }
}

#[derive(Debug)]
enum Slot {
    Empty,
    Generating {
        epoch: Epoch,
        /// Kept so that a failed build can roll back.
        previous: Option<Arc<ActiveDag>>,
    },
    Active(Arc<ActiveDag>),
}

#[derive(Debug)]
struct State {
    slot: Slot,
    /// Newest epoch requested while a build was running.
    wanted: Option<Epoch>,
    /// Epoch of the last published dataset, kept after an early release.
    last_loaded: Option<Epoch>,
    closed: bool,
}

pub struct DagRegistry {
    state: RwLock<State>,
    schedule: Schedule,
    calculator: EpochCalculator,
    seeds: Arc<SeedHashCache>,
    generator: Arc<dyn DagGenerator>,
    release_previous_early: bool,
}

impl std::fmt::Debug for DagRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DagRegistry")
            .field("state", &*self.state.read())
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl DagRegistry {
    pub fn new(
        schedule: Schedule,
        seeds: Arc<SeedHashCache>,
        generator: Arc<dyn DagGenerator>,
    ) -> Result<Self> {
        schedule.validate()?;
        Ok(Self {
            state: RwLock::new(State {
                slot: Slot::Empty,
                wanted: None,
                last_loaded: None,
                closed: false,
            }),
            calculator: EpochCalculator::new(schedule.epoch_length)?,
            schedule,
            seeds,
            generator,
            release_previous_early: false,
        })
    }

    /// Drop the registry's handle on the previous dataset as soon as a
    /// replacement starts generating, instead of when it is published.
    pub fn release_previous_early(mut self, yes: bool) -> Self {
        self.release_previous_early = yes;
        self
    }

    /// The dataset currently published.
    ///
    /// An empty slot reports [`Error::Evicted`] rather than
    /// [`Error::NoneLoaded`] once any dataset has been published.
    pub fn active_dag(&self) -> Result<Arc<ActiveDag>> {
        let state = self.state.read();
        if state.closed {
            return Err(Error::ShutDown);
        }
        match &state.slot {
            Slot::Empty => match state.last_loaded {
                Some(epoch) => Err(Error::Evicted { epoch }),
                None => Err(Error::NoneLoaded),
            },
            Slot::Generating { epoch, .. } => Err(Error::NotReady { epoch: *epoch }),
            Slot::Active(dag) => Ok(Arc::clone(dag)),
        }
    }

    /// Epoch of the published dataset, if any.
    pub fn active_epoch(&self) -> Option<Epoch> {
        match &self.state.read().slot {
            Slot::Active(dag) => Some(dag.epoch()),
            _ => None,
        }
    }

    /// Generate and publish the dataset for `epoch`.
    ///
    /// Runs the generator on the calling thread. Epochs never move
    /// backwards: asking for an epoch behind the active, in-flight or last
    /// published one fails with [`Error::Stale`].
    pub fn replace(&self, epoch: Epoch) -> Result<Replacement> {
        let mut target = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            if state.closed {
                return Err(Error::ShutDown);
            }
            match &state.slot {
                Slot::Generating {
                    epoch: in_flight,
                    ..
                } => {
                    let in_flight = *in_flight;
                    let newest = state.wanted.unwrap_or(in_flight);
                    if epoch <= newest {
                        return Err(Error::Stale {
                            requested: epoch,
                            current: newest,
                        });
                    }
                    tracing::debug!(%in_flight, wanted = %epoch, "queueing dag replacement");
                    state.wanted = Some(epoch);
                    return Ok(Replacement::Queued {
                        in_flight,
                        wanted: epoch,
                    });
                }
                Slot::Active(dag) if dag.epoch() == epoch => {
                    return Ok(Replacement::Unchanged(Arc::clone(dag)));
                }
                Slot::Active(dag) if dag.epoch() > epoch => {
                    return Err(Error::Stale {
                        requested: epoch,
                        current: dag.epoch(),
                    });
                }
                Slot::Empty => match state.last_loaded {
                    Some(last) if last > epoch => {
                        return Err(Error::Stale {
                            requested: epoch,
                            current: last,
                        });
                    }
                    _ => {}
                },
                Slot::Active(_) => {}
            }
            let previous = match std::mem::replace(&mut state.slot, Slot::Empty) {
                Slot::Active(dag) if !self.release_previous_early => Some(dag),
                _ => None,
            };
            state.slot = Slot::Generating { epoch, previous };
            epoch
        };

        loop {
            let built = self.build(target);
            let mut guard = self.state.write();
            let state = &mut *guard;
            if state.closed {
                return Err(Error::ShutDown);
            }
            match built {
                Err(err) => {
                    let dropped = state.wanted.take();
                    state.slot = match std::mem::replace(&mut state.slot, Slot::Empty) {
                        Slot::Generating {
                            previous: Some(dag),
                            ..
                        } => Slot::Active(dag),
                        _ => Slot::Empty,
                    };
                    tracing::warn!(
                        epoch = %target,
                        dropped = ?dropped,
                        error = %err,
                        "dag generation failed, rolled back"
                    );
                    return Err(err);
                }
                Ok(dag) => {
                    if let Some(next) = state.wanted.take().filter(|next| *next > target) {
                        tracing::warn!(
                            discarded = %target,
                            %next,
                            "chain advanced during generation, discarding dag"
                        );
                        if let Slot::Generating { epoch, .. } = &mut state.slot {
                            *epoch = next;
                        }
                        target = next;
                        continue;
                    }
                    let dag = Arc::new(dag);
                    // the previous dataset lives on in readers' handles only
                    state.slot = Slot::Active(Arc::clone(&dag));
                    state.last_loaded = Some(target);
                    tracing::info!(epoch = %target, size = dag.size(), "dag published");
                    return Ok(Replacement::Published(dag));
                }
            }
        }
    }

    fn build(&self, epoch: Epoch) -> Result<ActiveDag> {
        let full_size = self.schedule.full_size(epoch)?;
        let seed = self.seeds.seed_hash(epoch);
        tracing::info!(%epoch, full_size, seed = ?seed, "generating dag");

        let generated = panic::catch_unwind(AssertUnwindSafe(|| {
            self.generator.generate(epoch, seed, full_size)
        }));
        let bytes = match generated {
            Ok(result) => result.map_err(|source| Error::Generation { epoch, source })?,
            Err(payload) => {
                return Err(Error::Generation {
                    epoch,
                    source: panic_message(payload).into(),
                });
            }
        };
        if bytes.len() as u64 != full_size {
            return Err(Error::Generation {
                epoch,
                source: format!("expected {} bytes, got {}", full_size, bytes.len()).into(),
            });
        }
        Ok(ActiveDag::new(epoch, seed, full_size, bytes))
    }

    /// Advance to the chain's current epoch if it moved past the active
    /// dataset. Returns `None` when nothing had to change.
    pub fn sync(&self, heights: &dyn HeightSource) -> Result<Option<Replacement>> {
        let current = self.calculator.current_epoch(heights)?;
        let behind = {
            let state = self.state.read();
            if state.closed {
                return Err(Error::ShutDown);
            }
            match &state.slot {
                Slot::Empty => true,
                Slot::Active(dag) => current > dag.epoch(),
                Slot::Generating { epoch, .. } => current > state.wanted.unwrap_or(*epoch),
            }
        };
        if !behind {
            return Ok(None);
        }
        self.replace(current).map(Some)
    }

    /// Startup hook: materialize the dataset for the chain's current epoch.
    pub fn init(&self, heights: &dyn HeightSource) -> Result<Arc<ActiveDag>> {
        tracing::info!("initializing dag registry");
        self.acquire(heights)
    }

    /// Sync with the chain and hand out the active dataset.
    pub fn acquire(&self, heights: &dyn HeightSource) -> Result<Arc<ActiveDag>> {
        self.sync(heights)?;
        self.active_dag()
    }

    /// Shutdown hook. Releases the registry's handle and refuses further
    /// work; datasets still held by readers stay valid until dropped.
    pub fn teardown(&self) -> Option<Arc<ActiveDag>> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.closed = true;
        state.wanted = None;
        tracing::info!("dag registry shut down");
        match std::mem::replace(&mut state.slot, Slot::Empty) {
            Slot::Active(dag)
            | Slot::Generating {
                previous: Some(dag),
                ..
            } => Some(dag),
            _ => None,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let msg = match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast_ref::<&str>() {
            Some(msg) => msg.to_string(),
            None => return "generator panicked".into(),
        },
    };
    format!("generator panicked: {}", msg)
}
