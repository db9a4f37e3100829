//! Key sequencer: atomic per-container counters with a reservation ledger.
//!
//! A reservation extends the container's persisted counter by `count` and
//! durably records the allocation BEFORE success is reported. If persisting
//! either piece fails, no keys are considered issued. Reservations for one
//! container are strictly linearized behind a per-container async mutex, so
//! concurrent reservations never produce overlapping ranges regardless of
//! the backing store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use synchub_core::TaskError;

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// One atomic allocation of `[start, start + count)` keys in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub container: String,
    pub owner: String,
    pub token: String,
    pub start: u64,
    pub count: u32,
}

// ---------------------------------------------------------------------------
// SequenceStore
// ---------------------------------------------------------------------------

/// Persistence contract for sequence counters and the reservation ledger.
///
/// `persist` must write the advanced counter and the reservation record
/// all-or-nothing: after an error neither is visible to a later `load`.
#[async_trait]
pub trait SequenceStore: Send + Sync + 'static {
    /// Whether store operations complete without suspending. Feeds the
    /// executor's sync/async classification.
    fn is_synchronous(&self) -> bool;

    /// Load the current counter of a container (0 when never used).
    async fn load(&self, container: &str) -> Result<u64, TaskError>;

    /// Durably record the advanced counter together with the reservation.
    async fn persist(
        &self,
        container: &str,
        counter: u64,
        reservation: &Reservation,
    ) -> Result<(), TaskError>;
}

/// In-memory sequence store. Counter and ledger are updated under one lock,
/// which makes `persist` trivially all-or-nothing.
#[derive(Debug, Default)]
pub struct MemorySequenceStore {
    state: Mutex<MemoryStoreState>,
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    counters: std::collections::HashMap<String, u64>,
    ledger: Vec<Reservation>,
}

impl MemorySequenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded reservations, in persistence order.
    #[must_use]
    pub fn ledger(&self) -> Vec<Reservation> {
        self.state.lock().ledger.clone()
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    fn is_synchronous(&self) -> bool {
        true
    }

    async fn load(&self, container: &str) -> Result<u64, TaskError> {
        Ok(self.state.lock().counters.get(container).copied().unwrap_or(0))
    }

    async fn persist(
        &self,
        container: &str,
        counter: u64,
        reservation: &Reservation,
    ) -> Result<(), TaskError> {
        let mut state = self.state.lock();
        state.counters.insert(container.to_string(), counter);
        state.ledger.push(reservation.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KeySequencer
// ---------------------------------------------------------------------------

/// Per-container sequence counter with atomic range reservation.
pub struct KeySequencer {
    store: Arc<dyn SequenceStore>,
    /// Cached counter per container; `None` until first loaded. The async
    /// mutex linearizes reservations of one container across batches.
    sequences: DashMap<String, Arc<AsyncMutex<Option<u64>>>>,
}

impl KeySequencer {
    /// A sequencer over the given store.
    pub fn new(store: Arc<dyn SequenceStore>) -> Self {
        Self {
            store,
            sequences: DashMap::new(),
        }
    }

    /// Whether reservations complete without suspending on I/O.
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        self.store.is_synchronous()
    }

    /// Atomically reserve `count` keys in a container.
    ///
    /// The reserved range is `[start, start + count)` with `start` one past
    /// the previous counter value. The counter only increases.
    ///
    /// # Errors
    ///
    /// Propagates store failures; after an error no keys are issued and the
    /// counter is unchanged.
    pub async fn reserve(
        &self,
        container: &str,
        count: u32,
        owner: &str,
    ) -> Result<Reservation, TaskError> {
        let cell = self
            .sequences
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone();
        let mut guard = cell.lock().await;

        let current = match *guard {
            Some(counter) => counter,
            None => self.store.load(container).await?,
        };
        let advanced = current + u64::from(count);
        let reservation = Reservation {
            container: container.to_string(),
            owner: owner.to_string(),
            token: Uuid::new_v4().to_string(),
            start: current + 1,
            count,
        };

        // Persist counter + ledger record before any key is handed out.
        self.store.persist(container, advanced, &reservation).await?;
        *guard = Some(advanced);
        Ok(reservation)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
