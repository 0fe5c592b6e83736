//! Init batches: groups of components initialized and activated together.
//!
//! Components join a batch when created. A batch only starts processing once
//! submitted; the default batch is always submitted and is processed every
//! frame under the world's default time budget.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::handle::ComponentHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InitBatchId(pub(crate) u32);

impl InitBatchId {
    /// The batch components join when no other batch is named.
    pub const DEFAULT: Self = Self(0);
}

/// Parameters of a new init batch.
#[derive(Debug, Clone, Default)]
pub struct InitBatchDesc {
    pub name: String,
    /// Initialize the whole batch synchronously at submit, failing if it
    /// does not fit in `time_budget`.
    pub must_finish_within_frame: bool,
    /// Wall-clock time the batch may use per frame. `None` is unbounded.
    pub time_budget: Option<Duration>,
}

impl InitBatchDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn must_finish_within_frame(mut self) -> Self {
        self.must_finish_within_frame = true;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitBatchState {
    /// Accepting new components.
    Collecting,
    /// Being processed by the frame loop.
    Submitted,
    Complete,
    /// A must-finish batch ran out of time; its members were rolled back.
    Failed,
    /// Unfinished members were handed to the default batch.
    Cancelled,
}

#[derive(Debug)]
pub(crate) struct InitBatch {
    pub desc: InitBatchDesc,
    pub state: InitBatchState,
    pub members: Vec<ComponentHandle>,
    /// Members whose `initialize` pass is done.
    pub initialized: usize,
    /// Members whose activation pass is done.
    pub finished: usize,
}

impl InitBatch {
    fn new(desc: InitBatchDesc, state: InitBatchState) -> Self {
        Self {
            desc,
            state,
            members: Vec::new(),
            initialized: 0,
            finished: 0,
        }
    }

    pub fn progress(&self) -> f32 {
        if self.members.is_empty() {
            return 1.0;
        }
        (self.initialized + self.finished) as f32 / (2 * self.members.len()) as f32
    }

    pub fn is_done(&self) -> bool {
        self.finished == self.members.len()
    }

    /// Members that have not finished activation.
    pub fn unfinished(&self) -> &[ComponentHandle] {
        &self.members[self.finished..]
    }

    pub fn reset(&mut self) {
        self.members.clear();
        self.initialized = 0;
        self.finished = 0;
    }
}

/// All init batches of a world, in creation order.
#[derive(Debug)]
pub(crate) struct InitBatches {
    batches: BTreeMap<InitBatchId, InitBatch>,
    next: u32,
}

impl InitBatches {
    pub fn new() -> Self {
        let mut batches = BTreeMap::new();
        batches.insert(
            InitBatchId::DEFAULT,
            InitBatch::new(InitBatchDesc::new("default"), InitBatchState::Submitted),
        );
        Self { batches, next: 1 }
    }

    pub fn create(&mut self, desc: InitBatchDesc) -> InitBatchId {
        let id = InitBatchId(self.next);
        self.next += 1;
        tracing::debug!(batch = %desc.name, ?id, "init batch created");
        self.batches
            .insert(id, InitBatch::new(desc, InitBatchState::Collecting));
        id
    }

    pub fn get(&self, id: InitBatchId) -> Option<&InitBatch> {
        self.batches.get(&id)
    }

    pub fn get_mut(&mut self, id: InitBatchId) -> Option<&mut InitBatch> {
        self.batches.get_mut(&id)
    }

    /// Take a batch out while the world processes it.
    pub fn take(&mut self, id: InitBatchId) -> Option<InitBatch> {
        self.batches.remove(&id)
    }

    pub fn put(&mut self, id: InitBatchId, batch: InitBatch) {
        self.batches.insert(id, batch);
    }

    /// Submitted batches, default batch first.
    pub fn pending(&self) -> Vec<InitBatchId> {
        self.batches
            .iter()
            .filter(|(_, b)| b.state == InitBatchState::Submitted)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
