//! Process-wide registry of live worlds.
//!
//! Each world created here gets a unique index, which every handle it issues
//! carries. That lets any handle be traced back to its world.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::WorldConfig;
use crate::error::WorldError;
use crate::handle::{ComponentHandle, GameObjectHandle, MAX_WORLDS};
use crate::world::World;

/// A world shared between threads.
#[derive(Clone)]
pub struct SharedWorld {
    index: u8,
    inner: Arc<RwLock<World>>,
}

impl SharedWorld {
    /// Wrap a world for sharing between threads.
    pub fn new(world: World) -> Self {
        Self {
            index: world.index(),
            inner: Arc::new(RwLock::new(world)),
        }
    }

    /// Index of the wrapped world.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Shared access; blocks while a writer holds the lock.
    pub fn read(&self) -> RwLockReadGuard<'_, World> {
        self.inner.read()
    }

    /// Exclusive access, e.g. to run [`World::update`].
    pub fn write(&self) -> RwLockWriteGuard<'_, World> {
        self.inner.write()
    }

    /// Exclusive access if nobody else holds the lock.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, World>> {
        self.inner.try_write()
    }

    /// Whether both refer to the same world.
    pub fn ptr_eq(&self, other: &SharedWorld) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SharedWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedWorld")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

enum Slot {
    Free,
    Live(SharedWorld),
    /// Destroyed, but other [`SharedWorld`] clones may still keep the world
    /// alive. The index stays reserved until the last one is dropped.
    Retired(Weak<RwLock<World>>),
}

impl Slot {
    fn is_available(&self) -> bool {
        match self {
            Slot::Free => true,
            Slot::Live(_) => false,
            Slot::Retired(world) => world.strong_count() == 0,
        }
    }

    fn live(&self) -> Option<&SharedWorld> {
        match self {
            Slot::Live(world) => Some(world),
            _ => None,
        }
    }
}

/// Slots for up to [`MAX_WORLDS`] worlds. A destroyed world's index becomes
/// free for reuse once every [`SharedWorld`] of it has been dropped, so a
/// stale handle never resolves in a newer world.
pub struct WorldRegistry {
    slots: Mutex<Vec<Slot>>,
}

impl Default for WorldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new((0..MAX_WORLDS).map(|_| Slot::Free).collect()),
        }
    }

    /// Create a world in the lowest free slot.
    pub fn create_world(&self, config: WorldConfig) -> Result<SharedWorld, WorldError> {
        let mut slots = self.slots.lock();
        let index = slots
            .iter()
            .position(Slot::is_available)
            .ok_or(WorldError::WorldIndexExhausted(MAX_WORLDS))?;
        let world = SharedWorld::new(World::with_index(config, index as u8)?);
        slots[index] = Slot::Live(world.clone());
        Ok(world)
    }

    /// The live world at `index`.
    pub fn world(&self, index: usize) -> Option<SharedWorld> {
        self.slots.lock().get(index)?.live().cloned()
    }

    /// The world that issued `handle`.
    pub fn world_of_object(&self, handle: GameObjectHandle) -> Option<SharedWorld> {
        if handle.is_invalid() {
            return None;
        }
        self.world(handle.world_index() as usize)
    }

    /// The world that issued `handle`.
    pub fn world_of_component(&self, handle: ComponentHandle) -> Option<SharedWorld> {
        if handle.is_invalid() {
            return None;
        }
        self.world(handle.world_index() as usize)
    }

    /// Release the registry's reference. The world itself is dropped, and
    /// cleared, when its last [`SharedWorld`] goes away; only then can the
    /// index be handed out again.
    pub fn destroy_world(&self, index: usize) -> Result<(), WorldError> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(index)
            .ok_or(WorldError::InvalidWorldIndex(index))?;
        let Some(world) = slot.live() else {
            return Err(WorldError::InvalidWorldIndex(index));
        };
        let retired = Arc::downgrade(&world.inner);
        *slot = Slot::Retired(retired);
        tracing::info!(index, "world destroyed");
        Ok(())
    }

    /// Number of live worlds.
    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.live().is_some()).count()
    }

    /// Whether no world is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of the live worlds.
    pub fn indices(&self) -> Vec<usize> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.live().is_some())
            .map(|(i, _)| i)
            .collect()
    }
}
