//! Component trait and the packed per-type storage managers build on.

use std::ops::{Deref, DerefMut};

use crate::context::ComponentContext;
use crate::handle::{ComponentHandle, ComponentTypeId, GameObjectHandle, HandleTable};
use crate::serialization::{ComponentReader, ComponentWriter, SerializationError};

/// Per-object unit of data and behavior.
///
/// Every hook has an empty default. Hooks run on the world's update thread
/// with a [`ComponentContext`] that can inspect objects, reach modules, post
/// messages and queue deletions.
#[allow(unused_variables)]
pub trait Component: Send + Sync + 'static {
    /// Format version written alongside serialized data.
    const VERSION: u32 = 1;

    /// Called once when the component's init batch processes it.
    fn initialize(&mut self, ctx: &mut ComponentContext<'_, '_>) {}

    /// Called once before the component's slot is freed, if it was
    /// initialized.
    fn deinitialize(&mut self, ctx: &mut ComponentContext<'_, '_>) {}

    /// Called whenever the component becomes effectively active.
    fn on_activated(&mut self, ctx: &mut ComponentContext<'_, '_>) {}

    fn on_deactivated(&mut self, ctx: &mut ComponentContext<'_, '_>) {}

    /// Called once, the first time the component is active while the world
    /// is simulating and its init batch has finished.
    fn on_simulation_started(&mut self, ctx: &mut ComponentContext<'_, '_>) {}

    fn serialize(&self, writer: &mut dyn ComponentWriter) -> Result<(), SerializationError> {
        Ok(())
    }

    fn deserialize(
        &mut self,
        reader: &dyn ComponentReader,
        version: u32,
    ) -> Result<(), SerializationError> {
        Ok(())
    }

    /// Upward event-handler searches stop at objects carrying a component
    /// that returns `true`.
    fn is_event_boundary(&self) -> bool {
        false
    }

    /// While active, receive event messages nobody in the hierarchy handled.
    fn handles_global_events(&self) -> bool {
        false
    }
}

/// Lifecycle state of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentFlags {
    /// The component's own active flag.
    pub active: bool,
    pub initialized: bool,
    /// Effective activation: own flag, owner active, initialized, batch done.
    pub activated: bool,
    pub simulation_started: bool,
    /// Still waiting for its init batch to finish.
    pub queued_for_init: bool,
}

impl Default for ComponentFlags {
    fn default() -> Self {
        Self {
            active: true,
            initialized: false,
            activated: false,
            simulation_started: false,
            queued_for_init: true,
        }
    }
}

/// A stored component with its identity and lifecycle flags.
pub struct ComponentSlot<C> {
    handle: ComponentHandle,
    owner: GameObjectHandle,
    pub(crate) flags: ComponentFlags,
    pub component: C,
}

impl<C> ComponentSlot<C> {
    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    pub fn owner(&self) -> GameObjectHandle {
        self.owner
    }

    pub fn flags(&self) -> ComponentFlags {
        self.flags
    }

    pub fn is_activated(&self) -> bool {
        self.flags.activated
    }
}

impl<C> Deref for ComponentSlot<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.component
    }
}

impl<C> DerefMut for ComponentSlot<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.component
    }
}

/// Densely packed components of one type.
pub struct ComponentStorage<C> {
    table: HandleTable<ComponentSlot<C>>,
    type_id: ComponentTypeId,
    world: u8,
}

impl<C> Default for ComponentStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ComponentStorage<C> {
    pub fn new() -> Self {
        Self {
            table: HandleTable::new(),
            type_id: ComponentTypeId(0),
            world: 0,
        }
    }

    /// Tie the storage to the type id its manager was registered under.
    pub(crate) fn bind(&mut self, type_id: ComponentTypeId, world: u8) {
        self.type_id = type_id;
        self.world = world;
    }

    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub(crate) fn insert(&mut self, owner: GameObjectHandle, component: C) -> ComponentHandle {
        let (type_id, world) = (self.type_id, self.world);
        let slot = self.table.insert_with(|slot| ComponentSlot {
            handle: ComponentHandle::new(slot, type_id, world),
            owner,
            flags: ComponentFlags::default(),
            component,
        });
        ComponentHandle::new(slot, type_id, world)
    }

    pub(crate) fn remove(&mut self, handle: ComponentHandle) -> Option<ComponentSlot<C>> {
        if !self.owns(handle) {
            return None;
        }
        self.table.remove(handle.slot())
    }

    fn owns(&self, handle: ComponentHandle) -> bool {
        handle.type_id() == self.type_id && handle.world_index() == self.world
    }

    pub fn contains(&self, handle: ComponentHandle) -> bool {
        self.owns(handle) && self.table.contains(handle.slot())
    }

    pub fn get(&self, handle: ComponentHandle) -> Option<&ComponentSlot<C>> {
        if !self.owns(handle) {
            return None;
        }
        self.table.get(handle.slot())
    }

    pub fn get_mut(&mut self, handle: ComponentHandle) -> Option<&mut ComponentSlot<C>> {
        if !self.owns(handle) {
            return None;
        }
        self.table.get_mut(handle.slot())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentSlot<C>> {
        self.table.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ComponentSlot<C>> {
        self.table.values_mut()
    }

    /// Components that are currently activated.
    pub fn iter_active(&self) -> impl Iterator<Item = &ComponentSlot<C>> {
        self.iter().filter(|slot| slot.flags.activated)
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = &mut ComponentSlot<C>> {
        self.iter_mut().filter(|slot| slot.flags.activated)
    }

    pub fn handles(&self) -> Vec<ComponentHandle> {
        self.iter().map(|slot| slot.handle).collect()
    }
}
