//! Component managers and the registry that owns one per component type.
//!
//! A manager owns the storage of its component type and declares the update
//! functions that run over it. The registry erases the manager type so the
//! world can drive lifecycle hooks and message dispatch for any registered
//! type through one interface.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use rayon::prelude::*;

use crate::component::{Component, ComponentFlags, ComponentStorage};
use crate::context::{AsyncContext, ComponentContext, Outbox, WorldContext, WorldState};
use crate::error::WorldError;
use crate::handle::{ComponentHandle, ComponentTypeId, GameObjectHandle};
use crate::message::{Message, MessageHandlers};
use crate::scheduler::{UpdateFn, UpdateFunctionDesc, UpdatePhase};
use crate::serialization::{ComponentWriter, SerializationError};

/// Owner of all components of one type.
///
/// Implementors hold a [`ComponentStorage`] and expose it; everything else
/// has a default.
#[allow(unused_variables)]
pub trait ComponentManager: Default + Send + Sync + 'static {
    type Component: Component;

    fn storage(&self) -> &ComponentStorage<Self::Component>;

    fn storage_mut(&mut self) -> &mut ComponentStorage<Self::Component>;

    /// Update functions to schedule, collected once when the manager is
    /// created.
    fn update_functions(&self) -> Vec<UpdateFunctionDesc<Self>> {
        Vec::new()
    }

    /// Message handlers of the component type, collected once when the
    /// manager is created.
    fn register_message_handlers(handlers: &mut MessageHandlers<Self::Component>) {}
}

/// Stable identity of a Rust type, used for manager and module lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl TypeDescriptor {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// Summary of a registered manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerInfo {
    pub type_id: ComponentTypeId,
    pub manager: &'static str,
    pub component: TypeDescriptor,
    pub len: usize,
}

pub(crate) trait ErasedManager: Send + Sync {
    fn info(&self) -> ManagerInfo;
    fn manager_any(&self) -> &dyn Any;
    fn manager_any_mut(&mut self) -> &mut dyn Any;
    fn handles(&self) -> Vec<ComponentHandle>;
    fn owner(&self, handle: ComponentHandle) -> Option<GameObjectHandle>;
    fn flags(&self, handle: ComponentHandle) -> Option<ComponentFlags>;
    fn component_any(&self, handle: ComponentHandle) -> Option<&dyn Any>;
    fn component_any_mut(&mut self, handle: ComponentHandle) -> Option<&mut dyn Any>;
    fn initialize(&mut self, handle: ComponentHandle, ctx: &mut WorldContext<'_>) -> bool;
    fn rollback_initialize(&mut self, handle: ComponentHandle, ctx: &mut WorldContext<'_>);
    fn finish_init(&mut self, handle: ComponentHandle, owner_active: bool, ctx: &mut WorldContext<'_>);
    fn set_own_active(&mut self, handle: ComponentHandle, active: bool) -> bool;
    fn update_activation(&mut self, handle: ComponentHandle, owner_active: bool, ctx: &mut WorldContext<'_>);
    fn start_simulation(&mut self, ctx: &mut WorldContext<'_>);
    fn release(&mut self, handle: ComponentHandle, ctx: &mut WorldContext<'_>) -> Option<GameObjectHandle>;
    fn dispatch(&mut self, handle: ComponentHandle, message: &dyn Message, ctx: &mut WorldContext<'_>) -> bool;
    fn handles_message(&self, handle: ComponentHandle, message_type: TypeId) -> bool;
    fn is_event_boundary(&self, handle: ComponentHandle) -> bool;
    fn run_sync(&mut self, function: usize, ctx: &mut WorldContext<'_>);
    fn run_async(&mut self, functions: &[usize], ctx: &mut AsyncContext<'_>);
    fn serialize(&self, handle: ComponentHandle, writer: &mut dyn ComponentWriter) -> Option<Result<u32, SerializationError>>;
}

pub(crate) struct ManagerEntry<M: ComponentManager> {
    manager: M,
    handlers: MessageHandlers<M::Component>,
    functions: Vec<UpdateFunctionDesc<M>>,
}

impl<M: ComponentManager> ManagerEntry<M> {
    pub fn new(
        manager: M,
        handlers: MessageHandlers<M::Component>,
        functions: Vec<UpdateFunctionDesc<M>>,
    ) -> Self {
        Self {
            manager,
            handlers,
            functions,
        }
    }
}

impl<M: ComponentManager> ErasedManager for ManagerEntry<M> {
    fn info(&self) -> ManagerInfo {
        ManagerInfo {
            type_id: self.manager.storage().type_id(),
            manager: std::any::type_name::<M>(),
            component: TypeDescriptor::of::<M::Component>(),
            len: self.manager.storage().len(),
        }
    }

    fn manager_any(&self) -> &dyn Any {
        &self.manager
    }

    fn manager_any_mut(&mut self) -> &mut dyn Any {
        &mut self.manager
    }

    fn handles(&self) -> Vec<ComponentHandle> {
        self.manager.storage().handles()
    }

    fn owner(&self, handle: ComponentHandle) -> Option<GameObjectHandle> {
        self.manager.storage().get(handle).map(|slot| slot.owner())
    }

    fn flags(&self, handle: ComponentHandle) -> Option<ComponentFlags> {
        self.manager.storage().get(handle).map(|slot| slot.flags())
    }

    fn component_any(&self, handle: ComponentHandle) -> Option<&dyn Any> {
        self.manager
            .storage()
            .get(handle)
            .map(|slot| &slot.component as &dyn Any)
    }

    fn component_any_mut(&mut self, handle: ComponentHandle) -> Option<&mut dyn Any> {
        self.manager
            .storage_mut()
            .get_mut(handle)
            .map(|slot| &mut slot.component as &mut dyn Any)
    }

    fn initialize(&mut self, handle: ComponentHandle, ctx: &mut WorldContext<'_>) -> bool {
        let Some(slot) = self.manager.storage_mut().get_mut(handle) else {
            return false;
        };
        if slot.flags.initialized {
            return false;
        }
        slot.flags.initialized = true;
        let mut cctx = ComponentContext::new(handle, slot.owner(), ctx);
        slot.component.initialize(&mut cctx);
        true
    }

    fn rollback_initialize(&mut self, handle: ComponentHandle, ctx: &mut WorldContext<'_>) {
        let Some(slot) = self.manager.storage_mut().get_mut(handle) else {
            return;
        };
        if slot.flags.initialized && !slot.flags.activated {
            slot.flags.initialized = false;
            let mut cctx = ComponentContext::new(handle, slot.owner(), ctx);
            slot.component.deinitialize(&mut cctx);
        }
    }

    fn finish_init(&mut self, handle: ComponentHandle, owner_active: bool, ctx: &mut WorldContext<'_>) {
        let Some(slot) = self.manager.storage_mut().get_mut(handle) else {
            return;
        };
        if !slot.flags.initialized {
            return;
        }
        slot.flags.queued_for_init = false;
        self.update_activation(handle, owner_active, ctx);
    }

    fn set_own_active(&mut self, handle: ComponentHandle, active: bool) -> bool {
        match self.manager.storage_mut().get_mut(handle) {
            Some(slot) => {
                slot.flags.active = active;
                true
            }
            None => false,
        }
    }

    fn update_activation(&mut self, handle: ComponentHandle, owner_active: bool, ctx: &mut WorldContext<'_>) {
        let Some(slot) = self.manager.storage_mut().get_mut(handle) else {
            return;
        };
        let flags = slot.flags;
        let should_be_active =
            flags.active && owner_active && flags.initialized && !flags.queued_for_init;
        if should_be_active == flags.activated {
            return;
        }
        slot.flags.activated = should_be_active;
        let mut cctx = ComponentContext::new(handle, slot.owner(), ctx);
        if should_be_active {
            slot.component.on_activated(&mut cctx);
            if slot.component.handles_global_events() {
                cctx.global_handlers_mut().register(handle);
            }
            if cctx.is_simulating() && !slot.flags.simulation_started {
                slot.flags.simulation_started = true;
                slot.component.on_simulation_started(&mut cctx);
            }
        } else {
            cctx.global_handlers_mut().unregister(handle);
            slot.component.on_deactivated(&mut cctx);
        }
    }

    fn start_simulation(&mut self, ctx: &mut WorldContext<'_>) {
        for slot in self.manager.storage_mut().iter_active_mut() {
            if slot.flags.simulation_started {
                continue;
            }
            slot.flags.simulation_started = true;
            let mut cctx = ComponentContext::new(slot.handle(), slot.owner(), ctx);
            slot.component.on_simulation_started(&mut cctx);
        }
    }

    fn release(&mut self, handle: ComponentHandle, ctx: &mut WorldContext<'_>) -> Option<GameObjectHandle> {
        let slot = self.manager.storage_mut().get_mut(handle)?;
        let owner = slot.owner();
        let mut cctx = ComponentContext::new(handle, owner, ctx);
        if slot.flags.activated {
            slot.flags.activated = false;
            cctx.global_handlers_mut().unregister(handle);
            slot.component.on_deactivated(&mut cctx);
        }
        if slot.flags.initialized {
            slot.flags.initialized = false;
            slot.component.deinitialize(&mut cctx);
        }
        self.manager.storage_mut().remove(handle);
        tracing::trace!(component = %handle, "component released");
        Some(owner)
    }

    fn dispatch(&mut self, handle: ComponentHandle, message: &dyn Message, ctx: &mut WorldContext<'_>) -> bool {
        let Some(slot) = self.manager.storage_mut().get_mut(handle) else {
            return false;
        };
        if !slot.flags.activated {
            return false;
        }
        let mut cctx = ComponentContext::new(handle, slot.owner(), ctx);
        let handled = self.handlers.dispatch(&mut slot.component, message, &mut cctx);
        if handled {
            tracing::trace!(component = %handle, message = message.type_name(), "message delivered");
        }
        handled
    }

    fn handles_message(&self, handle: ComponentHandle, message_type: TypeId) -> bool {
        self.handlers.handles(message_type)
            && self
                .manager
                .storage()
                .get(handle)
                .is_some_and(|slot| slot.flags.activated)
    }

    fn is_event_boundary(&self, handle: ComponentHandle) -> bool {
        self.manager
            .storage()
            .get(handle)
            .is_some_and(|slot| slot.flags.activated && slot.component.is_event_boundary())
    }

    fn run_sync(&mut self, function: usize, ctx: &mut WorldContext<'_>) {
        if let Some(UpdateFn::Sync(f)) = self.functions.get(function).map(|d| d.func()) {
            f(&mut self.manager, ctx);
        }
    }

    fn run_async(&mut self, functions: &[usize], ctx: &mut AsyncContext<'_>) {
        for &function in functions {
            if let Some(UpdateFn::Async(f)) = self.functions.get(function).map(|d| d.func()) {
                f(&mut self.manager, ctx);
            }
        }
    }

    fn serialize(
        &self,
        handle: ComponentHandle,
        writer: &mut dyn ComponentWriter,
    ) -> Option<Result<u32, SerializationError>> {
        let slot = self.manager.storage().get(handle)?;
        Some(
            slot.component
                .serialize(writer)
                .map(|()| <M::Component as Component>::VERSION),
        )
    }
}

/// Managers of one world, indexed by [`ComponentTypeId`]. Ids are never
/// reused, so handles into a deleted manager never resolve in its successor.
#[derive(Default)]
pub(crate) struct ManagerRegistry {
    slots: Vec<Option<Box<dyn ErasedManager>>>,
    by_manager: HashMap<TypeId, ComponentTypeId>,
    by_component: HashMap<TypeId, (ComponentTypeId, &'static str)>,
}

impl ManagerRegistry {
    pub fn id_of<M: ComponentManager>(&self) -> Option<ComponentTypeId> {
        self.by_manager.get(&TypeId::of::<M>()).copied()
    }

    pub fn id_for_component<C: Component>(&self) -> Option<ComponentTypeId> {
        self.by_component.get(&TypeId::of::<C>()).map(|(id, _)| *id)
    }

    /// Fails if another manager type already owns `M`'s component type.
    pub fn check_conflict<M: ComponentManager>(&self) -> Result<(), WorldError> {
        match self.by_component.get(&TypeId::of::<M::Component>()) {
            Some((_, existing)) if *existing != std::any::type_name::<M>() => {
                Err(WorldError::ManagerConflict {
                    component: std::any::type_name::<M::Component>(),
                    existing,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn next_id(&self) -> Result<ComponentTypeId, WorldError> {
        u16::try_from(self.slots.len())
            .map(ComponentTypeId)
            .map_err(|_| WorldError::TypeIdsExhausted)
    }

    pub fn insert<M: ComponentManager>(&mut self, id: ComponentTypeId, entry: ManagerEntry<M>) {
        debug_assert_eq!(id.0 as usize, self.slots.len());
        self.by_manager.insert(TypeId::of::<M>(), id);
        self.by_component
            .insert(TypeId::of::<M::Component>(), (id, std::any::type_name::<M>()));
        self.slots.push(Some(Box::new(entry)));
    }

    pub fn get<M: ComponentManager>(&self) -> Option<&M> {
        let id = self.id_of::<M>()?;
        self.get_dyn(id)?.manager_any().downcast_ref::<M>()
    }

    pub fn get_mut<M: ComponentManager>(&mut self) -> Option<&mut M> {
        let id = self.id_of::<M>()?;
        self.get_dyn_mut(id)?.manager_any_mut().downcast_mut::<M>()
    }

    pub fn get_dyn(&self, id: ComponentTypeId) -> Option<&(dyn ErasedManager + 'static)> {
        self.slots.get(id.0 as usize)?.as_deref()
    }

    pub fn get_dyn_mut(&mut self, id: ComponentTypeId) -> Option<&mut (dyn ErasedManager + 'static)> {
        self.slots.get_mut(id.0 as usize)?.as_deref_mut()
    }

    pub fn remove<M: ComponentManager>(&mut self) -> Option<Box<dyn ErasedManager>> {
        let id = self.by_manager.remove(&TypeId::of::<M>())?;
        self.by_component.remove(&TypeId::of::<M::Component>());
        self.slots.get_mut(id.0 as usize)?.take()
    }

    /// Remove every manager, most recently created first.
    pub fn drain(&mut self) -> Vec<(ComponentTypeId, Box<dyn ErasedManager>)> {
        self.by_manager.clear();
        self.by_component.clear();
        self.slots
            .iter_mut()
            .enumerate()
            .rev()
            .filter_map(|(i, slot)| slot.take().map(|m| (ComponentTypeId(i as u16), m)))
            .collect()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn infos(&self) -> Vec<ManagerInfo> {
        self.slots.iter().flatten().map(|m| m.info()).collect()
    }

    /// Run the async functions of every manager, one job per manager, in
    /// parallel. `runnable[i]` lists the functions of type id `i`.
    pub fn run_async(&mut self, state: &WorldState, runnable: &[Vec<usize>]) -> Vec<Outbox> {
        self.slots
            .par_iter_mut()
            .zip(runnable.par_iter())
            .filter_map(|(slot, functions)| {
                if functions.is_empty() {
                    return None;
                }
                let manager = slot.as_mut()?;
                let mut ctx = AsyncContext::new(state);
                manager.run_async(functions, &mut ctx);
                Some(ctx.into_outbox())
            })
            .collect()
    }
}

/// Component with a per-frame update, for use with [`SimpleManager`].
#[allow(unused_variables)]
pub trait UpdatableComponent: Component + Sized {
    /// Synchronous phase the update runs in.
    const PHASE: UpdatePhase = UpdatePhase::PreAsync;

    fn update(&mut self, ctx: &mut ComponentContext<'_, '_>);

    fn register_message_handlers(handlers: &mut MessageHandlers<Self>) {}
}

/// Ready-made manager calling [`UpdatableComponent::update`] on every active
/// component once per frame.
pub struct SimpleManager<C> {
    storage: ComponentStorage<C>,
}

impl<C> Default for SimpleManager<C> {
    fn default() -> Self {
        Self {
            storage: ComponentStorage::new(),
        }
    }
}

impl<C: UpdatableComponent> ComponentManager for SimpleManager<C> {
    type Component = C;

    fn storage(&self) -> &ComponentStorage<C> {
        &self.storage
    }

    fn storage_mut(&mut self) -> &mut ComponentStorage<C> {
        &mut self.storage
    }

    fn update_functions(&self) -> Vec<UpdateFunctionDesc<Self>> {
        vec![UpdateFunctionDesc::sync(
            format!("{}::update", std::any::type_name::<C>()),
            C::PHASE,
            update_components::<C>,
        )]
    }

    fn register_message_handlers(handlers: &mut MessageHandlers<C>) {
        C::register_message_handlers(handlers);
    }
}

fn update_components<C: UpdatableComponent>(manager: &mut SimpleManager<C>, ctx: &mut WorldContext<'_>) {
    for slot in manager.storage.iter_active_mut() {
        let mut cctx = ComponentContext::new(slot.handle(), slot.owner(), ctx);
        slot.component.update(&mut cctx);
    }
}
