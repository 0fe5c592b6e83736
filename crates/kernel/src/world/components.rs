//! Managers, components, activation and init batches.

use std::any::{TypeId, type_name};
use std::time::Instant;

use crate::component::{Component, ComponentFlags};
use crate::error::WorldError;
use crate::handle::{ComponentHandle, GameObjectHandle};
use crate::init_batch::{InitBatch, InitBatchDesc, InitBatchId, InitBatchState};
use crate::manager::{ComponentManager, ManagerEntry, ManagerInfo};
use crate::message::MessageHandlers;
use crate::scheduler::FunctionOwner;
use crate::serialization::{ComponentReader, ComponentWriter, SerializationError};

use super::World;

impl World {
    /// The world's manager of type `M`, created on first use.
    pub fn get_or_create_manager<M: ComponentManager>(&mut self) -> Result<&mut M, WorldError> {
        self.ensure_manager::<M>()?;
        self.managers
            .get_mut::<M>()
            .ok_or(WorldError::Unavailable(type_name::<M>()))
    }

    fn ensure_manager<M: ComponentManager>(&mut self) -> Result<(), WorldError> {
        if self.managers.id_of::<M>().is_some() {
            return Ok(());
        }
        self.managers.check_conflict::<M>()?;
        let id = self.managers.next_id()?;
        let mut manager = M::default();
        manager.storage_mut().bind(id, self.index);
        let functions = manager.update_functions();
        self.scheduler
            .register(FunctionOwner::Manager(id), &functions)?;
        let mut handlers = MessageHandlers::new();
        M::register_message_handlers(&mut handlers);
        self.managers
            .insert(id, ManagerEntry::new(manager, handlers, functions));
        tracing::debug!(manager = type_name::<M>(), ?id, "component manager created");
        Ok(())
    }

    /// The world's `M`, if created.
    pub fn manager<M: ComponentManager>(&self) -> Option<&M> {
        self.managers.get::<M>()
    }

    /// Mutable access to the world's `M`.
    pub fn manager_mut<M: ComponentManager>(&mut self) -> Option<&mut M> {
        self.managers.get_mut::<M>()
    }

    /// The manager that owns component type `C`, if one was created.
    pub fn manager_for_component<C: Component>(&self) -> Option<ManagerInfo> {
        let id = self.managers.id_for_component::<C>()?;
        self.managers.get_dyn(id).map(|m| m.info())
    }

    /// One entry per live manager.
    pub fn managers(&self) -> Vec<ManagerInfo> {
        self.managers.infos()
    }

    /// Destroy every component of `M` immediately, then drop the manager and
    /// its update functions.
    pub fn delete_manager<M: ComponentManager>(&mut self) -> bool {
        let Some(id) = self.managers.id_of::<M>() else {
            return false;
        };
        let handles = self
            .managers
            .get_dyn(id)
            .map(|m| m.handles())
            .unwrap_or_default();
        for handle in handles {
            self.release_component(handle);
        }
        self.managers.remove::<M>();
        self.scheduler.unregister(FunctionOwner::Manager(id));
        tracing::debug!(manager = type_name::<M>(), "component manager deleted");
        true
    }

    /// Add a component to `owner` in the default init batch.
    pub fn create_component<M: ComponentManager>(
        &mut self,
        owner: GameObjectHandle,
        component: M::Component,
    ) -> Result<ComponentHandle, WorldError> {
        self.create_component_in_batch::<M>(owner, component, InitBatchId::DEFAULT)
    }

    /// Add a component to `owner`. It is initialized and activated when
    /// `batch` is processed.
    pub fn create_component_in_batch<M: ComponentManager>(
        &mut self,
        owner: GameObjectHandle,
        component: M::Component,
        batch: InitBatchId,
    ) -> Result<ComponentHandle, WorldError> {
        if !self.state.objects.is_valid(owner) {
            return Err(WorldError::InvalidObject(owner));
        }
        match self.init_batches.get(batch) {
            None => return Err(WorldError::UnknownInitBatch(batch)),
            Some(b) if batch != InitBatchId::DEFAULT && b.state != InitBatchState::Collecting => {
                return Err(WorldError::InitBatchClosed(batch));
            }
            Some(_) => {}
        }
        let manager = self.get_or_create_manager::<M>()?;
        let handle = manager.storage_mut().insert(owner, component);
        self.state.objects.attach_component(owner, handle);
        if let Some(b) = self.init_batches.get_mut(batch) {
            b.members.push(handle);
        }
        tracing::trace!(component = %handle, object = %owner, ?batch, "component created");
        Ok(handle)
    }

    /// Create a component from serialized data. `deserialize` runs on the
    /// fully constructed value before it joins the world.
    pub fn create_component_from<M: ComponentManager>(
        &mut self,
        owner: GameObjectHandle,
        mut component: M::Component,
        reader: &dyn ComponentReader,
        version: u32,
    ) -> Result<ComponentHandle, WorldError> {
        let supported = <M::Component as Component>::VERSION;
        if version > supported {
            return Err(SerializationError::UnsupportedVersion {
                component: type_name::<M::Component>(),
                found: version,
                current: supported,
            }
            .into());
        }
        component.deserialize(reader, version)?;
        self.create_component::<M>(owner, component)
    }

    /// Write a component's fields. Returns the format version written.
    pub fn serialize_component(
        &self,
        handle: ComponentHandle,
        writer: &mut dyn ComponentWriter,
    ) -> Result<u32, WorldError> {
        self.managers
            .get_dyn(handle.type_id())
            .and_then(|m| m.serialize(handle, writer))
            .ok_or(WorldError::InvalidComponent(handle))?
            .map_err(WorldError::from)
    }

    /// Queue a component for the next delete sweep.
    pub fn destroy_component(&mut self, handle: ComponentHandle) -> bool {
        if !self.is_component_valid(handle) {
            return false;
        }
        self.state.deletions.components.push(handle);
        true
    }

    /// Whether `handle` still names a live component.
    pub fn is_component_valid(&self, handle: ComponentHandle) -> bool {
        handle.world_index() == self.index && self.component_owner(handle).is_some()
    }

    /// The component behind `handle`, `None` when stale or of another type.
    pub fn component<C: Component>(&self, handle: ComponentHandle) -> Option<&C> {
        self.managers
            .get_dyn(handle.type_id())?
            .component_any(handle)?
            .downcast_ref::<C>()
    }

    /// Mutable access to the component behind `handle`.
    pub fn component_mut<C: Component>(&mut self, handle: ComponentHandle) -> Option<&mut C> {
        self.managers
            .get_dyn_mut(handle.type_id())?
            .component_any_mut(handle)?
            .downcast_mut::<C>()
    }

    /// The object the component is attached to.
    pub fn component_owner(&self, handle: ComponentHandle) -> Option<GameObjectHandle> {
        self.managers.get_dyn(handle.type_id())?.owner(handle)
    }

    /// Lifecycle flags of the component.
    pub fn component_flags(&self, handle: ComponentHandle) -> Option<ComponentFlags> {
        self.managers.get_dyn(handle.type_id())?.flags(handle)
    }

    /// Type name of the component behind `handle`.
    pub fn component_type_name(&self, handle: ComponentHandle) -> Option<&'static str> {
        let manager = self.managers.get_dyn(handle.type_id())?;
        manager.owner(handle)?;
        Some(manager.info().component.name)
    }

    /// Components of type `C` attached to `object`, in attachment order.
    pub fn components_of<C: Component>(&self, object: GameObjectHandle) -> Vec<ComponentHandle> {
        let Some(type_id) = self.managers.id_for_component::<C>() else {
            return Vec::new();
        };
        self.state
            .objects
            .components(object)
            .iter()
            .copied()
            .filter(|c| c.type_id() == type_id)
            .collect()
    }

    /// First component of type `C` on `object`.
    pub fn component_of<C: Component>(&self, object: GameObjectHandle) -> Option<ComponentHandle> {
        self.components_of::<C>(object).into_iter().next()
    }

    /// Whether any component of `object` is of type `C`.
    pub fn has_component<C: Component>(&self, object: GameObjectHandle) -> bool {
        let component = TypeId::of::<C>();
        self.state.objects.components(object).iter().any(|c| {
            self.managers
                .get_dyn(c.type_id())
                .is_some_and(|m| m.info().component.type_id == component)
        })
    }

    /// Set the component's own active flag and run activation hooks if its
    /// effective state changes. Components still waiting for initialization
    /// activate once initialized.
    pub fn set_component_active(&mut self, handle: ComponentHandle, active: bool) -> bool {
        let Some(owner) = self.component_owner(handle) else {
            return false;
        };
        let owner_active = self
            .state
            .objects
            .get(owner)
            .is_some_and(|o| o.is_active_in_hierarchy());
        let Some(manager) = self.managers.get_dyn_mut(handle.type_id()) else {
            return false;
        };
        manager.set_own_active(handle, active);
        manager.update_activation(handle, owner_active, &mut self.state.context());
        true
    }

    /// Re-evaluate activation of every component on `objects`.
    pub(crate) fn apply_activation_changes(&mut self, objects: &[GameObjectHandle]) {
        for &object in objects {
            let Some(o) = self.state.objects.get(object) else {
                continue;
            };
            let active = o.is_active_in_hierarchy();
            let components = o.components().to_vec();
            for component in components {
                if let Some(manager) = self.managers.get_dyn_mut(component.type_id()) {
                    manager.update_activation(component, active, &mut self.state.context());
                }
            }
        }
    }

    /// Deactivate, deinitialize and free one component.
    pub(crate) fn release_component(&mut self, handle: ComponentHandle) -> bool {
        let Some(manager) = self.managers.get_dyn_mut(handle.type_id()) else {
            return false;
        };
        let Some(owner) = manager.release(handle, &mut self.state.context()) else {
            return false;
        };
        self.state.objects.detach_component(owner, handle);
        self.stats.last.components_deleted += 1;
        true
    }

    // Init batches

    /// A new, collecting init batch.
    pub fn create_init_batch(&mut self, desc: InitBatchDesc) -> InitBatchId {
        self.init_batches.create(desc)
    }

    /// Hand a batch to the frame loop. A must-finish batch is processed
    /// right away and either completes or fails here.
    pub fn submit_init_batch(&mut self, id: InitBatchId) -> Result<(), WorldError> {
        if id == InitBatchId::DEFAULT {
            return Err(WorldError::DefaultInitBatch("submitted"));
        }
        let mut batch = self
            .init_batches
            .take(id)
            .ok_or(WorldError::UnknownInitBatch(id))?;
        if batch.state != InitBatchState::Collecting {
            self.init_batches.put(id, batch);
            return Err(WorldError::InitBatchClosed(id));
        }
        batch.state = InitBatchState::Submitted;
        tracing::debug!(batch = %batch.desc.name, members = batch.members.len(), "init batch submitted");

        let mut result = Ok(());
        if batch.desc.must_finish_within_frame {
            let budget = batch.desc.time_budget;
            if self.run_init_batch(&mut batch, budget, true) {
                batch.state = InitBatchState::Complete;
            } else {
                let initialized = batch.initialized;
                for &handle in &batch.members[..initialized] {
                    if let Some(manager) = self.managers.get_dyn_mut(handle.type_id()) {
                        manager.rollback_initialize(handle, &mut self.state.context());
                    }
                }
                batch.state = InitBatchState::Failed;
                tracing::warn!(batch = %batch.desc.name, initialized, total = batch.members.len(), "init batch missed its frame budget");
                result = Err(WorldError::InitBatchFailed {
                    name: batch.desc.name.clone(),
                    initialized,
                    total: batch.members.len(),
                });
            }
        }
        self.init_batches.put(id, batch);
        result
    }

    /// Stop a batch. Members that have not finished are moved to the
    /// default batch.
    pub fn cancel_init_batch(&mut self, id: InitBatchId) -> Result<(), WorldError> {
        if id == InitBatchId::DEFAULT {
            return Err(WorldError::DefaultInitBatch("cancelled"));
        }
        let batch = self
            .init_batches
            .get_mut(id)
            .ok_or(WorldError::UnknownInitBatch(id))?;
        if matches!(batch.state, InitBatchState::Complete | InitBatchState::Failed) {
            return Ok(());
        }
        batch.state = InitBatchState::Cancelled;
        let unfinished = batch.unfinished().to_vec();
        batch.members.truncate(batch.finished);
        batch.initialized = batch.initialized.min(batch.finished);
        tracing::debug!(batch = %batch.desc.name, moved = unfinished.len(), "init batch cancelled");
        if let Some(default) = self.init_batches.get_mut(InitBatchId::DEFAULT) {
            default.members.extend(unfinished);
        }
        Ok(())
    }

    /// Forget a batch and free its bookkeeping. Members that have not
    /// finished initializing, including those of a failed batch, move to the
    /// default batch.
    pub fn delete_init_batch(&mut self, id: InitBatchId) -> Result<(), WorldError> {
        if id == InitBatchId::DEFAULT {
            return Err(WorldError::DefaultInitBatch("deleted"));
        }
        let batch = self
            .init_batches
            .take(id)
            .ok_or(WorldError::UnknownInitBatch(id))?;
        let unfinished = if batch.is_done() {
            Vec::new()
        } else {
            batch.unfinished().to_vec()
        };
        tracing::debug!(batch = %batch.desc.name, moved = unfinished.len(), "init batch deleted");
        if let Some(default) = self.init_batches.get_mut(InitBatchId::DEFAULT) {
            default.members.extend(unfinished);
        }
        Ok(())
    }

    /// Fraction of the batch's work done, counting the initialize and
    /// activation passes equally.
    pub fn init_batch_progress(&self, id: InitBatchId) -> Option<f32> {
        self.init_batches.get(id).map(InitBatch::progress)
    }

    /// Whether the batch finished both passes.
    pub fn is_init_batch_completed(&self, id: InitBatchId) -> bool {
        self.init_batches
            .get(id)
            .is_some_and(|b| b.state == InitBatchState::Complete)
    }

    /// Current state of the batch, `None` once deleted.
    pub fn init_batch_state(&self, id: InitBatchId) -> Option<InitBatchState> {
        self.init_batches.get(id).map(|b| b.state)
    }

    /// Frame step: advance every submitted batch within its budget.
    pub(crate) fn process_init_batches(&mut self) {
        for id in self.init_batches.pending() {
            let Some(mut batch) = self.init_batches.take(id) else {
                continue;
            };
            let budget = if id == InitBatchId::DEFAULT {
                self.state.config.default_init_batch_budget()
            } else {
                batch.desc.time_budget
            };
            if self.run_init_batch(&mut batch, budget, false) {
                if id == InitBatchId::DEFAULT {
                    if !batch.members.is_empty() {
                        batch.reset();
                    }
                } else {
                    batch.state = InitBatchState::Complete;
                    tracing::debug!(batch = %batch.desc.name, "init batch complete");
                }
            }
            self.init_batches.put(id, batch);
        }
    }

    /// Run the initialize pass, then the activation pass, stopping when
    /// `budget` runs out. With `abort_on_overrun` only the initialize pass
    /// is budgeted. Returns whether the batch finished.
    fn run_init_batch(
        &mut self,
        batch: &mut InitBatch,
        budget: Option<std::time::Duration>,
        abort_on_overrun: bool,
    ) -> bool {
        let started = Instant::now();
        let out_of_time = || budget.is_some_and(|b| started.elapsed() >= b);
        let total = batch.members.len();

        while batch.initialized < total {
            let handle = batch.members[batch.initialized];
            batch.initialized += 1;
            if self.initialize_component(handle) {
                self.stats.last.components_initialized += 1;
            }
            if batch.initialized < total && out_of_time() {
                return false;
            }
        }
        while batch.finished < total {
            let handle = batch.members[batch.finished];
            batch.finished += 1;
            self.finish_component_init(handle);
            if !abort_on_overrun && batch.finished < total && out_of_time() {
                return false;
            }
        }
        true
    }

    fn initialize_component(&mut self, handle: ComponentHandle) -> bool {
        let Some(manager) = self.managers.get_dyn_mut(handle.type_id()) else {
            return false;
        };
        let Some(owner) = manager.owner(handle) else {
            return false;
        };
        if self
            .state
            .objects
            .get(owner)
            .is_none_or(|o| o.is_pending_delete())
        {
            return false;
        }
        manager.initialize(handle, &mut self.state.context())
    }

    fn finish_component_init(&mut self, handle: ComponentHandle) {
        let Some(manager) = self.managers.get_dyn_mut(handle.type_id()) else {
            return;
        };
        let Some(owner) = manager.owner(handle) else {
            return;
        };
        let owner_active = self
            .state
            .objects
            .get(owner)
            .is_some_and(|o| o.is_active_in_hierarchy());
        manager.finish_init(handle, owner_active, &mut self.state.context());
    }
}
