//! World modules: per-world singletons for subsystems that are not tied to
//! one object (spatial indices, audio mixers, navigation, ...).

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::context::WorldContext;
use crate::error::WorldError;
use crate::scheduler::{UpdateFn, UpdateFunctionDesc};

/// A per-world singleton. At most one instance of each module type exists
/// in a world; lookups are idempotent.
#[allow(unused_variables)]
pub trait WorldModule: Default + Send + Sync + 'static {
    /// Called once, right after the module is created.
    fn initialize(&mut self, ctx: &mut WorldContext<'_>) {}

    /// Called once, before the module is dropped by the world.
    fn deinitialize(&mut self, ctx: &mut WorldContext<'_>) {}

    /// Update functions to schedule. Modules may only use the synchronous
    /// phases.
    fn update_functions(&self) -> Vec<UpdateFunctionDesc<Self>> {
        Vec::new()
    }
}

/// Per-world identifier of a registered module type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleTypeId(pub u16);

pub(crate) trait ErasedModule: Send + Sync {
    fn name(&self) -> &'static str;
    fn module_any(&self) -> &dyn Any;
    fn module_any_mut(&mut self) -> &mut dyn Any;
    fn run(&mut self, function: usize, ctx: &mut WorldContext<'_>);
    fn deinitialize(&mut self, ctx: &mut WorldContext<'_>);
}

pub(crate) struct ModuleEntry<T: WorldModule> {
    pub module: T,
    pub functions: Vec<UpdateFunctionDesc<T>>,
}

impl<T: WorldModule> ErasedModule for ModuleEntry<T> {
    fn name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn module_any(&self) -> &dyn Any {
        &self.module
    }

    fn module_any_mut(&mut self) -> &mut dyn Any {
        &mut self.module
    }

    fn run(&mut self, function: usize, ctx: &mut WorldContext<'_>) {
        if let Some(UpdateFn::Sync(f)) = self.functions.get(function).map(|d| d.func()) {
            f(&mut self.module, ctx);
        }
    }

    fn deinitialize(&mut self, ctx: &mut WorldContext<'_>) {
        self.module.deinitialize(ctx);
    }
}

/// Modules of one world, indexed by [`ModuleTypeId`]. Ids are never reused.
#[derive(Default)]
pub(crate) struct ModuleRegistry {
    slots: Vec<Option<Box<dyn ErasedModule>>>,
    by_type: HashMap<TypeId, ModuleTypeId>,
}

impl ModuleRegistry {
    pub fn id_of<T: WorldModule>(&self) -> Option<ModuleTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn get<T: WorldModule>(&self) -> Option<&T> {
        let id = self.id_of::<T>()?;
        self.slots
            .get(id.0 as usize)?
            .as_ref()?
            .module_any()
            .downcast_ref::<T>()
    }

    pub fn get_mut<T: WorldModule>(&mut self) -> Option<&mut T> {
        let id = self.id_of::<T>()?;
        self.slots
            .get_mut(id.0 as usize)?
            .as_mut()?
            .module_any_mut()
            .downcast_mut::<T>()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Type names of the registered modules, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.slots.iter().flatten().map(|m| m.name()).collect()
    }

    pub fn next_id(&self) -> Result<ModuleTypeId, WorldError> {
        u16::try_from(self.slots.len())
            .map(ModuleTypeId)
            .map_err(|_| WorldError::TypeIdsExhausted)
    }

    pub fn insert<T: WorldModule>(&mut self, id: ModuleTypeId, entry: ModuleEntry<T>) {
        debug_assert_eq!(id.0 as usize, self.slots.len());
        self.by_type.insert(TypeId::of::<T>(), id);
        self.slots.push(Some(Box::new(entry)));
    }

    /// Take a module out while its own update function runs, so the rest of
    /// the registry stays reachable through the context.
    pub fn take(&mut self, id: ModuleTypeId) -> Option<Box<dyn ErasedModule>> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    pub fn restore(&mut self, id: ModuleTypeId, module: Box<dyn ErasedModule>) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            *slot = Some(module);
        }
    }

    pub fn remove<T: WorldModule>(&mut self) -> Option<(ModuleTypeId, Box<dyn ErasedModule>)> {
        let id = self.by_type.remove(&TypeId::of::<T>())?;
        let module = self.slots.get_mut(id.0 as usize)?.take()?;
        Some((id, module))
    }

    /// Remove every module, most recently created first.
    pub fn drain(&mut self) -> Vec<(ModuleTypeId, Box<dyn ErasedModule>)> {
        self.by_type.clear();
        self.slots
            .iter_mut()
            .enumerate()
            .rev()
            .filter_map(|(i, slot)| slot.take().map(|m| (ModuleTypeId(i as u16), m)))
            .collect()
    }
}
