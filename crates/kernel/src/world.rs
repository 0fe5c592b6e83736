use std::any::type_name;

use worldspace_common::Transform;

use crate::clock::{WorldClock, WorldRandom};
use crate::config::WorldConfig;
use crate::context::{DeleteQueue, WorldContext, WorldState};
use crate::error::WorldError;
use crate::handle::{ComponentTypeId, GameObjectHandle};
use crate::init_batch::InitBatches;
use crate::manager::ManagerRegistry;
use crate::message::{GlobalHandlers, MessageQueues};
use crate::module::{ModuleEntry, ModuleRegistry, WorldModule};
use crate::object::{GameObject, GameObjectDesc, ObjectStore, TransformPreservation};
use crate::scheduler::{FunctionOwner, Scheduler};
use crate::stats::FrameStats;

mod components;
mod messaging;
mod update;

/// A self-contained simulation: objects, components and their managers,
/// modules, the update schedule and the message queues.
///
/// Every mutation goes through an explicit operation. Object and component
/// deletion is deferred to the delete sweep of [`World::update`], so handles
/// stay valid for the rest of the frame they were destroyed in.
pub struct World {
    index: u8,
    state: WorldState,
    managers: ManagerRegistry,
    scheduler: Scheduler,
    init_batches: InitBatches,
    /// Dedicated async worker pool; `None` runs on rayon's global pool.
    pool: Option<rayon::ThreadPool>,
    stats: FrameStats,
}

impl World {
    /// Create a standalone world with index 0.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        Self::with_index(config, 0)
    }

    /// Create a world whose handles carry `index`. Worlds sharing a process
    /// should get distinct indices from a [`crate::WorldRegistry`].
    pub fn with_index(config: WorldConfig, index: u8) -> Result<Self, WorldError> {
        let pool = match config.worker_threads {
            0 => None,
            threads => {
                let name = config.name.clone();
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(move |i| format!("{name}-worker-{i}"))
                    .build()
                    .map_err(|e| WorldError::ThreadPool(e.to_string()))?;
                Some(pool)
            }
        };
        tracing::info!(
            world = %config.name,
            index,
            worker_threads = config.worker_threads,
            "world created"
        );
        let state = WorldState {
            objects: ObjectStore::new(index, config.report_static_transform_changes),
            modules: ModuleRegistry::default(),
            queues: MessageQueues::default(),
            deletions: DeleteQueue::default(),
            global_handlers: GlobalHandlers::default(),
            clock: WorldClock::new(config.clock_speed),
            random: WorldRandom::new(config.seed),
            simulating: config.simulation_enabled,
            config,
        };
        Ok(Self {
            index,
            stats: FrameStats::new(state.config.frame_stats_window),
            state,
            managers: ManagerRegistry::default(),
            scheduler: Scheduler::new(),
            init_batches: InitBatches::new(),
            pool,
        })
    }

    /// Index carried by every handle this world issues.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Display name from the configuration.
    pub fn name(&self) -> &str {
        &self.state.config.name
    }

    /// The configuration the world was created with.
    pub fn config(&self) -> &WorldConfig {
        &self.state.config
    }

    /// Frame counter and accumulated simulation time.
    pub fn clock(&self) -> &WorldClock {
        &self.state.clock
    }

    /// Scale every following time step by `speed`; `0` pauses simulation time.
    pub fn set_clock_speed(&mut self, speed: f64) {
        self.state.clock.set_speed(speed);
    }

    /// Registered update functions, per phase.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Timings and counters of recent frames.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// A context for code running outside the frame loop, e.g. tools that
    /// want to post messages or queue deletions the way components do.
    pub fn context(&mut self) -> WorldContext<'_> {
        self.state.context()
    }

    /// Whether simulation-only update functions run.
    pub fn is_simulating(&self) -> bool {
        self.state.simulating
    }

    /// Enable or disable simulation. Enabling starts every activated
    /// component that has not started yet.
    pub fn set_simulation_enabled(&mut self, enabled: bool) {
        if self.state.simulating == enabled {
            return;
        }
        self.state.simulating = enabled;
        tracing::info!(world = %self.state.config.name, enabled, "simulation toggled");
        if enabled {
            for id in 0..self.managers.slot_count() {
                let id = ComponentTypeId(id as u16);
                if let Some(manager) = self.managers.get_dyn_mut(id) {
                    manager.start_simulation(&mut self.state.context());
                }
            }
        }
    }

    // Objects

    /// Read access to the object hierarchy.
    pub fn objects(&self) -> &ObjectStore {
        &self.state.objects
    }

    /// Write access to names, flags, keys and transforms of objects.
    pub fn objects_mut(&mut self) -> &mut ObjectStore {
        &mut self.state.objects
    }

    /// Create an object from `desc`. The parent, if any, must be valid.
    pub fn create_object(&mut self, desc: GameObjectDesc) -> Result<GameObjectHandle, WorldError> {
        let handle = self.state.objects.create(desc)?;
        tracing::trace!(object = %handle, "object created");
        Ok(handle)
    }

    /// The object behind `handle`, or `None` when the handle is stale.
    pub fn object(&self, handle: GameObjectHandle) -> Option<&GameObject> {
        self.state.objects.get(handle)
    }

    /// Whether `handle` still names a live object.
    pub fn is_object_valid(&self, handle: GameObjectHandle) -> bool {
        self.state.objects.is_valid(handle)
    }

    /// The object registered under `key`.
    pub fn object_by_global_key(&self, key: &str) -> Option<GameObjectHandle> {
        self.state.objects.object_by_global_key(key)
    }

    /// Set the transform relative to the parent.
    pub fn set_local_transform(&mut self, handle: GameObjectHandle, transform: Transform) -> bool {
        self.state.objects.set_local_transform(handle, transform)
    }

    /// Set the world-space transform; the local transform is derived from the
    /// parent.
    pub fn set_global_transform(&mut self, handle: GameObjectHandle, transform: Transform) -> bool {
        self.state.objects.set_global_transform(handle, transform)
    }

    /// Re-parent `child`. Components whose effective activation changes get
    /// their activation hooks immediately.
    pub fn set_parent(
        &mut self,
        child: GameObjectHandle,
        parent: Option<GameObjectHandle>,
        preservation: TransformPreservation,
    ) -> Result<(), WorldError> {
        let changed = self.state.objects.set_parent(child, parent, preservation)?;
        self.apply_activation_changes(&changed);
        Ok(())
    }

    /// Set the object's own active flag. Components of the object and its
    /// descendants whose effective state changes get their activation hooks.
    pub fn set_object_active(&mut self, handle: GameObjectHandle, active: bool) -> bool {
        if !self.state.objects.is_valid(handle) {
            return false;
        }
        let changed = self.state.objects.set_active(handle, active);
        self.apply_activation_changes(&changed);
        true
    }

    /// Queue the object and its subtree for the next delete sweep. With
    /// `cascade_empty_parents`, ancestors left without children or
    /// components are removed too.
    pub fn destroy_object(&mut self, handle: GameObjectHandle, cascade_empty_parents: bool) -> bool {
        self.state.queue_object_deletion(handle, cascade_empty_parents)
    }

    /// Remove the object and its subtree now, bypassing the delete queue.
    pub fn destroy_object_immediate(&mut self, handle: GameObjectHandle) -> bool {
        if !self.state.objects.is_valid(handle) {
            return false;
        }
        self.remove_object_now(handle, false);
        true
    }

    // Modules

    /// The world's instance of `T`, created and initialized on first use.
    pub fn get_or_create_module<T: WorldModule>(&mut self) -> Result<&mut T, WorldError> {
        if self.state.modules.id_of::<T>().is_none() {
            self.create_module::<T>()?;
        }
        self.state
            .modules
            .get_mut::<T>()
            .ok_or(WorldError::Unavailable(type_name::<T>()))
    }

    fn create_module<T: WorldModule>(&mut self) -> Result<(), WorldError> {
        let id = self.state.modules.next_id()?;
        let mut module = T::default();
        let functions = module.update_functions();
        self.scheduler
            .register(FunctionOwner::Module(id), &functions)?;
        module.initialize(&mut self.state.context());
        self.state
            .modules
            .insert(id, ModuleEntry { module, functions });
        tracing::debug!(module = type_name::<T>(), ?id, "module created");
        Ok(())
    }

    /// The world's instance of `T`, if created.
    pub fn module<T: WorldModule>(&self) -> Option<&T> {
        self.state.modules.get::<T>()
    }

    /// Mutable access to the world's instance of `T`.
    pub fn module_mut<T: WorldModule>(&mut self) -> Option<&mut T> {
        self.state.modules.get_mut::<T>()
    }

    /// Type names of the live modules.
    pub fn module_names(&self) -> Vec<&'static str> {
        self.state.modules.names()
    }

    /// Deinitialize and drop the world's `T`. Its update functions stop
    /// running.
    pub fn delete_module<T: WorldModule>(&mut self) -> bool {
        let Some((id, mut module)) = self.state.modules.remove::<T>() else {
            return false;
        };
        self.scheduler.unregister(FunctionOwner::Module(id));
        module.deinitialize(&mut self.state.context());
        tracing::debug!(module = type_name::<T>(), "module deleted");
        true
    }

    /// Destroy every object, component, manager and module, and drop all
    /// pending messages. The world stays usable.
    pub fn clear(&mut self) {
        let roots = self.state.objects.roots().to_vec();
        for root in roots {
            self.remove_object_now(root, false);
        }
        for (id, _) in self.managers.drain() {
            self.scheduler.unregister(FunctionOwner::Manager(id));
        }
        for (id, mut module) in self.state.modules.drain() {
            self.scheduler.unregister(FunctionOwner::Module(id));
            module.deinitialize(&mut self.state.context());
        }
        self.state.objects.clear();
        self.state.queues.clear();
        self.state.deletions = DeleteQueue::default();
        self.state.global_handlers.clear();
        self.init_batches.clear();
        tracing::debug!(world = %self.state.config.name, "world cleared");
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.state.config.name)
            .field("index", &self.index)
            .field("frame", &self.state.clock.frame())
            .field("objects", &self.state.objects.len())
            .field("managers", &self.managers.infos().len())
            .field("modules", &self.state.modules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::context::ComponentContext;
    use crate::manager::{SimpleManager, UpdatableComponent};
    use crate::component::Component;
    use crate::scheduler::{UpdateFunctionDesc, UpdatePhase};

    fn world() -> World {
        World::new(WorldConfig::default()).unwrap()
    }

    #[derive(Default)]
    struct Ticker {
        ticks: u32,
    }

    impl WorldModule for Ticker {
        fn update_functions(&self) -> Vec<UpdateFunctionDesc<Self>> {
            vec![UpdateFunctionDesc::sync(
                "ticker",
                UpdatePhase::PreAsync,
                |t: &mut Ticker, _ctx| t.ticks += 1,
            )]
        }
    }

    #[derive(Default)]
    struct Spin {
        turns: u32,
    }

    impl Component for Spin {}

    impl UpdatableComponent for Spin {
        fn update(&mut self, _ctx: &mut ComponentContext<'_, '_>) {
            self.turns += 1;
        }
    }

    #[test]
    fn module_lookup_is_idempotent() {
        let mut world = world();
        world.get_or_create_module::<Ticker>().unwrap().ticks = 5;
        assert_eq!(world.get_or_create_module::<Ticker>().unwrap().ticks, 5);
        assert_eq!(world.module_names().len(), 1);
    }

    #[test]
    fn deleted_module_stops_updating() {
        let mut world = world();
        world.get_or_create_module::<Ticker>().unwrap();
        world.update();
        assert_eq!(world.module::<Ticker>().unwrap().ticks, 1);
        assert!(world.delete_module::<Ticker>());
        assert!(!world.delete_module::<Ticker>());
        world.update();
        assert!(world.module::<Ticker>().is_none());
        assert!(world.scheduler().is_empty());
    }

    #[test]
    fn clear_empties_the_world() {
        let mut world = world();
        let object = world.create_object(GameObjectDesc::new()).unwrap();
        let component = world
            .create_component::<SimpleManager<Spin>>(object, Spin::default())
            .unwrap();
        world.get_or_create_module::<Ticker>().unwrap();
        world.update();
        world.clear();
        assert!(!world.is_object_valid(object));
        assert!(world.component::<Spin>(component).is_none());
        assert!(world.module::<Ticker>().is_none());
        assert!(world.scheduler().is_empty());
        world.create_object(GameObjectDesc::new()).unwrap();
        world.update();
    }

    #[test]
    fn inactive_parent_deactivates_components() {
        let mut world = world();
        let parent = world.create_object(GameObjectDesc::new()).unwrap();
        let child = world
            .create_object(GameObjectDesc::new().with_parent(parent))
            .unwrap();
        let spin = world
            .create_component::<SimpleManager<Spin>>(child, Spin::default())
            .unwrap();
        world.update();
        assert!(world.component_flags(spin).unwrap().activated);
        world.set_object_active(parent, false);
        assert!(!world.component_flags(spin).unwrap().activated);
        world.update();
        assert_eq!(world.component::<Spin>(spin).unwrap().turns, 1);
        world.set_object_active(parent, true);
        world.update();
        assert_eq!(world.component::<Spin>(spin).unwrap().turns, 2);
    }

    #[test]
    fn dedicated_pool_is_built_from_config() {
        let config = WorldConfig {
            worker_threads: 2,
            ..WorldConfig::default()
        };
        let world = World::new(config).unwrap();
        assert!(world.pool.is_some());
        assert!(format!("{world:?}").starts_with("World"));
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let mut world = world();
        let a = world.create_object(GameObjectDesc::new()).unwrap();
        let b = world
            .create_object(GameObjectDesc::new().with_parent(a))
            .unwrap();
        let err = world
            .set_parent(a, Some(b), TransformPreservation::KeepLocal)
            .unwrap_err();
        assert!(matches!(err, WorldError::HierarchyCycle { .. }));
        assert_eq!(world.objects().parent(b), Some(a));
    }

    #[test]
    fn clock_advances_by_fixed_step() {
        let mut world = world();
        world.update();
        world.update_with_step(Duration::from_millis(100));
        assert_eq!(world.clock().frame(), 2);
        assert!(world.clock().elapsed() > Duration::from_millis(100));
    }
}
