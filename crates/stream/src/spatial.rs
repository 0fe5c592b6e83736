//! Spatial grid world module and the proxy component that feeds it.
//!
//! An object is tracked while it carries an active [`SpatialProxy`]. The
//! module follows tracked objects through the object store's moved list in
//! the post-transform phase and tells the owner when it crosses a cell
//! border.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use glam::Vec3;
use worldspace_kernel::{
    Component, ComponentContext, ComponentManager, ComponentReader, ComponentStorage,
    ComponentWriter, GameObjectHandle, QueueType, SerializationError, UpdateFunctionDesc,
    UpdatePhase, WorldContext, WorldModule,
};

use crate::grid::{CellCoord, GridPartition};

/// Cell size used until [`SpatialGridModule::set_cell_size`] is called.
pub const DEFAULT_CELL_SIZE: f32 = 16.0;

/// Posted to an object (on the next-frame queue) when the spatial module
/// moves it to another cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChanged {
    pub object: GameObjectHandle,
    pub from: CellCoord,
    pub to: CellCoord,
}

/// Per-world spatial index over objects carrying a [`SpatialProxy`].
#[derive(Debug)]
pub struct SpatialGridModule {
    grid: GridPartition,
    /// Active proxy count and last known position of each tracked object.
    tracked: HashMap<GameObjectHandle, (u32, Vec3)>,
    cell_changes: u64,
}

impl Default for SpatialGridModule {
    fn default() -> Self {
        Self {
            grid: GridPartition::new(DEFAULT_CELL_SIZE),
            tracked: HashMap::new(),
            cell_changes: 0,
        }
    }
}

impl SpatialGridModule {
    pub fn grid(&self) -> &GridPartition {
        &self.grid
    }

    /// Total cell border crossings seen since the module was created.
    pub fn cell_changes(&self) -> u64 {
        self.cell_changes
    }

    pub fn is_tracked(&self, object: GameObjectHandle) -> bool {
        self.grid.contains(object)
    }

    pub fn cell_of(&self, object: GameObjectHandle) -> Option<CellCoord> {
        self.grid.cell_of(object)
    }

    /// Tracked objects within `radius` cells of the cell containing
    /// `position`.
    pub fn objects_near(&self, position: Vec3, radius: i32) -> HashSet<GameObjectHandle> {
        self.grid
            .objects_in_radius(self.grid.position_to_cell(position), radius)
    }

    /// Change the cell size, re-placing every tracked object at its last
    /// known position.
    pub fn set_cell_size(&mut self, cell_size: f32) {
        self.grid = GridPartition::new(cell_size);
        for (object, (_, position)) in &self.tracked {
            self.grid.place(*object, *position);
        }
        tracing::debug!(cell_size = self.grid.cell_size(), tracked = self.grid.len(), "spatial grid rebuilt");
    }

    fn track(&mut self, object: GameObjectHandle, position: Vec3) {
        let entry = self.tracked.entry(object).or_insert((0, position));
        entry.0 += 1;
        if entry.0 == 1 {
            self.grid.place(object, position);
        }
    }

    fn untrack(&mut self, object: GameObjectHandle) {
        let Some(entry) = self.tracked.get_mut(&object) else {
            return;
        };
        entry.0 -= 1;
        if entry.0 == 0 {
            self.tracked.remove(&object);
            self.grid.remove(object);
        }
    }

    fn sync_moved(&mut self, ctx: &mut WorldContext<'_>) {
        let moved: Vec<_> = ctx
            .objects()
            .moved_objects()
            .iter()
            .copied()
            .filter(|h| self.grid.contains(*h))
            .collect();
        for object in moved {
            let Some(global) = ctx.objects().global_transform(object) else {
                continue;
            };
            let Some(from) = self.grid.cell_of(object) else {
                continue;
            };
            if let Some(entry) = self.tracked.get_mut(&object) {
                entry.1 = global.position;
            }
            if self.grid.place(object, global.position) {
                let to = self.grid.position_to_cell(global.position);
                self.cell_changes += 1;
                tracing::trace!(%object, ?from, ?to, "object changed cell");
                ctx.post_message(
                    object,
                    CellChanged { object, from, to },
                    Duration::ZERO,
                    QueueType::NextFrame,
                );
            }
        }
    }
}

impl WorldModule for SpatialGridModule {
    fn deinitialize(&mut self, _ctx: &mut WorldContext<'_>) {
        self.grid.clear();
        self.tracked.clear();
    }

    fn update_functions(&self) -> Vec<UpdateFunctionDesc<Self>> {
        vec![UpdateFunctionDesc::sync(
            "spatial_grid::sync_moved",
            UpdatePhase::PostTransform,
            SpatialGridModule::sync_moved,
        )]
    }
}

/// Marks its owner as tracked by the world's [`SpatialGridModule`].
///
/// The module must exist before the proxy activates; proxies activated
/// without it are ignored.
#[derive(Debug, Clone, Default)]
pub struct SpatialProxy {
    /// Free-form tag for queries and tooling.
    pub layer: u32,
}

impl SpatialProxy {
    pub fn on_layer(layer: u32) -> Self {
        Self { layer }
    }
}

impl Component for SpatialProxy {
    fn on_activated(&mut self, ctx: &mut ComponentContext<'_, '_>) {
        let owner = ctx.owner();
        let Some(position) = ctx.owner_object().map(|o| o.global_transform().position) else {
            return;
        };
        match ctx.module_mut::<SpatialGridModule>() {
            Some(module) => module.track(owner, position),
            None => tracing::warn!(object = %owner, "spatial proxy activated without a spatial grid module"),
        }
    }

    fn on_deactivated(&mut self, ctx: &mut ComponentContext<'_, '_>) {
        let owner = ctx.owner();
        if let Some(module) = ctx.module_mut::<SpatialGridModule>() {
            module.untrack(owner);
        }
    }

    fn serialize(&self, writer: &mut dyn ComponentWriter) -> Result<(), SerializationError> {
        writer.write("layer", self.layer);
        Ok(())
    }

    fn deserialize(&mut self, reader: &dyn ComponentReader, _version: u32) -> Result<(), SerializationError> {
        self.layer = reader.read_or("layer", 0)?;
        Ok(())
    }
}

/// Manager of [`SpatialProxy`] components. Proxies have no per-frame work.
#[derive(Default)]
pub struct SpatialProxies {
    storage: ComponentStorage<SpatialProxy>,
}

impl ComponentManager for SpatialProxies {
    type Component = SpatialProxy;

    fn storage(&self) -> &ComponentStorage<SpatialProxy> {
        &self.storage
    }

    fn storage_mut(&mut self) -> &mut ComponentStorage<SpatialProxy> {
        &mut self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldspace_common::Transform;
    use worldspace_kernel::{
        GameObjectDesc, MessageHandlers, SimpleManager, UpdatableComponent, World, WorldConfig,
    };

    fn world() -> World {
        let mut world = World::new(WorldConfig::default()).unwrap();
        world.get_or_create_module::<SpatialGridModule>().unwrap();
        world
    }

    fn spawn(world: &mut World, position: Vec3) -> GameObjectHandle {
        let object = world
            .create_object(
                GameObjectDesc::new()
                    .with_transform(Transform::from_position(position))
                    .dynamic(),
            )
            .unwrap();
        world
            .create_component::<SpatialProxies>(object, SpatialProxy::default())
            .unwrap();
        object
    }

    fn grid(world: &World) -> &SpatialGridModule {
        world.module::<SpatialGridModule>().unwrap()
    }

    #[test]
    fn proxies_are_tracked_once_activated() {
        let mut world = world();
        let object = spawn(&mut world, Vec3::new(20.0, 0.0, 0.0));
        assert!(!grid(&world).is_tracked(object));
        world.update();
        assert_eq!(grid(&world).cell_of(object), Some(CellCoord::new(1, 0)));
    }

    #[test]
    fn moved_objects_change_cells() {
        let mut world = world();
        let object = spawn(&mut world, Vec3::ZERO);
        world.update();
        world.set_local_transform(object, Transform::from_position(Vec3::new(40.0, 0.0, -1.0)));
        world.update();
        assert_eq!(grid(&world).cell_of(object), Some(CellCoord::new(2, -1)));
        assert_eq!(grid(&world).cell_changes(), 1);
    }

    #[test]
    fn children_follow_moved_parents() {
        let mut world = world();
        let parent = world.create_object(GameObjectDesc::new().dynamic()).unwrap();
        let child = world
            .create_object(GameObjectDesc::new().with_parent(parent))
            .unwrap();
        world
            .create_component::<SpatialProxies>(child, SpatialProxy::default())
            .unwrap();
        world.update();
        world.set_local_transform(parent, Transform::from_position(Vec3::new(0.0, 0.0, 33.0)));
        world.update();
        assert_eq!(grid(&world).cell_of(child), Some(CellCoord::new(0, 2)));
    }

    #[test]
    fn deactivation_and_destruction_untrack() {
        let mut world = world();
        let a = spawn(&mut world, Vec3::ZERO);
        let b = spawn(&mut world, Vec3::ZERO);
        world.update();
        assert_eq!(grid(&world).grid().len(), 2);

        world.set_object_active(a, false);
        assert!(!grid(&world).is_tracked(a));
        world.destroy_object(b, false);
        world.update();
        assert!(grid(&world).grid().is_empty());
    }

    #[test]
    fn objects_near_queries_by_cell_radius() {
        let mut world = world();
        let near = spawn(&mut world, Vec3::new(1.0, 0.0, 1.0));
        let far = spawn(&mut world, Vec3::new(100.0, 0.0, 100.0));
        world.update();
        let found = grid(&world).objects_near(Vec3::ZERO, 1);
        assert!(found.contains(&near));
        assert!(!found.contains(&far));
    }

    #[test]
    fn set_cell_size_replaces_tracked_objects() {
        let mut world = world();
        let object = spawn(&mut world, Vec3::new(20.0, 0.0, 0.0));
        world.update();
        let module = world.module_mut::<SpatialGridModule>().unwrap();
        module.set_cell_size(8.0);
        assert_eq!(module.cell_of(object), Some(CellCoord::new(2, 0)));
        assert_eq!(module.grid().cell_size(), 8.0);
    }

    #[derive(Default)]
    struct Watcher {
        changes: Vec<CellCoord>,
    }

    impl Component for Watcher {}

    impl UpdatableComponent for Watcher {
        fn update(&mut self, _ctx: &mut ComponentContext<'_, '_>) {}

        fn register_message_handlers(handlers: &mut MessageHandlers<Self>) {
            handlers.on::<CellChanged>(|w, change, _ctx| w.changes.push(change.to));
        }
    }

    #[test]
    fn owners_hear_about_cell_changes_next_frame() {
        let mut world = world();
        let object = spawn(&mut world, Vec3::ZERO);
        let watcher = world
            .create_component::<SimpleManager<Watcher>>(object, Watcher::default())
            .unwrap();
        world.update();
        world.set_local_transform(object, Transform::from_position(Vec3::new(-1.0, 0.0, 0.0)));
        world.update();
        assert!(world.component::<Watcher>(watcher).unwrap().changes.is_empty());
        world.update();
        assert_eq!(
            world.component::<Watcher>(watcher).unwrap().changes,
            vec![CellCoord::new(-1, 0)]
        );
    }
}
