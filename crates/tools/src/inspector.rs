use std::fmt;
use std::time::Duration;

use worldspace_kernel::{
    ComponentFlags, ComponentHandle, FrameCounters, GameObjectHandle, ManagerInfo, QueueType,
    UpdatePhase, World,
};

/// World inspector for developer tooling.
///
/// Provides read-only queries against the world state for debugging,
/// profiling, and development UI.
pub struct WorldInspector;

impl WorldInspector {
    /// Produce a summary of the world state.
    pub fn summary(world: &World) -> WorldSummary {
        WorldSummary {
            name: world.name().to_string(),
            index: world.index(),
            frame: world.clock().frame(),
            elapsed: world.clock().elapsed(),
            simulating: world.is_simulating(),
            object_count: world.objects().len(),
            managers: world.managers().len(),
            modules: world.module_names().len(),
            update_functions: UpdatePhase::ALL
                .iter()
                .map(|p| world.scheduler().function_names(*p).len())
                .sum(),
            pending_messages: QueueType::ALL
                .iter()
                .map(|q| world.pending_messages(*q))
                .sum(),
            last_frame: world.stats().last.clone(),
            average_frame_time: world.stats().frame_time.average(),
        }
    }

    /// Detailed state of one object; `None` for stale handles.
    pub fn inspect_object(world: &World, handle: GameObjectHandle) -> Option<ObjectInfo> {
        let object = world.object(handle)?;
        let global = object.global_transform();
        let components = object
            .components()
            .iter()
            .filter_map(|c| Self::inspect_component(world, *c))
            .collect();
        Some(ObjectInfo {
            handle,
            name: object.name().map(str::to_string),
            parent: object.parent(),
            children: object.children().len(),
            position: global.position.to_array(),
            rotation: global.rotation.to_array(),
            scale: global.scale.to_array(),
            active_in_hierarchy: object.is_active_in_hierarchy(),
            dynamic: object.is_dynamic(),
            pending_delete: object.is_pending_delete(),
            components,
        })
    }

    pub fn inspect_component(world: &World, handle: ComponentHandle) -> Option<ComponentInfo> {
        Some(ComponentInfo {
            handle,
            type_name: world.component_type_name(handle)?,
            flags: world.component_flags(handle)?,
        })
    }

    /// One line per object, depth-first from the roots, indented two spaces
    /// per level.
    pub fn hierarchy(world: &World) -> Vec<String> {
        let objects = world.objects();
        let mut lines = Vec::with_capacity(objects.len());
        let mut stack: Vec<(GameObjectHandle, usize)> =
            objects.roots().iter().rev().map(|r| (*r, 0)).collect();
        while let Some((handle, depth)) = stack.pop() {
            let Some(object) = objects.get(handle) else {
                continue;
            };
            let mut line = format!(
                "{:indent$}{} [{handle}]",
                "",
                object.name().unwrap_or("<unnamed>"),
                indent = depth * 2
            );
            if !object.components().is_empty() {
                line.push_str(&format!(" ({} components)", object.components().len()));
            }
            if !object.is_active_in_hierarchy() {
                line.push_str(" inactive");
            }
            if object.is_pending_delete() {
                line.push_str(" pending-delete");
            }
            lines.push(line);
            stack.extend(object.children().iter().rev().map(|c| (*c, depth + 1)));
        }
        lines
    }

    /// Registered managers ordered by component type id.
    pub fn managers(world: &World) -> Vec<ManagerInfo> {
        let mut managers = world.managers();
        managers.sort_by_key(|m| m.type_id);
        managers
    }

    /// Update function names per phase, in execution order.
    pub fn schedule(world: &World) -> Vec<(UpdatePhase, Vec<String>)> {
        UpdatePhase::ALL
            .iter()
            .map(|p| {
                let names = world
                    .scheduler()
                    .function_names(*p)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (*p, names)
            })
            .collect()
    }
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone)]
pub struct WorldSummary {
    pub name: String,
    pub index: u8,
    pub frame: u64,
    pub elapsed: Duration,
    pub simulating: bool,
    pub object_count: usize,
    pub managers: usize,
    pub modules: usize,
    pub update_functions: usize,
    pub pending_messages: usize,
    pub last_frame: FrameCounters,
    pub average_frame_time: Duration,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World '{}' #{}: frame={} elapsed={:.3}s simulating={} objects={} managers={} modules={} functions={} pending_messages={} avg_frame={:?}",
            self.name,
            self.index,
            self.frame,
            self.elapsed.as_secs_f64(),
            self.simulating,
            self.object_count,
            self.managers,
            self.modules,
            self.update_functions,
            self.pending_messages,
            self.average_frame_time,
        )
    }
}

#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub handle: ComponentHandle,
    pub type_name: &'static str,
    pub flags: ComponentFlags,
}

/// Detailed info about a single object. Transform values are global.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub handle: GameObjectHandle,
    pub name: Option<String>,
    pub parent: Option<GameObjectHandle>,
    pub children: usize,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub active_in_hierarchy: bool,
    pub dynamic: bool,
    pub pending_delete: bool,
    pub components: Vec<ComponentInfo>,
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Object {} '{}' pos=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2})",
            self.handle,
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.position[0],
            self.position[1],
            self.position[2],
            self.scale[0],
            self.scale[1],
            self.scale[2],
        )?;
        for component in &self.components {
            let state = if component.flags.activated {
                "active"
            } else if component.flags.queued_for_init {
                "queued"
            } else {
                "inactive"
            };
            write!(f, "\n  {} [{}] {state}", component.type_name, component.handle)?;
        }
        Ok(())
    }
}
