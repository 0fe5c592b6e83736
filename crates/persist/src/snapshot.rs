use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worldspace_common::Transform;
use worldspace_kernel::{
    Component, ComponentHandle, ComponentManager, FieldMap, GameObjectDesc, GameObjectHandle, World,
    WorldError,
};

use crate::error::SnapshotError;

/// One serialized component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Rust type name of the component, the key used to find its loader.
    pub type_name: String,
    /// Format version the fields were written with.
    pub version: u32,
    pub active: bool,
    pub fields: FieldMap,
}

/// One serialized game object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: Option<String>,
    /// Index of the parent record; always lower than this record's index.
    pub parent: Option<u32>,
    pub local: Transform,
    pub active: bool,
    pub dynamic: bool,
    pub hidden: bool,
    pub global_key: Option<String>,
    pub components: Vec<ComponentRecord>,
}

/// A world's objects and components at one frame.
///
/// Handles are not stored; hierarchy links are record indices, so a snapshot
/// can be restored into any world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub id: Uuid,
    pub world_name: String,
    pub frame: u64,
    pub elapsed: Duration,
    pub objects: Vec<ObjectRecord>,
}

/// What [`SceneSnapshot::restore`] created.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    /// New handles, in record order.
    pub objects: Vec<GameObjectHandle>,
    pub components: Vec<ComponentHandle>,
}

type LoadFn =
    Box<dyn Fn(&mut World, GameObjectHandle, &FieldMap, u32) -> Result<ComponentHandle, WorldError> + Send + Sync>;

struct Loader {
    type_name: &'static str,
    version: u32,
    load: LoadFn,
}

/// Component constructors keyed by component type name.
#[derive(Default)]
pub struct ComponentLoaders {
    loaders: HashMap<&'static str, Loader>,
}

impl ComponentLoaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load components of `M::Component` by deserializing into its default
    /// value.
    pub fn register<M>(&mut self) -> &mut Self
    where
        M: ComponentManager,
        M::Component: Default,
    {
        self.register_with::<M>(M::Component::default)
    }

    /// Load components of `M::Component` by deserializing into `make()`.
    pub fn register_with<M: ComponentManager>(&mut self, make: fn() -> M::Component) -> &mut Self {
        let load: LoadFn = Box::new(move |world, owner, fields, version| {
            world.create_component_from::<M>(owner, make(), fields, version)
        });
        let type_name = std::any::type_name::<M::Component>();
        self.loaders.insert(
            type_name,
            Loader {
                type_name,
                version: <M::Component as Component>::VERSION,
                load,
            },
        );
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.loaders.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl SceneSnapshot {
    /// Capture every live object of `world`, parents before children.
    /// Objects waiting for the delete sweep are left out with their subtrees.
    pub fn capture(world: &World) -> Result<Self, SnapshotError> {
        let objects = world.objects();
        let mut records = Vec::with_capacity(objects.len());
        let mut indices: HashMap<GameObjectHandle, u32> = HashMap::new();
        let mut stack: Vec<GameObjectHandle> = objects.roots().iter().rev().copied().collect();

        while let Some(handle) = stack.pop() {
            let Some(object) = objects.get(handle) else {
                continue;
            };
            if object.is_pending_delete() {
                continue;
            }
            let mut components = Vec::with_capacity(object.components().len());
            for component in object.components() {
                components.push(capture_component(world, *component)?);
            }
            indices.insert(handle, records.len() as u32);
            records.push(ObjectRecord {
                name: object.name().map(str::to_string),
                parent: object.parent().and_then(|p| indices.get(&p).copied()),
                local: object.local_transform(),
                active: object.is_active(),
                dynamic: object.is_dynamic(),
                hidden: object.is_hidden(),
                global_key: object.global_key().map(str::to_string),
                components,
            });
            stack.extend(object.children().iter().rev());
        }

        let snapshot = Self {
            id: Uuid::new_v4(),
            world_name: world.name().to_string(),
            frame: world.clock().frame(),
            elapsed: world.clock().elapsed(),
            objects: records,
        };
        tracing::debug!(
            id = %snapshot.id,
            objects = snapshot.objects.len(),
            components = snapshot.component_count(),
            "snapshot captured"
        );
        Ok(snapshot)
    }

    pub fn component_count(&self) -> usize {
        self.objects.iter().map(|o| o.components.len()).sum()
    }

    /// Recreate the snapshot's objects and components in `world`.
    ///
    /// Parent links, component types and versions are all checked before
    /// anything is created, so a rejected snapshot leaves the world as it
    /// was. Restored components join the default init batch.
    pub fn restore(&self, world: &mut World, loaders: &ComponentLoaders) -> Result<RestoreReport, SnapshotError> {
        self.validate(loaders)?;

        let mut report = RestoreReport::default();
        for record in &self.objects {
            let mut desc = GameObjectDesc {
                name: record.name.clone(),
                parent: record.parent.map(|p| report.objects[p as usize]),
                transform: record.local,
                active: record.active,
                dynamic: record.dynamic,
                hidden: record.hidden,
                global_key: None,
            };
            if let Some(key) = &record.global_key {
                if world.object_by_global_key(key).is_none() {
                    desc.global_key = Some(key.clone());
                } else {
                    tracing::warn!(key = %key, "global key already taken, restored object keeps none");
                }
            }
            let object = world.create_object(desc)?;
            report.objects.push(object);

            for component in &record.components {
                let Some(loader) = loaders.loaders.get(component.type_name.as_str()) else {
                    continue;
                };
                let handle = (loader.load)(world, object, &component.fields, component.version)?;
                if !component.active {
                    world.set_component_active(handle, false);
                }
                report.components.push(handle);
            }
        }
        tracing::debug!(
            id = %self.id,
            objects = report.objects.len(),
            components = report.components.len(),
            "snapshot restored"
        );
        Ok(report)
    }

    fn validate(&self, loaders: &ComponentLoaders) -> Result<(), SnapshotError> {
        for (index, record) in self.objects.iter().enumerate() {
            if let Some(parent) = record.parent {
                if parent as usize >= index {
                    return Err(SnapshotError::BadParent { index, parent });
                }
            }
            for component in &record.components {
                let loader = loaders
                    .loaders
                    .get(component.type_name.as_str())
                    .ok_or_else(|| SnapshotError::UnknownComponentType(component.type_name.clone()))?;
                if component.version > loader.version {
                    return Err(worldspace_kernel::SerializationError::UnsupportedVersion {
                        component: loader.type_name,
                        found: component.version,
                        current: loader.version,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

fn capture_component(world: &World, handle: ComponentHandle) -> Result<ComponentRecord, SnapshotError> {
    let type_name = world
        .component_type_name(handle)
        .ok_or(WorldError::InvalidComponent(handle))?;
    let active = world.component_flags(handle).is_some_and(|f| f.active);
    let mut fields = FieldMap::new();
    let version = world.serialize_component(handle, &mut fields)?;
    Ok(ComponentRecord {
        type_name: type_name.to_string(),
        version,
        active,
        fields,
    })
}
