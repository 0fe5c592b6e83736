//! Game objects and the store that owns them.
//!
//! # Invariants
//! - The hierarchy is a forest: every object is either a root or listed in
//!   exactly one parent's child list, and its `parent` link agrees.
//! - An object's effective active state is its own flag AND its parent's
//!   effective state.
//! - Global transforms are brought up to date by [`ObjectStore::propagate_transforms`];
//!   dynamic objects are recomputed every time, static objects only when
//!   they, or an ancestor, changed.

use std::collections::HashMap;

use worldspace_common::Transform;

use crate::error::WorldError;
use crate::handle::{ComponentHandle, GameObjectHandle, HandleTable};

/// Description used to create a game object.
#[derive(Debug, Clone)]
pub struct GameObjectDesc {
    pub name: Option<String>,
    pub parent: Option<GameObjectHandle>,
    /// Local transform (relative to the parent).
    pub transform: Transform,
    pub active: bool,
    pub dynamic: bool,
    pub hidden: bool,
    pub global_key: Option<String>,
}

impl Default for GameObjectDesc {
    fn default() -> Self {
        Self {
            name: None,
            parent: None,
            transform: Transform::IDENTITY,
            active: true,
            dynamic: false,
            hidden: false,
            global_key: None,
        }
    }
}

impl GameObjectDesc {
    /// An active, static root object at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the object; names need not be unique.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach under `parent`.
    pub fn with_parent(mut self, parent: GameObjectHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Initial local transform.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Recompute the global transform every frame from the parent chain.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Create the object with its own active flag cleared.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Flag the object as hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Register the object under a world-unique key.
    pub fn with_global_key(mut self, key: impl Into<String>) -> Self {
        self.global_key = Some(key.into());
        self
    }
}

/// What to keep fixed when an object changes parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformPreservation {
    /// The object stays where it is in the world; its local transform is
    /// rewritten relative to the new parent.
    #[default]
    KeepGlobal,
    /// The local transform is kept; the object moves with its new parent.
    KeepLocal,
}

/// A node of the scene hierarchy.
#[derive(Debug, Clone)]
pub struct GameObject {
    handle: GameObjectHandle,
    name: Option<String>,
    parent: Option<GameObjectHandle>,
    children: Vec<GameObjectHandle>,
    components: Vec<ComponentHandle>,
    local: Transform,
    global: Transform,
    active: bool,
    active_in_hierarchy: bool,
    dynamic: bool,
    hidden: bool,
    global_key: Option<String>,
    pending_delete: bool,
    transform_dirty: bool,
}

impl GameObject {
    /// The handle naming this object.
    pub fn handle(&self) -> GameObjectHandle {
        self.handle
    }

    /// Optional display name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The parent, `None` for roots.
    pub fn parent(&self) -> Option<GameObjectHandle> {
        self.parent
    }

    /// Children in attach order.
    pub fn children(&self) -> &[GameObjectHandle] {
        &self.children
    }

    /// Attached components, in attach order.
    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }

    /// Transform relative to the parent.
    pub fn local_transform(&self) -> Transform {
        self.local
    }

    /// World-space transform as of the last propagation or explicit set.
    pub fn global_transform(&self) -> Transform {
        self.global
    }

    /// The object's own active flag.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Own flag combined with every ancestor's.
    pub fn is_active_in_hierarchy(&self) -> bool {
        self.active_in_hierarchy
    }

    /// Whether the global transform is recomputed every frame.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Whether the object is flagged hidden.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// The world-unique key, if one is set.
    pub fn global_key(&self) -> Option<&str> {
        self.global_key.as_deref()
    }

    /// Queued for destruction at this frame's delete sweep.
    pub fn is_pending_delete(&self) -> bool {
        self.pending_delete
    }
}

/// Owns every game object of one world.
#[derive(Debug)]
pub struct ObjectStore {
    table: HandleTable<GameObject>,
    world: u8,
    roots: Vec<GameObjectHandle>,
    global_keys: HashMap<String, GameObjectHandle>,
    moved: Vec<GameObjectHandle>,
    report_static_changes: bool,
}

impl ObjectStore {
    pub(crate) fn new(world: u8, report_static_changes: bool) -> Self {
        Self {
            table: HandleTable::new(),
            world,
            roots: Vec::new(),
            global_keys: HashMap::new(),
            moved: Vec::new(),
            report_static_changes,
        }
    }

    /// Number of live objects, pending deletes included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Create an object. Its global transform is computed from the parent
    /// right away.
    pub fn create(&mut self, desc: GameObjectDesc) -> Result<GameObjectHandle, WorldError> {
        let (parent_global, parent_active) = match desc.parent {
            Some(parent) => {
                let p = self.get(parent).ok_or(WorldError::InvalidObject(parent))?;
                (p.global, p.active_in_hierarchy)
            }
            None => (Transform::IDENTITY, true),
        };
        let world = self.world;
        let slot = self.table.insert_with(|slot| GameObject {
            handle: GameObjectHandle::new(slot, world),
            name: desc.name,
            parent: desc.parent,
            children: Vec::new(),
            components: Vec::new(),
            local: desc.transform,
            global: parent_global.mul_transform(&desc.transform),
            active: desc.active,
            active_in_hierarchy: desc.active && parent_active,
            dynamic: desc.dynamic,
            hidden: desc.hidden,
            global_key: None,
            pending_delete: false,
            transform_dirty: false,
        });
        let handle = GameObjectHandle::new(slot, world);
        match desc.parent {
            Some(parent) => {
                if let Some(p) = self.table.get_mut(parent.slot()) {
                    p.children.push(handle);
                }
            }
            None => self.roots.push(handle),
        }
        if let Some(key) = desc.global_key {
            self.set_global_key(handle, key);
        }
        tracing::trace!(object = %handle, "object created");
        Ok(handle)
    }

    /// Resolve a handle. Stale handles resolve to `None`.
    pub fn get(&self, handle: GameObjectHandle) -> Option<&GameObject> {
        if handle.world_index() != self.world {
            return None;
        }
        self.table.get(handle.slot())
    }

    fn get_mut(&mut self, handle: GameObjectHandle) -> Option<&mut GameObject> {
        if handle.world_index() != self.world {
            return None;
        }
        self.table.get_mut(handle.slot())
    }

    /// Whether `handle` still names a live object.
    pub fn is_valid(&self, handle: GameObjectHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Every live object, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.table.values()
    }

    /// Objects without a parent, in creation order.
    pub fn roots(&self) -> &[GameObjectHandle] {
        &self.roots
    }

    /// Parent of `handle`, `None` for roots and stale handles.
    pub fn parent(&self, handle: GameObjectHandle) -> Option<GameObjectHandle> {
        self.get(handle).and_then(|o| o.parent)
    }

    /// Children of `handle`; empty for stale handles.
    pub fn children(&self, handle: GameObjectHandle) -> &[GameObjectHandle] {
        self.get(handle).map_or(&[], |o| o.children.as_slice())
    }

    /// Components attached to `handle`, in attach order.
    pub fn components(&self, handle: GameObjectHandle) -> &[ComponentHandle] {
        self.get(handle).map_or(&[], |o| o.components.as_slice())
    }

    /// Local transform of `handle`.
    pub fn local_transform(&self, handle: GameObjectHandle) -> Option<Transform> {
        self.get(handle).map(|o| o.local)
    }

    /// Global transform of `handle`.
    pub fn global_transform(&self, handle: GameObjectHandle) -> Option<Transform> {
        self.get(handle).map(|o| o.global)
    }

    /// Set the local transform. The global transform of the object and its
    /// descendants is refreshed at the next transform propagation.
    pub fn set_local_transform(&mut self, handle: GameObjectHandle, transform: Transform) -> bool {
        let report = self.report_static_changes;
        let Some(object) = self.get_mut(handle) else {
            return false;
        };
        if report && !object.dynamic {
            tracing::error!(object = %handle, "transform of a static object modified");
        }
        object.local = transform;
        object.transform_dirty = true;
        true
    }

    /// Place the object at `transform` in world space, deriving its local
    /// transform from the parent's current global transform.
    pub fn set_global_transform(&mut self, handle: GameObjectHandle, transform: Transform) -> bool {
        let parent_global = match self.parent(handle) {
            Some(parent) => self.global_transform(parent),
            None => None,
        };
        let report = self.report_static_changes;
        let Some(object) = self.get_mut(handle) else {
            return false;
        };
        if report && !object.dynamic {
            tracing::error!(object = %handle, "transform of a static object modified");
        }
        object.local = match parent_global {
            Some(parent) => parent.inverse().mul_transform(&transform),
            None => transform,
        };
        object.global = transform;
        object.transform_dirty = true;
        true
    }

    /// Switch between per-frame propagation and a cached global transform.
    pub fn set_dynamic(&mut self, handle: GameObjectHandle, dynamic: bool) -> bool {
        let Some(object) = self.get_mut(handle) else {
            return false;
        };
        if object.dynamic != dynamic {
            object.dynamic = dynamic;
            object.transform_dirty = true;
        }
        true
    }

    /// Set the hidden flag.
    pub fn set_hidden(&mut self, handle: GameObjectHandle, hidden: bool) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.hidden = hidden;
                true
            }
            None => false,
        }
    }

    /// Rename the object.
    pub fn set_name(&mut self, handle: GameObjectHandle, name: impl Into<String>) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.name = Some(name.into());
                true
            }
            None => false,
        }
    }

    /// Register `key` as a world-unique name for the object. A key already
    /// used by another object moves to this one.
    pub fn set_global_key(&mut self, handle: GameObjectHandle, key: impl Into<String>) -> bool {
        let key = key.into();
        if !self.is_valid(handle) {
            return false;
        }
        self.clear_global_key(handle);
        if let Some(previous) = self.global_keys.insert(key.clone(), handle) {
            if let Some(object) = self.get_mut(previous) {
                object.global_key = None;
            }
        }
        if let Some(object) = self.get_mut(handle) {
            object.global_key = Some(key);
        }
        true
    }

    /// Release the object's global key.
    pub fn clear_global_key(&mut self, handle: GameObjectHandle) -> bool {
        let Some(object) = self.get_mut(handle) else {
            return false;
        };
        if let Some(key) = object.global_key.take() {
            self.global_keys.remove(&key);
        }
        true
    }

    /// The object registered under `key`.
    pub fn object_by_global_key(&self, key: &str) -> Option<GameObjectHandle> {
        self.global_keys.get(key).copied()
    }

    /// First child named `name`; with `recursive`, searches the whole
    /// subtree depth-first.
    pub fn find_child_by_name(
        &self,
        handle: GameObjectHandle,
        name: &str,
        recursive: bool,
    ) -> Option<GameObjectHandle> {
        for &child in self.children(handle) {
            if self.get(child).and_then(|c| c.name()) == Some(name) {
                return Some(child);
            }
            if recursive {
                if let Some(found) = self.find_child_by_name(child, name, true) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Every descendant of `handle` in depth-first pre-order, excluding
    /// `handle` itself.
    pub fn descendants(&self, handle: GameObjectHandle) -> Vec<GameObjectHandle> {
        let mut result = Vec::new();
        let mut stack: Vec<GameObjectHandle> = self.children(handle).iter().rev().copied().collect();
        while let Some(h) = stack.pop() {
            result.push(h);
            stack.extend(self.children(h).iter().rev());
        }
        result
    }

    /// `handle` and its descendants, children before parents.
    pub(crate) fn post_order(&self, handle: GameObjectHandle) -> Vec<GameObjectHandle> {
        let mut result = vec![handle];
        result.extend(self.descendants(handle));
        result.reverse();
        result
    }

    /// Objects whose global transform changed during the last propagation.
    pub fn moved_objects(&self) -> &[GameObjectHandle] {
        &self.moved
    }

    /// Move `child` under `parent` (or to the root level). Returns the
    /// objects whose effective active state changed.
    pub(crate) fn set_parent(
        &mut self,
        child: GameObjectHandle,
        parent: Option<GameObjectHandle>,
        preservation: TransformPreservation,
    ) -> Result<Vec<GameObjectHandle>, WorldError> {
        let current = self.get(child).ok_or(WorldError::InvalidObject(child))?;
        if current.parent == parent {
            return Ok(Vec::new());
        }
        let child_global = current.global;
        let parent_global = match parent {
            Some(p) => {
                let mut ancestor = Some(p);
                while let Some(a) = ancestor {
                    if a == child {
                        return Err(WorldError::HierarchyCycle { child, parent: p });
                    }
                    ancestor = self.parent(a);
                }
                Some(self.get(p).ok_or(WorldError::InvalidObject(p))?.global)
            }
            None => None,
        };

        self.detach_from_parent(child);
        match parent {
            Some(p) => {
                if let Some(object) = self.get_mut(p) {
                    object.children.push(child);
                }
            }
            None => self.roots.push(child),
        }
        if let Some(object) = self.get_mut(child) {
            object.parent = parent;
            if preservation == TransformPreservation::KeepGlobal {
                object.local = match parent_global {
                    Some(pg) => pg.inverse().mul_transform(&child_global),
                    None => child_global,
                };
            }
            object.transform_dirty = true;
        }
        Ok(self.refresh_active(child))
    }

    /// Set the object's own active flag. Returns the objects whose effective
    /// active state changed.
    pub(crate) fn set_active(&mut self, handle: GameObjectHandle, active: bool) -> Vec<GameObjectHandle> {
        match self.get_mut(handle) {
            Some(object) if object.active != active => object.active = active,
            _ => return Vec::new(),
        }
        self.refresh_active(handle)
    }

    fn refresh_active(&mut self, root: GameObjectHandle) -> Vec<GameObjectHandle> {
        let mut changed = Vec::new();
        let mut stack = vec![root];
        while let Some(h) = stack.pop() {
            let parent_active = match self.parent(h) {
                Some(p) => self.get(p).is_some_and(|p| p.active_in_hierarchy),
                None => true,
            };
            let Some(object) = self.get_mut(h) else {
                continue;
            };
            let effective = object.active && parent_active;
            if effective != object.active_in_hierarchy {
                object.active_in_hierarchy = effective;
                changed.push(h);
            }
            stack.extend(object.children.iter().copied());
        }
        changed
    }

    pub(crate) fn mark_pending_delete(&mut self, handle: GameObjectHandle) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.pending_delete = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn attach_component(&mut self, handle: GameObjectHandle, component: ComponentHandle) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.components.push(component);
                true
            }
            None => false,
        }
    }

    pub(crate) fn detach_component(&mut self, handle: GameObjectHandle, component: ComponentHandle) {
        if let Some(object) = self.get_mut(handle) {
            object.components.retain(|c| *c != component);
        }
    }

    fn detach_from_parent(&mut self, handle: GameObjectHandle) {
        match self.parent(handle) {
            Some(parent) => {
                if let Some(p) = self.get_mut(parent) {
                    p.children.retain(|c| *c != handle);
                }
            }
            None => self.roots.retain(|r| *r != handle),
        }
    }

    /// Free the object's slot. Remaining children become roots.
    pub(crate) fn remove(&mut self, handle: GameObjectHandle) -> Option<GameObject> {
        if !self.is_valid(handle) {
            return None;
        }
        self.detach_from_parent(handle);
        let object = self.table.remove(handle.slot())?;
        if let Some(key) = &object.global_key {
            self.global_keys.remove(key);
        }
        for &child in &object.children {
            if let Some(c) = self.table.get_mut(child.slot()) {
                c.parent = None;
                c.transform_dirty = true;
                self.roots.push(child);
            }
        }
        Some(object)
    }

    /// Recompute global transforms top-down. Returns how many objects moved.
    pub(crate) fn propagate_transforms(&mut self) -> usize {
        self.moved.clear();
        let mut stack: Vec<(GameObjectHandle, Option<Transform>, bool)> =
            self.roots.iter().rev().map(|r| (*r, None, false)).collect();
        while let Some((handle, parent_global, parent_moved)) = stack.pop() {
            let Some(object) = self.table.get_mut(handle.slot()) else {
                continue;
            };
            let mut moved = false;
            if object.dynamic || object.transform_dirty || parent_moved {
                let global = match parent_global {
                    Some(parent) => parent.mul_transform(&object.local),
                    None => object.local,
                };
                moved = object.transform_dirty || global != object.global;
                object.global = global;
                object.transform_dirty = false;
            }
            if moved {
                self.moved.push(handle);
            }
            let global = object.global;
            stack.extend(
                object
                    .children
                    .iter()
                    .rev()
                    .map(|child| (*child, Some(global), moved)),
            );
        }
        self.moved.len()
    }

    pub(crate) fn clear(&mut self) {
        self.table.clear();
        self.roots.clear();
        self.global_keys.clear();
        self.moved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn store() -> ObjectStore {
        ObjectStore::new(0, false)
    }

    fn at(x: f32) -> Transform {
        Transform::from_position(Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn handles_survive_unrelated_churn() {
        let mut objects = store();
        let keep = objects.create(GameObjectDesc::new().named("keep")).unwrap();
        for i in 0..100 {
            let h = objects.create(GameObjectDesc::new()).unwrap();
            if i % 3 != 0 {
                objects.remove(h);
            }
        }
        assert_eq!(objects.get(keep).unwrap().name(), Some("keep"));
    }

    #[test]
    fn removed_handle_stays_absent_after_slot_reuse() {
        let mut objects = store();
        let old = objects.create(GameObjectDesc::new()).unwrap();
        objects.remove(old);
        let new = objects.create(GameObjectDesc::new()).unwrap();
        assert_eq!(old.slot().index(), new.slot().index());
        assert!(objects.get(old).is_none());
        assert!(objects.is_valid(new));
    }

    #[test]
    fn handle_from_other_world_does_not_resolve() {
        let mut a = ObjectStore::new(0, false);
        let b = ObjectStore::new(1, false);
        let h = a.create(GameObjectDesc::new()).unwrap();
        assert!(a.is_valid(h));
        assert!(!b.is_valid(h));
    }

    #[test]
    fn child_global_follows_parent() {
        let mut objects = store();
        let parent = objects
            .create(GameObjectDesc::new().with_transform(at(10.0)).dynamic())
            .unwrap();
        let child = objects
            .create(
                GameObjectDesc::new()
                    .with_parent(parent)
                    .with_transform(at(1.0))
                    .dynamic(),
            )
            .unwrap();
        assert_eq!(objects.global_transform(child).unwrap().position.x, 11.0);

        objects.set_local_transform(parent, at(20.0));
        objects.propagate_transforms();
        assert_eq!(objects.global_transform(child).unwrap().position.x, 21.0);
        assert_eq!(objects.moved_objects(), &[parent, child]);
    }

    #[test]
    fn static_objects_only_recompute_when_changed() {
        let mut objects = store();
        let a = objects.create(GameObjectDesc::new().with_transform(at(1.0))).unwrap();
        assert_eq!(objects.propagate_transforms(), 0);
        objects.set_local_transform(a, at(2.0));
        assert_eq!(objects.global_transform(a).unwrap().position.x, 1.0);
        assert_eq!(objects.propagate_transforms(), 1);
        assert_eq!(objects.global_transform(a).unwrap().position.x, 2.0);
        assert_eq!(objects.propagate_transforms(), 0);
    }

    #[test]
    fn reparent_keeps_global_transform() {
        let mut objects = store();
        let parent = objects.create(GameObjectDesc::new().with_transform(at(5.0))).unwrap();
        let child = objects.create(GameObjectDesc::new().with_transform(at(8.0))).unwrap();
        objects
            .set_parent(child, Some(parent), TransformPreservation::KeepGlobal)
            .unwrap();
        objects.propagate_transforms();
        assert_eq!(objects.local_transform(child).unwrap().position.x, 3.0);
        assert_eq!(objects.global_transform(child).unwrap().position.x, 8.0);
        assert_eq!(objects.children(parent), &[child]);
        assert!(!objects.roots().contains(&child));
    }

    #[test]
    fn reparent_keeping_local_moves_with_parent() {
        let mut objects = store();
        let parent = objects.create(GameObjectDesc::new().with_transform(at(5.0))).unwrap();
        let child = objects.create(GameObjectDesc::new().with_transform(at(8.0))).unwrap();
        objects
            .set_parent(child, Some(parent), TransformPreservation::KeepLocal)
            .unwrap();
        objects.propagate_transforms();
        assert_eq!(objects.global_transform(child).unwrap().position.x, 13.0);
        assert!(objects.moved_objects().contains(&child));
    }

    #[test]
    fn reparent_under_descendant_is_rejected() {
        let mut objects = store();
        let a = objects.create(GameObjectDesc::new()).unwrap();
        let b = objects.create(GameObjectDesc::new().with_parent(a)).unwrap();
        let c = objects.create(GameObjectDesc::new().with_parent(b)).unwrap();
        let err = objects
            .set_parent(a, Some(c), TransformPreservation::KeepGlobal)
            .unwrap_err();
        assert!(matches!(err, WorldError::HierarchyCycle { .. }));
        assert!(matches!(
            objects.set_parent(a, Some(a), TransformPreservation::KeepGlobal),
            Err(WorldError::HierarchyCycle { .. })
        ));
        assert_eq!(objects.parent(b), Some(a));
        assert_eq!(objects.roots(), &[a]);
    }

    #[test]
    fn inactive_parent_deactivates_subtree() {
        let mut objects = store();
        let a = objects.create(GameObjectDesc::new()).unwrap();
        let b = objects.create(GameObjectDesc::new().with_parent(a)).unwrap();
        let c = objects.create(GameObjectDesc::new().with_parent(b).inactive()).unwrap();
        let changed = objects.set_active(a, false);
        assert_eq!(changed, vec![a, b]);
        assert!(!objects.get(b).unwrap().is_active_in_hierarchy());
        assert!(objects.get(b).unwrap().is_active());
        let changed = objects.set_active(a, true);
        assert_eq!(changed, vec![a, b]);
        assert!(!objects.get(c).unwrap().is_active_in_hierarchy());
    }

    #[test]
    fn global_keys_are_unique_and_released() {
        let mut objects = store();
        let a = objects.create(GameObjectDesc::new().with_global_key("player")).unwrap();
        assert_eq!(objects.object_by_global_key("player"), Some(a));
        let b = objects.create(GameObjectDesc::new()).unwrap();
        objects.set_global_key(b, "player");
        assert_eq!(objects.object_by_global_key("player"), Some(b));
        assert_eq!(objects.get(a).unwrap().global_key(), None);
        objects.remove(b);
        assert_eq!(objects.object_by_global_key("player"), None);
    }

    #[test]
    fn find_child_by_name_searches_recursively() {
        let mut objects = store();
        let root = objects.create(GameObjectDesc::new()).unwrap();
        let arm = objects.create(GameObjectDesc::new().named("arm").with_parent(root)).unwrap();
        let hand = objects.create(GameObjectDesc::new().named("hand").with_parent(arm)).unwrap();
        assert_eq!(objects.find_child_by_name(root, "arm", false), Some(arm));
        assert_eq!(objects.find_child_by_name(root, "hand", false), None);
        assert_eq!(objects.find_child_by_name(root, "hand", true), Some(hand));
    }

    #[test]
    fn post_order_lists_children_first() {
        let mut objects = store();
        let a = objects.create(GameObjectDesc::new()).unwrap();
        let b = objects.create(GameObjectDesc::new().with_parent(a)).unwrap();
        let c = objects.create(GameObjectDesc::new().with_parent(b)).unwrap();
        let d = objects.create(GameObjectDesc::new().with_parent(a)).unwrap();
        assert_eq!(objects.descendants(a), vec![b, c, d]);
        assert_eq!(objects.post_order(a), vec![d, c, b, a]);
    }

    #[test]
    fn stale_parent_is_rejected() {
        let mut objects = store();
        let gone = objects.create(GameObjectDesc::new()).unwrap();
        objects.remove(gone);
        assert!(matches!(
            objects.create(GameObjectDesc::new().with_parent(gone)),
            Err(WorldError::InvalidObject(h)) if h == gone
        ));
    }
}
