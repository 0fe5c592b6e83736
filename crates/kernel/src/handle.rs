//! Generation-checked handles and the slot table that backs them.
//!
//! A handle names a slot by index and remembers the slot's generation at the
//! time it was issued. Freeing a slot advances its generation, so every handle
//! issued before the free stops resolving even after the slot is reused.
//!
//! Values live in a dense array; the slot only stores where its value
//! currently sits. Removing a value compacts the dense array, which moves
//! other values but never changes what their handles resolve to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of worlds that can coexist in one process.
pub const MAX_WORLDS: usize = 64;

const FREE: u32 = u32::MAX;

/// Index + generation pair naming one slot of a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId {
    index: u32,
    generation: u16,
}

impl SlotId {
    /// Never issued by any table; generation zero is reserved.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: 0,
    };

    /// A slot id from its raw parts.
    pub const fn new(index: u32, generation: u16) -> Self {
        Self { index, generation }
    }

    /// Position of the slot in the table.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation the slot had when this id was issued.
    pub const fn generation(self) -> u16 {
        self.generation
    }

    /// Whether this is the reserved never-issued id.
    pub const fn is_invalid(self) -> bool {
        self.generation == 0
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Stable reference to a game object.
///
/// Carries the index of the world that issued it so the owning world can be
/// found from the handle alone (see [`crate::WorldRegistry`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GameObjectHandle {
    slot: SlotId,
    world: u8,
}

impl GameObjectHandle {
    pub const INVALID: Self = Self {
        slot: SlotId::INVALID,
        world: 0,
    };

    pub(crate) const fn new(slot: SlotId, world: u8) -> Self {
        Self { slot, world }
    }

    /// The slot this handle names.
    pub const fn slot(self) -> SlotId {
        self.slot
    }

    /// Index of the world that issued the handle.
    pub const fn world_index(self) -> u8 {
        self.world
    }

    /// Whether this is [`GameObjectHandle::INVALID`] or another never-issued
    /// handle.
    pub const fn is_invalid(self) -> bool {
        self.slot.is_invalid()
    }

    /// Packs the handle into 64 bits: `world:8 | generation:16 | index:32`.
    pub const fn to_bits(self) -> u64 {
        ((self.world as u64) << 48) | ((self.slot.generation as u64) << 32) | self.slot.index as u64
    }

    /// Inverse of [`GameObjectHandle::to_bits`].
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            slot: SlotId::new(bits as u32, (bits >> 32) as u16),
            world: (bits >> 48) as u8,
        }
    }
}

impl fmt::Display for GameObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "obj#{}:{}@{}",
            self.slot.index, self.slot.generation, self.world
        )
    }
}

/// Per-world identifier of a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ComponentTypeId(pub u16);

/// Stable reference to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ComponentHandle {
    slot: SlotId,
    type_id: ComponentTypeId,
    world: u8,
}

impl ComponentHandle {
    pub const INVALID: Self = Self {
        slot: SlotId::INVALID,
        type_id: ComponentTypeId(0),
        world: 0,
    };

    pub(crate) const fn new(slot: SlotId, type_id: ComponentTypeId, world: u8) -> Self {
        Self {
            slot,
            type_id,
            world,
        }
    }

    /// The slot within the manager's storage.
    pub const fn slot(self) -> SlotId {
        self.slot
    }

    /// Per-world id of the component's type.
    pub const fn type_id(self) -> ComponentTypeId {
        self.type_id
    }

    /// Index of the world that issued the handle.
    pub const fn world_index(self) -> u8 {
        self.world
    }

    /// Whether this is [`ComponentHandle::INVALID`] or another never-issued
    /// handle.
    pub const fn is_invalid(self) -> bool {
        self.slot.is_invalid()
    }
}

impl fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cmp#{}:{}:t{}@{}",
            self.slot.index, self.slot.generation, self.type_id.0, self.world
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    generation: u16,
    dense: u32,
}

fn next_generation(generation: u16) -> u16 {
    match generation.wrapping_add(1) {
        0 => 1,
        g => g,
    }
}

/// Slot table with dense value storage.
///
/// `insert`, `remove`, `get` are O(1). Iteration walks the dense array.
#[derive(Debug, Clone)]
pub struct HandleTable<T> {
    slots: Vec<SlotEntry>,
    values: Vec<T>,
    value_slots: Vec<u32>,
    free: Vec<u32>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            values: Vec::new(),
            value_slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Insert a value and return the slot that now names it.
    pub fn insert(&mut self, value: T) -> SlotId {
        self.insert_with(|_| value)
    }

    /// Insert a value built from its own slot id.
    pub fn insert_with(&mut self, make: impl FnOnce(SlotId) -> T) -> SlotId {
        let dense = self.values.len() as u32;
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(SlotEntry {
                    generation: 1,
                    dense: FREE,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[index as usize];
        entry.dense = dense;
        let id = SlotId::new(index, entry.generation);
        self.values.push(make(id));
        self.value_slots.push(index);
        id
    }

    /// Remove the value named by `id`, advancing the slot's generation.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let dense = self.dense_index(id)?;
        let value = self.values.swap_remove(dense);
        self.value_slots.swap_remove(dense);
        if let Some(&moved) = self.value_slots.get(dense) {
            self.slots[moved as usize].dense = dense as u32;
        }
        let entry = &mut self.slots[id.index as usize];
        entry.dense = FREE;
        entry.generation = next_generation(entry.generation);
        self.free.push(id.index);
        Some(value)
    }

    /// Whether `id` names a live value.
    pub fn contains(&self, id: SlotId) -> bool {
        self.dense_index(id).is_some()
    }

    /// The value behind `id`, `None` when stale.
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.dense_index(id).map(|d| &self.values[d])
    }

    /// Mutable access to the value behind `id`.
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.dense_index(id).map(move |d| &mut self.values[d])
    }

    /// Iterate `(slot, value)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.value_slots.iter().zip(self.values.iter()).map(|(&index, value)| {
            let generation = self.slots[index as usize].generation;
            (SlotId::new(index, generation), value)
        })
    }

    /// Live values in dense order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Live values in dense order, mutably.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.values.iter_mut()
    }

    /// Remove every value. Every issued id goes stale.
    pub fn clear(&mut self) {
        let ids: Vec<SlotId> = self.iter().map(|(id, _)| id).collect();
        for id in ids {
            self.remove(id);
        }
    }

    fn dense_index(&self, id: SlotId) -> Option<usize> {
        let entry = self.slots.get(id.index as usize)?;
        if id.generation == 0 || entry.generation != id.generation || entry.dense == FREE {
            return None;
        }
        Some(entry.dense as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_resolve() {
        let mut table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn removal_compacts_without_breaking_other_handles() {
        let mut table = HandleTable::new();
        let ids: Vec<SlotId> = (0..10).map(|i| table.insert(i)).collect();
        assert_eq!(table.remove(ids[0]), Some(0));
        assert_eq!(table.remove(ids[4]), Some(4));
        for (i, id) in ids.iter().enumerate() {
            if i == 0 || i == 4 {
                assert!(table.get(*id).is_none());
            } else {
                assert_eq!(table.get(*id), Some(&i));
            }
        }
        assert_eq!(table.values().count(), 8);
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut table = HandleTable::new();
        let old = table.insert(1);
        table.remove(old);
        let new = table.insert(2);
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(table.get(old).is_none());
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn invalid_slot_never_resolves() {
        let mut table = HandleTable::new();
        table.insert(1);
        assert!(table.get(SlotId::INVALID).is_none());
        assert!(table.get(SlotId::new(0, 0)).is_none());
    }

    #[test]
    fn generation_skips_zero_on_wrap() {
        assert_eq!(next_generation(u16::MAX), 1);
        assert_eq!(next_generation(1), 2);
    }

    #[test]
    fn double_remove_is_noop() {
        let mut table = HandleTable::new();
        let id = table.insert(5);
        assert_eq!(table.remove(id), Some(5));
        assert_eq!(table.remove(id), None);
        assert!(table.is_empty());
    }

    #[test]
    fn handle_bits_roundtrip() {
        let h = GameObjectHandle::new(SlotId::new(77, 3), 5);
        assert_eq!(GameObjectHandle::from_bits(h.to_bits()), h);
    }

    #[test]
    fn iter_reports_current_slot_ids() {
        let mut table = HandleTable::new();
        let a = table.insert('a');
        let b = table.insert('b');
        table.remove(a);
        let c = table.insert('c');
        let mut ids: Vec<SlotId> = table.iter().map(|(id, _)| id).collect();
        ids.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
