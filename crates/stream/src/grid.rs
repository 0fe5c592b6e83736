use std::collections::{HashMap, HashSet};

use glam::Vec3;
use worldspace_kernel::GameObjectHandle;

/// A 2D cell coordinate in the world grid (ignoring Y axis for partitioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Fixed-size grid partitioning of tracked objects.
///
/// Objects are assigned to cells based on their XZ position divided by
/// `cell_size`. Each object lives in exactly one cell; moving it updates the
/// placement in place.
#[derive(Debug)]
pub struct GridPartition {
    cell_size: f32,
    cells: HashMap<CellCoord, HashSet<GameObjectHandle>>,
    placements: HashMap<GameObjectHandle, CellCoord>,
}

impl GridPartition {
    /// Create a new grid partition. Non-positive or non-finite cell sizes
    /// fall back to 1.
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            tracing::warn!(cell_size, "invalid cell size, using 1.0");
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            placements: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert a world position to a cell coordinate.
    pub fn position_to_cell(&self, pos: Vec3) -> CellCoord {
        CellCoord {
            x: (pos.x / self.cell_size).floor() as i32,
            z: (pos.z / self.cell_size).floor() as i32,
        }
    }

    /// Place `object` at `position`, moving it if it is already tracked.
    /// Returns `true` if its cell changed.
    pub fn place(&mut self, object: GameObjectHandle, position: Vec3) -> bool {
        let coord = self.position_to_cell(position);
        match self.placements.insert(object, coord) {
            Some(old) if old == coord => false,
            Some(old) => {
                self.remove_from_cell(old, object);
                self.cells.entry(coord).or_default().insert(object);
                true
            }
            None => {
                self.cells.entry(coord).or_default().insert(object);
                true
            }
        }
    }

    /// Stop tracking `object`. Returns `false` if it was not tracked.
    pub fn remove(&mut self, object: GameObjectHandle) -> bool {
        match self.placements.remove(&object) {
            Some(coord) => {
                self.remove_from_cell(coord, object);
                true
            }
            None => false,
        }
    }

    fn remove_from_cell(&mut self, coord: CellCoord, object: GameObjectHandle) {
        if let Some(cell) = self.cells.get_mut(&coord) {
            cell.remove(&object);
            if cell.is_empty() {
                self.cells.remove(&coord);
            }
        }
    }

    pub fn contains(&self, object: GameObjectHandle) -> bool {
        self.placements.contains_key(&object)
    }

    /// Cell the object is currently placed in.
    pub fn cell_of(&self, object: GameObjectHandle) -> Option<CellCoord> {
        self.placements.get(&object).copied()
    }

    /// Get all objects in a specific cell.
    pub fn objects_in_cell(&self, coord: CellCoord) -> HashSet<GameObjectHandle> {
        self.cells.get(&coord).cloned().unwrap_or_default()
    }

    /// Get all objects within a radius (in cells) of a center cell.
    pub fn objects_in_radius(&self, center: CellCoord, radius: i32) -> HashSet<GameObjectHandle> {
        let mut result = HashSet::new();
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let coord = CellCoord::new(center.x + dx, center.z + dz);
                if let Some(objects) = self.cells.get(&coord) {
                    result.extend(objects);
                }
            }
        }
        result
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Tracked objects and their cells.
    pub fn placements(&self) -> impl Iterator<Item = (GameObjectHandle, CellCoord)> + '_ {
        self.placements.iter().map(|(h, c)| (*h, *c))
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.placements.clear();
    }
}
