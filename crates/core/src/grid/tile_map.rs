//! Tile world boundary
//!
//! The atmosphere never edits tiles. It reads them through [`TileSource`], which
//! any host world can implement. [`TileMap`] is a small in-memory implementation
//! used by the demo, the C API and tests.

use crate::core_types::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Integer tile coordinate on the world X/Z plane (y maps to world Z)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// [`Self::offset`], or `None` past the edge of the coordinate range
    #[inline]
    pub fn checked_offset(self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }
}

/// Integer chunk coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub y: i32,
}

impl ChunkKey {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing `coord` for the given chunk dimensions
    pub fn containing(coord: TileCoord, width: usize, height: usize) -> Self {
        Self {
            x: coord.x.div_euclid(width as i32),
            y: coord.y.div_euclid(height as i32),
        }
    }
}

/// What the world has at a tile coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum TileKind {
    /// No structure at all
    #[default]
    Void = 0,
    /// Enclosed floor that holds air
    Floor = 1,
    /// Impermeable wall
    Wall = 2,
    /// Open to space
    Space = 3,
}

impl TileKind {
    /// Convert from u8 for FFI compatibility
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TileKind::Void),
            1 => Some(TileKind::Floor),
            2 => Some(TileKind::Wall),
            3 => Some(TileKind::Space),
            _ => None,
        }
    }
}

/// Query surface the atmosphere needs from the tile world
pub trait TileSource {
    /// Tiles per chunk along x and y
    fn chunk_dimensions(&self) -> (usize, usize);

    /// World size of one tile
    fn tile_size(&self) -> f32 {
        1.0
    }

    /// World position of tile (0, 0)
    fn origin(&self) -> Vec3 {
        Vec3::zeros()
    }

    /// Every chunk that exists in the world
    fn chunk_keys(&self) -> Vec<ChunkKey>;

    /// Kind of the tile at `coord`
    fn tile_kind(&self, coord: TileCoord) -> TileKind;
}

/// Sparse in-memory tile world
#[derive(Debug, Clone)]
pub struct TileMap {
    chunk_width: usize,
    chunk_height: usize,
    tile_size: f32,
    origin: Vec3,
    tiles: FxHashMap<TileCoord, TileKind>,
}

impl TileMap {
    /// Create an empty map. Chunk dimensions are clamped to at least 1.
    pub fn new(chunk_width: usize, chunk_height: usize) -> Self {
        Self {
            chunk_width: chunk_width.max(1),
            chunk_height: chunk_height.max(1),
            tile_size: 1.0,
            origin: Vec3::zeros(),
            tiles: FxHashMap::default(),
        }
    }

    pub fn with_tile_size(mut self, tile_size: f32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    pub fn set(&mut self, coord: TileCoord, kind: TileKind) {
        self.tiles.insert(coord, kind);
    }

    pub fn get(&self, coord: TileCoord) -> TileKind {
        self.tiles.get(&coord).copied().unwrap_or_default()
    }

    /// Fill the inclusive rectangle `min..=max` with one kind
    pub fn fill_rect(&mut self, min: TileCoord, max: TileCoord, kind: TileKind) {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                self.set(TileCoord::new(x, y), kind);
            }
        }
    }

    /// Walls on the border of `min..=max`, floor inside
    pub fn room(&mut self, min: TileCoord, max: TileCoord) {
        self.fill_rect(min, max, TileKind::Wall);
        if max.x - min.x >= 2 && max.y - min.y >= 2 {
            self.fill_rect(min.offset(1, 1), max.offset(-1, -1), TileKind::Floor);
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl TileSource for TileMap {
    fn chunk_dimensions(&self) -> (usize, usize) {
        (self.chunk_width, self.chunk_height)
    }

    fn tile_size(&self) -> f32 {
        self.tile_size
    }

    fn origin(&self) -> Vec3 {
        self.origin
    }

    fn chunk_keys(&self) -> Vec<ChunkKey> {
        let keys: FxHashSet<ChunkKey> = self
            .tiles
            .keys()
            .map(|coord| ChunkKey::containing(*coord, self.chunk_width, self.chunk_height))
            .collect();
        let mut keys: Vec<ChunkKey> = keys.into_iter().collect();
        keys.sort_unstable();
        keys
    }

    fn tile_kind(&self, coord: TileCoord) -> TileKind {
        self.get(coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_key_handles_negative_coords() {
        assert_eq!(
            ChunkKey::containing(TileCoord::new(-1, -1), 16, 16),
            ChunkKey::new(-1, -1)
        );
        assert_eq!(
            ChunkKey::containing(TileCoord::new(15, 16), 16, 16),
            ChunkKey::new(0, 1)
        );
    }

    #[test]
    fn test_room_has_wall_border_and_floor_inside() {
        let mut map = TileMap::new(8, 8);
        map.room(TileCoord::new(0, 0), TileCoord::new(4, 3));
        assert_eq!(map.get(TileCoord::new(0, 0)), TileKind::Wall);
        assert_eq!(map.get(TileCoord::new(4, 2)), TileKind::Wall);
        assert_eq!(map.get(TileCoord::new(2, 1)), TileKind::Floor);
        assert_eq!(map.get(TileCoord::new(3, 2)), TileKind::Floor);
        assert_eq!(map.get(TileCoord::new(9, 9)), TileKind::Void);
    }

    #[test]
    fn test_chunk_keys_are_sorted_and_unique() {
        let mut map = TileMap::new(4, 4);
        map.fill_rect(TileCoord::new(-2, 0), TileCoord::new(5, 1), TileKind::Floor);
        assert_eq!(
            map.chunk_keys(),
            vec![ChunkKey::new(-1, 0), ChunkKey::new(0, 0), ChunkKey::new(1, 0)]
        );
    }
}
