//! Chunked grid topology and neighbour adjacency
//!
//! Cells are laid out chunk by chunk (chunks in sorted key order, tiles row-major
//! inside a chunk) in one flat array. Neighbour resolution runs once after every
//! chunk exists, because a neighbour may live in another chunk. The resulting
//! adjacency table is read-only until the next full rebuild.

use super::cell::{CellIndex, Direction};
use super::tile_map::{ChunkKey, TileCoord, TileKind, TileSource};
use crate::core_types::Vec3;
use crate::error::{AtmosError, AtmosResult};
use rustc_hash::FxHashMap;
use tracing::{info, warn};

/// One fixed-size block of cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    key: ChunkKey,
    first_tile: TileCoord,
    first_cell: CellIndex,
    width: usize,
    height: usize,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// Range of flat cell indices owned by this chunk
    pub fn cells(&self) -> std::ops::Range<CellIndex> {
        self.first_cell..self.first_cell + self.width * self.height
    }

    /// Tile coordinate of the chunk's first tile
    pub fn first_tile(&self) -> TileCoord {
        self.first_tile
    }

    #[inline]
    fn local_index(&self, coord: TileCoord) -> CellIndex {
        let local_x = (coord.x - self.first_tile.x) as usize;
        let local_y = (coord.y - self.first_tile.y) as usize;
        self.first_cell + local_y * self.width + local_x
    }
}

/// First tile of a chunk, or `None` when any of its tiles falls outside `i32`
fn chunk_origin(key: ChunkKey, width: i32, height: i32) -> Option<TileCoord> {
    let first = TileCoord::new(key.x.checked_mul(width)?, key.y.checked_mul(height)?);
    first.checked_offset(width - 1, height - 1)?;
    Some(first)
}

/// Chunked grid with a precomputed adjacency table
#[derive(Debug, Clone)]
pub struct Topology {
    chunk_width: usize,
    chunk_height: usize,
    tile_size: f32,
    origin: Vec3,
    chunks: Vec<Chunk>,
    chunk_lookup: FxHashMap<ChunkKey, usize>,
    coords: Vec<TileCoord>,
    kinds: Vec<TileKind>,
    adjacency: Vec<[Option<CellIndex>; 4]>,
}

impl Topology {
    /// Build the grid from a tile source
    ///
    /// # Errors
    ///
    /// [`AtmosError::EmptyTopology`] when the source has no usable chunks, and
    /// [`AtmosError::InvalidConfig`] for chunk dimensions outside `1..=i32::MAX`
    /// or a non-positive tile size. Chunks whose tiles would lie outside the
    /// `i32` coordinate range are skipped.
    pub fn build(source: &dyn TileSource) -> AtmosResult<Self> {
        let (chunk_width, chunk_height) = source.chunk_dimensions();
        let (Ok(width), Ok(height)) = (i32::try_from(chunk_width), i32::try_from(chunk_height))
        else {
            return Err(AtmosError::config(
                "chunk_dimensions",
                format!("must fit in i32, got {chunk_width}x{chunk_height}"),
            ));
        };
        if width == 0 || height == 0 {
            return Err(AtmosError::config(
                "chunk_dimensions",
                format!("must be non-zero, got {chunk_width}x{chunk_height}"),
            ));
        }
        let tile_size = source.tile_size();
        if !(tile_size.is_finite() && tile_size > 0.0) {
            return Err(AtmosError::config(
                "tile_size",
                format!("must be > 0, got {tile_size}"),
            ));
        }

        let mut keys = source.chunk_keys();
        keys.sort_unstable();
        keys.dedup();
        if keys.is_empty() {
            return Err(AtmosError::EmptyTopology);
        }

        let cells_per_chunk = chunk_width * chunk_height;
        let mut chunks = Vec::with_capacity(keys.len());
        let mut chunk_lookup = FxHashMap::default();
        let mut coords = Vec::with_capacity(keys.len() * cells_per_chunk);
        let mut kinds = Vec::with_capacity(keys.len() * cells_per_chunk);

        for key in keys {
            let Some(first) = chunk_origin(key, width, height) else {
                warn!("Skipping atmos chunk {key:?}: tiles outside the coordinate range");
                continue;
            };
            let chunk = Chunk {
                key,
                first_tile: first,
                first_cell: coords.len(),
                width: chunk_width,
                height: chunk_height,
            };
            for y in 0..height {
                for x in 0..width {
                    let coord = first.offset(x, y);
                    coords.push(coord);
                    kinds.push(source.tile_kind(coord));
                }
            }
            chunk_lookup.insert(key, chunks.len());
            chunks.push(chunk);
        }
        if chunks.is_empty() {
            return Err(AtmosError::EmptyTopology);
        }

        let mut topology = Self {
            chunk_width,
            chunk_height,
            tile_size,
            origin: source.origin(),
            chunks,
            chunk_lookup,
            coords,
            kinds,
            adjacency: Vec::new(),
        };
        topology.adjacency = topology.resolve_adjacency();

        info!(
            "Built atmos topology: {} chunks of {}x{}, {} cells",
            topology.chunks.len(),
            chunk_width,
            chunk_height,
            topology.len()
        );

        Ok(topology)
    }

    fn resolve_adjacency(&self) -> Vec<[Option<CellIndex>; 4]> {
        self.coords
            .iter()
            .map(|&coord| {
                Direction::ALL.map(|direction| {
                    let (dx, dy) = direction.offset();
                    self.index_of(coord.checked_offset(dx, dy)?)
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        self.chunk_lookup.get(&key).map(|&i| &self.chunks[i])
    }

    pub fn chunk_dimensions(&self) -> (usize, usize) {
        (self.chunk_width, self.chunk_height)
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Flat index of the cell at a tile coordinate
    pub fn index_of(&self, coord: TileCoord) -> Option<CellIndex> {
        let key = ChunkKey::containing(coord, self.chunk_width, self.chunk_height);
        self.chunk(key).map(|chunk| chunk.local_index(coord))
    }

    pub fn coord(&self, index: CellIndex) -> TileCoord {
        self.coords[index]
    }

    pub fn coords(&self) -> &[TileCoord] {
        &self.coords
    }

    pub fn kind(&self, index: CellIndex) -> TileKind {
        self.kinds[index]
    }

    pub fn neighbours(&self, index: CellIndex) -> [Option<CellIndex>; 4] {
        self.adjacency[index]
    }

    /// Tile coordinate nearest to a world position (X/Z plane)
    pub fn coord_at(&self, world: Vec3) -> Option<TileCoord> {
        let x = ((world.x - self.origin.x) / self.tile_size).round();
        let y = ((world.z - self.origin.z) / self.tile_size).round();
        let limit = i32::MAX as f32;
        if !(x.is_finite() && y.is_finite()) || x.abs() >= limit || y.abs() >= limit {
            return None;
        }
        Some(TileCoord::new(x as i32, y as i32))
    }

    /// Flat index of the cell under a world position
    pub fn cell_at(&self, world: Vec3) -> Option<CellIndex> {
        self.coord_at(world).and_then(|coord| self.index_of(coord))
    }

    /// World position of a tile centre
    pub fn world_position(&self, coord: TileCoord) -> Vec3 {
        Vec3::new(
            self.origin.x + coord.x as f32 * self.tile_size,
            self.origin.y,
            self.origin.z + coord.y as f32 * self.tile_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileMap;

    #[test]
    fn test_empty_source_is_rejected() {
        let map = TileMap::new(4, 4);
        assert!(matches!(
            Topology::build(&map),
            Err(AtmosError::EmptyTopology)
        ));
    }

    #[test]
    fn test_neighbours_resolve_across_chunks() {
        let mut map = TileMap::new(4, 4);
        map.fill_rect(TileCoord::new(0, 0), TileCoord::new(7, 3), TileKind::Floor);
        let topology = Topology::build(&map).unwrap();
        assert_eq!(topology.chunks().len(), 2);
        assert_eq!(topology.len(), 32);

        let edge = topology.index_of(TileCoord::new(3, 1)).unwrap();
        let across = topology.index_of(TileCoord::new(4, 1)).unwrap();
        assert_eq!(
            topology.neighbours(edge)[Direction::East.index()],
            Some(across)
        );
        assert_eq!(
            topology.neighbours(across)[Direction::West.index()],
            Some(edge)
        );
        assert_eq!(
            topology.neighbours(edge)[Direction::North.index()],
            topology.index_of(TileCoord::new(3, 2))
        );
        // Outside every chunk
        let corner = topology.index_of(TileCoord::new(0, 0)).unwrap();
        assert_eq!(topology.neighbours(corner)[Direction::South.index()], None);
    }

    #[test]
    fn test_chunks_past_the_coordinate_range_are_skipped() {
        struct Extremes;
        impl TileSource for Extremes {
            fn chunk_dimensions(&self) -> (usize, usize) {
                (4, 4)
            }
            fn tile_size(&self) -> f32 {
                1.0
            }
            fn origin(&self) -> Vec3 {
                Vec3::zeros()
            }
            fn chunk_keys(&self) -> Vec<ChunkKey> {
                vec![
                    ChunkKey::new(i32::MAX, 0),
                    ChunkKey::new(0, i32::MIN),
                    ChunkKey::new(i32::MAX / 4, 0),
                    ChunkKey::new(0, 0),
                ]
            }
            fn tile_kind(&self, _coord: TileCoord) -> TileKind {
                TileKind::Floor
            }
        }

        let topology = Topology::build(&Extremes).unwrap();
        // The chunk ending exactly at i32::MAX - 3 + 3 still fits
        assert_eq!(topology.chunks().len(), 2);
        let last = topology.index_of(TileCoord::new(i32::MAX - 3, 3)).unwrap();
        assert_eq!(topology.neighbours(last)[Direction::East.index()], Some(last + 1));
        let edge = topology.index_of(TileCoord::new(i32::MAX, 0)).unwrap();
        assert_eq!(topology.neighbours(edge)[Direction::East.index()], None);
    }

    #[test]
    fn test_oversized_chunks_are_rejected() {
        struct Huge;
        impl TileSource for Huge {
            fn chunk_dimensions(&self) -> (usize, usize) {
                (usize::MAX, 4)
            }
            fn tile_size(&self) -> f32 {
                1.0
            }
            fn origin(&self) -> Vec3 {
                Vec3::zeros()
            }
            fn chunk_keys(&self) -> Vec<ChunkKey> {
                vec![ChunkKey::new(0, 0)]
            }
            fn tile_kind(&self, _coord: TileCoord) -> TileKind {
                TileKind::Floor
            }
        }
        assert!(matches!(
            Topology::build(&Huge),
            Err(AtmosError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_world_lookup_rounds_to_nearest_tile() {
        let mut map = TileMap::new(4, 4).with_origin(Vec3::new(10.0, 0.0, -5.0));
        map.fill_rect(TileCoord::new(0, 0), TileCoord::new(3, 3), TileKind::Floor);
        let topology = Topology::build(&map).unwrap();

        let coord = topology.coord_at(Vec3::new(12.4, 7.0, -3.6)).unwrap();
        assert_eq!(coord, TileCoord::new(2, 1));
        assert_eq!(topology.world_position(coord), Vec3::new(12.0, 0.0, -4.0));
        assert!(topology.cell_at(Vec3::new(100.0, 0.0, 0.0)).is_none());
        assert!(topology.cell_at(Vec3::new(f32::NAN, 0.0, 0.0)).is_none());
    }
}
