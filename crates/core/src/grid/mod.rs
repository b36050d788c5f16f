//! Grid cells, tile boundary and chunked topology

pub mod cell;
pub mod tile_map;
pub mod topology;

pub use cell::{Cell, CellIndex, CellState, Direction, NeighbourView};
pub use tile_map::{ChunkKey, TileCoord, TileKind, TileMap, TileSource};
pub use topology::{Chunk, Topology};

use crate::config::{AtmosConfig, InitialFill};
use crate::core_types::GasMixture;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use tracing::error;

/// Open-cell state kept across a rebuild, keyed by tile coordinate
#[derive(Debug, Clone, Copy)]
pub(crate) struct CarriedCell {
    pub kind: TileKind,
    pub state: CellState,
    pub mixture: GasMixture,
}

/// Structural state of a tile before any gas is placed
fn structural_state(
    topology: &Topology,
    index: CellIndex,
    edge_is_space: bool,
) -> CellState {
    match topology.kind(index) {
        TileKind::Void | TileKind::Wall => CellState::Blocked,
        TileKind::Space => CellState::Vacuum,
        TileKind::Floor => {
            let resolved = topology.neighbours(index).iter().flatten().count();
            if resolved == 0 {
                let coord = topology.coord(index);
                error!(
                    "Floor tile ({}, {}) has no resolved neighbours, treating as blocked",
                    coord.x, coord.y
                );
                CellState::Blocked
            } else if edge_is_space && resolved < 4 {
                CellState::Vacuum
            } else {
                CellState::Active
            }
        }
    }
}

/// Create the flat cell array for a topology.
///
/// Without `carried`, every enclosed cell starts Active with the configured
/// initial fill. With `carried`, enclosed cells whose tile is unchanged keep
/// their mixture; they keep their state too once the simulation has
/// stabilised, unless a neighbouring tile changed.
pub(crate) fn build_cells(
    topology: &Topology,
    config: &AtmosConfig,
    carried: Option<&FxHashMap<TileCoord, CarriedCell>>,
    stabilized: bool,
) -> Vec<Cell> {
    let mut rng = match config.initial_fill {
        InitialFill::Random { seed } => Some(StdRng::seed_from_u64(seed)),
        InitialFill::Air | InitialFill::Empty => None,
    };

    let is_changed = |index: CellIndex| -> bool {
        carried.is_some_and(|map| {
            map.get(&topology.coord(index)).map(|c| c.kind) != Some(topology.kind(index))
        })
    };

    (0..topology.len())
        .map(|index| {
            let neighbours = topology.neighbours(index);
            let state = structural_state(topology, index, config.edge_is_space);
            let mut mixture = GasMixture::empty(config.cell_volume);

            if state != CellState::Active {
                mixture.make_vacuum_like();
                return Cell::new(state, mixture, neighbours);
            }

            let survivor = carried
                .and_then(|map| map.get(&topology.coord(index)))
                .filter(|c| c.kind == TileKind::Floor && c.state.is_wakeable());

            let state = if let Some(previous) = survivor {
                mixture = previous.mixture;
                mixture.set_volume(config.cell_volume);
                let disturbed = neighbours.iter().flatten().any(|&n| is_changed(n));
                if stabilized && !disturbed {
                    previous.state
                } else {
                    CellState::Active
                }
            } else {
                match config.initial_fill {
                    InitialFill::Air => mixture.make_air(),
                    InitialFill::Empty => {}
                    InitialFill::Random { .. } => {
                        if let Some(rng) = rng.as_mut() {
                            mixture.make_random(rng);
                        }
                    }
                }
                CellState::Active
            };

            Cell::new(state, mixture, neighbours)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed_room() -> TileMap {
        let mut map = TileMap::new(8, 8);
        map.room(TileCoord::new(0, 0), TileCoord::new(4, 4));
        map
    }

    #[test]
    fn test_initial_states_follow_tile_kinds() {
        let mut map = sealed_room();
        map.set(TileCoord::new(6, 6), TileKind::Space);
        let topology = Topology::build(&map).unwrap();
        let cells = build_cells(&topology, &AtmosConfig::default(), None, false);

        let state_at = |x, y| cells[topology.index_of(TileCoord::new(x, y)).unwrap()].state();
        assert_eq!(state_at(0, 0), CellState::Blocked);
        assert_eq!(state_at(2, 2), CellState::Active);
        assert_eq!(state_at(6, 6), CellState::Vacuum);
        assert_eq!(state_at(7, 7), CellState::Blocked);

        let floor = &cells[topology.index_of(TileCoord::new(2, 2)).unwrap()];
        assert!(floor.mixture().is_breathable());
        let wall = &cells[topology.index_of(TileCoord::new(0, 0)).unwrap()];
        assert_eq!(wall.mixture().total_moles(), 0.0);
    }

    #[test]
    fn test_edge_is_space_opens_map_border() {
        let mut map = TileMap::new(3, 3);
        map.fill_rect(TileCoord::new(0, 0), TileCoord::new(2, 2), TileKind::Floor);
        let topology = Topology::build(&map).unwrap();
        let config = AtmosConfig {
            edge_is_space: true,
            ..AtmosConfig::default()
        };
        let cells = build_cells(&topology, &config, None, false);
        let centre = topology.index_of(TileCoord::new(1, 1)).unwrap();
        let edge = topology.index_of(TileCoord::new(0, 1)).unwrap();
        assert_eq!(cells[centre].state(), CellState::Active);
        assert_eq!(cells[edge].state(), CellState::Vacuum);
    }

    #[test]
    fn test_isolated_floor_is_blocked() {
        let mut map = TileMap::new(1, 1);
        map.set(TileCoord::new(0, 0), TileKind::Floor);
        let topology = Topology::build(&map).unwrap();
        let cells = build_cells(&topology, &AtmosConfig::default(), None, false);
        assert_eq!(cells[0].state(), CellState::Blocked);
    }

    #[test]
    fn test_carried_cells_keep_mixture_and_state() {
        let map = sealed_room();
        let topology = Topology::build(&map).unwrap();
        let quiet = topology.index_of(TileCoord::new(1, 1)).unwrap();
        let mut carried = FxHashMap::default();
        for index in 0..topology.len() {
            carried.insert(
                topology.coord(index),
                CarriedCell {
                    kind: topology.kind(index),
                    state: CellState::Inactive,
                    mixture: GasMixture::empty(2.5),
                },
            );
        }

        let cells = build_cells(&topology, &AtmosConfig::default(), Some(&carried), true);
        assert_eq!(cells[quiet].state(), CellState::Inactive);
        assert_eq!(cells[quiet].mixture().total_moles(), 0.0);

        // Never stabilised: survivors restart Active
        let cells = build_cells(&topology, &AtmosConfig::default(), Some(&carried), false);
        assert_eq!(cells[quiet].state(), CellState::Active);
    }
}
