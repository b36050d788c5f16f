//! Atmos cell and its state machine
//!
//! A [`Cell`] is one tile's atmosphere: a [`GasMixture`], a [`CellState`] and the
//! indices of its four orthogonal neighbours in the flat cell array. Cells also
//! carry per-tick scratch (neighbour snapshot, solver outcome) so the scheduler
//! can run the compute phase without touching any other cell.

use crate::core_types::{GasMixture, Vec2};
use crate::solver::CellOutcome;
use serde::{Deserialize, Serialize};

/// Stable index of a cell in the flat cell array
pub type CellIndex = usize;

/// Participation state of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellState {
    /// Pressure-driven flux to all open neighbours
    Active = 0,
    /// Diffusive mixing only
    Semiactive = 1,
    /// Skipped until disturbed
    Inactive = 2,
    /// Open space, an infinite sink that never holds gas
    Vacuum = 3,
    /// Wall or missing structure, never exchanges anything
    Blocked = 4,
}

impl CellState {
    /// Convert from u8 for FFI compatibility
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CellState::Active),
            1 => Some(CellState::Semiactive),
            2 => Some(CellState::Inactive),
            3 => Some(CellState::Vacuum),
            4 => Some(CellState::Blocked),
            _ => None,
        }
    }

    /// Convert to u8 for FFI compatibility
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the scheduler runs the solvers for this state
    #[inline]
    pub fn is_processed(self) -> bool {
        matches!(self, CellState::Active | CellState::Semiactive)
    }

    /// Whether the state can be changed by a wake request
    #[inline]
    pub fn is_wakeable(self) -> bool {
        matches!(
            self,
            CellState::Active | CellState::Semiactive | CellState::Inactive
        )
    }

    /// Ordering used to merge several wake requests on one cell.
    /// The most active request wins.
    #[inline]
    pub(crate) fn activity_rank(self) -> u8 {
        match self {
            CellState::Active => 2,
            CellState::Semiactive => 1,
            _ => 0,
        }
    }

    /// Apply a wake request: raises Inactive/Semiactive cells, never touches
    /// Vacuum or Blocked and never demotes.
    #[must_use]
    pub fn woken_to(self, requested: CellState) -> CellState {
        if self.is_wakeable() && requested.activity_rank() > self.activity_rank() {
            requested
        } else {
            self
        }
    }
}

/// One of the four orthogonal neighbour slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Tile offset (x, y) of the neighbour in this direction
    #[inline]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    #[inline]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Unit vector on the tile plane
    #[inline]
    pub fn unit(self) -> Vec2 {
        let (x, y) = self.offset();
        Vec2::new(x as f32, y as f32)
    }
}

/// State of a neighbour as seen at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighbourView {
    pub state: CellState,
    pub mixture: GasMixture,
}

impl NeighbourView {
    /// View of a live state, Blocked when the volume cannot hold gas
    pub fn exposed(state: CellState, mixture: GasMixture) -> Self {
        let state = if mixture.volume() > 0.0 {
            state
        } else {
            CellState::Blocked
        };
        Self { state, mixture }
    }
}

/// One grid cell
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) state: CellState,
    pub(crate) mixture: GasMixture,
    pub(crate) neighbours: [Option<CellIndex>; 4],
    /// Moles pushed per direction during the last tick
    pub(crate) pending_flux: [f32; 4],
    /// Directions with a pressure gradient in the last tick
    pub(crate) active_direction: [bool; 4],
    pub(crate) temperature_settling: bool,
    /// Net flow through the cell during the last tick
    pub(crate) velocity: Vec2,

    // Per-tick scratch, only meaningful between snapshot and commit
    pub(crate) snapshot: [Option<NeighbourView>; 4],
    pub(crate) outcome: Option<CellOutcome>,
}

impl Cell {
    pub fn new(state: CellState, mixture: GasMixture, neighbours: [Option<CellIndex>; 4]) -> Self {
        Self {
            state,
            mixture,
            neighbours,
            pending_flux: [0.0; 4],
            active_direction: [false; 4],
            temperature_settling: false,
            velocity: Vec2::zeros(),
            snapshot: [None; 4],
            outcome: None,
        }
    }

    #[inline]
    pub fn state(&self) -> CellState {
        self.state
    }

    #[inline]
    pub fn mixture(&self) -> &GasMixture {
        &self.mixture
    }

    #[inline]
    pub fn neighbours(&self) -> &[Option<CellIndex>; 4] {
        &self.neighbours
    }

    #[inline]
    pub fn neighbour(&self, direction: Direction) -> Option<CellIndex> {
        self.neighbours[direction.index()]
    }

    pub fn pending_flux(&self) -> &[f32; 4] {
        &self.pending_flux
    }

    pub fn active_direction(&self) -> &[bool; 4] {
        &self.active_direction
    }

    pub fn is_temperature_settling(&self) -> bool {
        self.temperature_settling
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Exposed state read by neighbours during the snapshot phase.
    ///
    /// A cell without a positive volume cannot hold gas and reads as Blocked.
    #[inline]
    pub fn view(&self) -> NeighbourView {
        NeighbourView::exposed(self.state, self.mixture)
    }

    /// Number of resolved neighbour slots
    pub fn neighbour_count(&self) -> usize {
        self.neighbours.iter().flatten().count()
    }

    /// Whether the cell can hold gas
    #[inline]
    pub fn is_open(&self) -> bool {
        !matches!(self.state, CellState::Blocked | CellState::Vacuum)
    }

    /// Raise the cell's state, see [`CellState::woken_to`]
    pub(crate) fn wake(&mut self, requested: CellState) {
        self.state = self.state.woken_to(requested);
    }
}
