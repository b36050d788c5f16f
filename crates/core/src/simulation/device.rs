//! Gas-exchanging machinery outside the tile grid
//!
//! Devices expose the same state and mixture surface as a grid cell and are solved
//! with the same solvers, as a second population after the grid. A device links
//! to up to four neighbours, each either a tile or another device.
//!
//! Exchange along a link runs both ways. The device's own solve pushes gas and
//! heat into what it links to. Each linked cell, or linked device that does not
//! link back, is also solved against the device as its only neighbour, and that
//! result is drawn into the device.

use crate::core_types::{GasMixture, Species};
use crate::grid::{CellState, NeighbourView, TileCoord};
use crate::solver::{CellOutcome, NeighbourDelta};
use std::any::Any;

/// Handle returned by [`crate::AtmosSimulation::add_device`]
pub type DeviceId = usize;

/// Neighbour of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceLink {
    /// Grid cell at a tile coordinate, resolved every tick so links survive rebuilds
    Tile(TileCoord),
    /// Another device
    Device(DeviceId),
}

/// Capability every gas-exchanging device implements
pub trait AtmosDevice: Any + Send + Sync {
    fn state(&self) -> CellState;

    fn set_state(&mut self, state: CellState);

    fn mixture(&self) -> &GasMixture;

    fn mixture_mut(&mut self) -> &mut GasMixture;

    /// Neighbour slots, indexed like [`crate::grid::Direction`]
    fn links(&self) -> [Option<DeviceLink>; 4];

    /// Hook run once per tick before the grid is solved
    fn update(&mut self, _dt: f32) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Target of a device link after resolution against the current topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkTarget {
    Cell(usize),
    Device(DeviceId),
}

/// Scheduler-side storage for one device
pub(crate) struct DeviceSlot {
    pub device: Box<dyn AtmosDevice>,
    pub temperature_settling: bool,
    pub targets: [Option<LinkTarget>; 4],
    /// Links whose far side is solved against this device
    pub draws: [bool; 4],
    pub snapshot: [Option<NeighbourView>; 4],
    pub outcome: Option<CellOutcome>,
    /// Gas and heat each drawing link sends into this device
    pub intakes: [Option<NeighbourDelta>; 4],
}

impl DeviceSlot {
    pub fn new(device: Box<dyn AtmosDevice>) -> Self {
        Self {
            device,
            temperature_settling: false,
            targets: [None; 4],
            draws: [false; 4],
            snapshot: [None; 4],
            outcome: None,
            intakes: [None; 4],
        }
    }

    pub fn view(&self) -> NeighbourView {
        NeighbourView::exposed(self.device.state(), *self.device.mixture())
    }
}

/// Sealed gas tank with a valve onto a single port
#[derive(Debug, Clone)]
pub struct Canister {
    state: CellState,
    mixture: GasMixture,
    port: Option<DeviceLink>,
    valve_open: bool,
}

impl Canister {
    /// Closed canister holding `mixture`
    pub fn new(mixture: GasMixture) -> Self {
        Self {
            state: CellState::Inactive,
            mixture,
            port: None,
            valve_open: false,
        }
    }

    /// Canister filled with `moles` of one species at room temperature
    pub fn filled(volume: f32, species: Species, moles: f32) -> Self {
        let mut mixture = GasMixture::empty(volume);
        mixture.add_species(species, moles);
        Self::new(mixture)
    }

    pub fn connect(&mut self, port: DeviceLink) {
        self.port = Some(port);
    }

    pub fn open_valve(&mut self) {
        self.valve_open = true;
        self.state = self.state.woken_to(CellState::Active);
    }

    pub fn close_valve(&mut self) {
        self.valve_open = false;
    }

    pub fn is_valve_open(&self) -> bool {
        self.valve_open
    }
}

impl AtmosDevice for Canister {
    fn state(&self) -> CellState {
        self.state
    }

    fn set_state(&mut self, state: CellState) {
        self.state = state;
    }

    fn mixture(&self) -> &GasMixture {
        &self.mixture
    }

    fn mixture_mut(&mut self) -> &mut GasMixture {
        &mut self.mixture
    }

    fn links(&self) -> [Option<DeviceLink>; 4] {
        if self.valve_open {
            [self.port, None, None, None]
        } else {
            [None; 4]
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Pipe segment joining up to four neighbours
#[derive(Debug, Clone)]
pub struct Pipe {
    state: CellState,
    mixture: GasMixture,
    links: [Option<DeviceLink>; 4],
}

impl Pipe {
    /// Empty pipe with no connections
    pub fn new(volume: f32) -> Self {
        Self {
            state: CellState::Active,
            mixture: GasMixture::empty(volume),
            links: [None; 4],
        }
    }

    /// Attach a neighbour to one of the four slots
    pub fn connect(&mut self, slot: usize, link: DeviceLink) {
        if let Some(entry) = self.links.get_mut(slot) {
            *entry = Some(link);
            self.state = self.state.woken_to(CellState::Active);
        }
    }

    pub fn disconnect(&mut self, slot: usize) {
        if let Some(entry) = self.links.get_mut(slot) {
            *entry = None;
        }
    }
}

impl AtmosDevice for Pipe {
    fn state(&self) -> CellState {
        self.state
    }

    fn set_state(&mut self, state: CellState) {
        self.state = state;
    }

    fn mixture(&self) -> &GasMixture {
        &self.mixture
    }

    fn mixture_mut(&mut self) -> &mut GasMixture {
        &mut self.mixture
    }

    fn links(&self) -> [Option<DeviceLink>; 4] {
        self.links
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
