//! Per-tick statistics

use crate::grid::{Cell, CellState};
use serde::Serialize;

/// Statistics for the simulation, refreshed after every tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SimulationStats {
    pub tick: u64,
    pub active_cells: usize,
    pub semiactive_cells: usize,
    pub inactive_cells: usize,
    pub vacuum_cells: usize,
    pub blocked_cells: usize,
    /// Cells skipped this tick because of a degenerate volume
    pub invalid_cells: usize,
    pub device_count: usize,
    /// Moles held by open cells and devices
    pub total_moles: f32,
    /// Moles lost to vacuum during the last tick
    pub drained_moles: f32,
    pub simulation_time: f32,
    pub step_time_ms: f32,
}

impl SimulationStats {
    /// Reset the per-state counters from the cell array
    pub(crate) fn count_cells(&mut self, cells: &[Cell]) {
        self.active_cells = 0;
        self.semiactive_cells = 0;
        self.inactive_cells = 0;
        self.vacuum_cells = 0;
        self.blocked_cells = 0;
        for cell in cells {
            match cell.state() {
                CellState::Active => self.active_cells += 1,
                CellState::Semiactive => self.semiactive_cells += 1,
                CellState::Inactive => self.inactive_cells += 1,
                CellState::Vacuum => self.vacuum_cells += 1,
                CellState::Blocked => self.blocked_cells += 1,
            }
        }
    }

    /// Cells the solvers will visit next tick
    pub fn processed_cells(&self) -> usize {
        self.active_cells + self.semiactive_cells
    }

    pub fn total_cells(&self) -> usize {
        self.active_cells
            + self.semiactive_cells
            + self.inactive_cells
            + self.vacuum_cells
            + self.blocked_cells
    }
}
