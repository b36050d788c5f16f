//! Save/load boundary for cell contents
//!
//! The host owns the file format. This module only converts the simulation's open
//! cells to and from plain serde records keyed by tile coordinate, so a record
//! set survives a topology rebuild.

use super::AtmosSimulation;
use crate::core_types::{GasVector, SPECIES_COUNT};
use crate::grid::{CellState, TileCoord};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Contents of one open cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub coord: TileCoord,
    pub state: CellState,
    /// Moles per species in [`crate::core_types::Species`] order
    pub amounts: [f32; SPECIES_COUNT],
    pub temperature: f32,
}

impl AtmosSimulation {
    /// Records for every cell that can hold gas
    pub fn export_cells(&self) -> Vec<CellRecord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_open())
            .map(|(index, cell)| {
                let amounts = cell.mixture().amounts();
                CellRecord {
                    coord: self.topology.coord(index),
                    state: cell.state(),
                    amounts: [amounts[0], amounts[1], amounts[2], amounts[3]],
                    temperature: cell.mixture().temperature(),
                }
            })
            .collect()
    }

    /// Restore cell contents from records.
    ///
    /// Records for coordinates that are missing or cannot hold gas are skipped.
    /// Vacuum and Blocked come from the tiles, never from a record, so such
    /// records restore the mixture but leave the cell Active. Invalid amounts are
    /// clamped. Returns the number of records applied.
    pub fn import_cells(&mut self, records: &[CellRecord]) -> usize {
        let mut applied = 0;
        let mut skipped = 0;

        for record in records {
            let Some(index) = self.topology.index_of(record.coord) else {
                skipped += 1;
                continue;
            };
            let cell = &mut self.cells[index];
            if !cell.is_open() {
                skipped += 1;
                continue;
            }

            cell.mixture.set_amounts(&GasVector::from(record.amounts));
            if !cell.mixture.set_temperature(record.temperature) {
                warn!(
                    "Ignoring invalid temperature {} for tile ({}, {})",
                    record.temperature, record.coord.x, record.coord.y
                );
            }
            cell.state = if record.state.is_wakeable() {
                record.state
            } else {
                CellState::Active
            };
            cell.temperature_settling = false;
            applied += 1;
        }

        if applied > 0 {
            self.stabilized = false;
            self.refresh_stats();
        }
        if skipped > 0 {
            warn!("Skipped {} cell records without an open cell", skipped);
        }
        info!("Imported {} cell records", applied);
        applied
    }
}
