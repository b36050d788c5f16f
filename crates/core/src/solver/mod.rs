//! Per-cell exchange solvers
//!
//! The solvers are pure: they read one cell plus a snapshot of its neighbours taken
//! at the start of the tick, and return a [`CellOutcome`] holding the cell's new
//! state and one [`NeighbourDelta`] per direction. Nothing here touches another
//! cell's live state, so every cell of a tick can be solved in parallel and in any
//! order with the same result.
//!
//! Order inside [`solve`]:
//! 1. [`flux`]: pressure-driven transfer (Active cells only)
//! 2. [`thermal`]: temperature exchange along directions flux flagged active
//! 3. state decision for Active cells
//! 4. [`mixing`]: diffusion for Semiactive cells (including ones that just settled)

pub mod flux;
pub mod mixing;
pub mod thermal;

use crate::config::AtmosConfig;
use crate::core_types::{GasMixture, GasVector};
use crate::grid::{CellState, NeighbourView};

/// Thresholds and rates used by the solvers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    pub timestep: f32,
    pub pressure_epsilon: f32,
    pub flux_epsilon: f32,
    pub min_mole_transfer: f32,
    pub mix_rate: f32,
    pub thermal_base: f32,
    pub thermal_epsilon: f32,
}

impl Default for SolverParams {
    fn default() -> Self {
        AtmosConfig::default().solver_params()
    }
}

/// Everything the solvers may read for one cell
#[derive(Debug, Clone, Copy)]
pub struct CellInput<'a> {
    pub state: CellState,
    pub mixture: GasMixture,
    pub temperature_settling: bool,
    pub neighbours: &'a [Option<NeighbourView>; 4],
}

/// Change requested on one neighbour, applied in the commit phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighbourDelta {
    /// Moles to add
    pub gas: GasVector,
    /// Temperature to add (K)
    pub temperature: f32,
    /// Moles that crossed into the neighbour by flux, for velocity
    pub flux: f32,
    /// Requested state change, merged so the most active request wins
    pub wake: Option<CellState>,
}

impl Default for NeighbourDelta {
    fn default() -> Self {
        Self {
            gas: GasVector::zeros(),
            temperature: 0.0,
            flux: 0.0,
            wake: None,
        }
    }
}

impl NeighbourDelta {
    pub fn request_wake(&mut self, state: CellState) {
        self.wake = Some(match self.wake {
            Some(current) if current.activity_rank() >= state.activity_rank() => current,
            _ => state,
        });
    }

    /// No gas and no heat moves
    pub fn is_quiet(&self) -> bool {
        self.gas.iter().all(|&moles| moles == 0.0) && self.temperature == 0.0
    }
}

/// Result of solving one cell for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellOutcome {
    pub state: CellState,
    pub mixture: GasMixture,
    pub temperature_settling: bool,
    pub active_direction: [bool; 4],
    /// Moles pushed per direction, including gas lost to vacuum
    pub pending_flux: [f32; 4],
    pub deltas: [NeighbourDelta; 4],
    /// Moles lost to vacuum neighbours
    pub drained: f32,
    /// Whether diffusion moved anything
    pub mixed: bool,
}

impl CellOutcome {
    /// Outcome that leaves the cell as it is
    pub fn unchanged(input: &CellInput<'_>) -> Self {
        Self {
            state: input.state,
            mixture: input.mixture,
            temperature_settling: input.temperature_settling,
            active_direction: [false; 4],
            pending_flux: [0.0; 4],
            deltas: [NeighbourDelta::default(); 4],
            drained: 0.0,
            mixed: false,
        }
    }

    /// Gas handed to neighbours (excluding vacuum drain)
    pub fn outflow(&self) -> GasVector {
        self.deltas
            .iter()
            .fold(GasVector::zeros(), |sum, delta| sum + delta.gas)
    }
}

/// Run flux, thermal exchange and mixing for one cell.
///
/// Cells that are not Active or Semiactive, and cells with a degenerate volume,
/// come back unchanged.
pub fn solve(input: &CellInput<'_>, params: &SolverParams) -> CellOutcome {
    let mut out = CellOutcome::unchanged(input);
    if !input.state.is_processed() || input.mixture.volume() <= 0.0 {
        return out;
    }
    out.mixture.sanitize();

    if input.state == CellState::Active {
        let moving = flux::run(input.neighbours, params, &mut out);
        let settling_now = thermal::run(input.neighbours, params, &mut out);

        if moving {
            out.state = CellState::Active;
            out.temperature_settling = settling_now;
        } else if settling_now || input.temperature_settling {
            // One more Active tick to let the temperature settle
            out.state = CellState::Active;
            out.temperature_settling = settling_now;
        } else {
            out.state = CellState::Semiactive;
            out.temperature_settling = false;
        }
    }

    if out.state == CellState::Semiactive {
        out.mixed = mixing::run(input.neighbours, params, &mut out);
        if !out.mixed {
            out.state = CellState::Inactive;
        }
    }

    out
}

/// Largest factor `<= 1` that keeps `total` within `available` component-wise
pub(crate) fn outflow_scale(total: &GasVector, available: &GasVector) -> f32 {
    total
        .iter()
        .zip(available.iter())
        .filter(|&(&out, _)| out > 0.0)
        .map(|(&out, &have)| have / out)
        .fold(1.0_f32, f32::min)
        .max(0.0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core_types::{Species, gas::DEFAULT_VOLUME};

    pub fn oxygen(moles: f32) -> GasMixture {
        let mut mixture = GasMixture::empty(DEFAULT_VOLUME);
        mixture.add_species(Species::Oxygen, moles);
        mixture
    }

    pub fn view(state: CellState, mixture: GasMixture) -> Option<NeighbourView> {
        Some(NeighbourView { state, mixture })
    }

    pub fn input<'a>(
        state: CellState,
        mixture: GasMixture,
        neighbours: &'a [Option<NeighbourView>; 4],
    ) -> CellInput<'a> {
        CellInput {
            state,
            mixture,
            temperature_settling: false,
            neighbours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::grid::Direction;

    #[test]
    fn test_equilibrium_pair_produces_no_deltas() {
        let air = GasMixture::air(2.5);
        let neighbours = [view(CellState::Active, air), None, None, None];
        let outcome = solve(&input(CellState::Active, air, &neighbours), &SolverParams::default());

        assert!(outcome.deltas.iter().all(NeighbourDelta::is_quiet));
        assert_eq!(outcome.mixture, air);
        assert_eq!(outcome.state, CellState::Inactive);
    }

    #[test]
    fn test_blocked_and_inactive_cells_are_untouched() {
        let neighbours = [view(CellState::Active, oxygen(0.0)), None, None, None];
        for state in [CellState::Inactive, CellState::Blocked, CellState::Vacuum] {
            let outcome = solve(
                &input(state, oxygen(50.0), &neighbours),
                &SolverParams::default(),
            );
            assert_eq!(outcome.state, state);
            assert_eq!(outcome.mixture, oxygen(50.0));
            assert!(outcome.deltas.iter().all(NeighbourDelta::is_quiet));
        }
    }

    #[test]
    fn test_active_cell_pushes_down_gradient() {
        let neighbours = [
            view(CellState::Inactive, oxygen(0.0)),
            None,
            None,
            None,
        ];
        let outcome = solve(
            &input(CellState::Active, oxygen(100.0), &neighbours),
            &SolverParams::default(),
        );
        let north = &outcome.deltas[Direction::North.index()];
        assert!(north.gas[0] > 0.0);
        assert_eq!(north.wake, Some(CellState::Active));
        assert_eq!(outcome.state, CellState::Active);
        assert!(
            (outcome.mixture.total_moles() + outcome.outflow().sum() - 100.0).abs() < 1e-3
        );
    }

    #[test]
    fn test_wake_merge_keeps_most_active() {
        let mut delta = NeighbourDelta::default();
        delta.request_wake(CellState::Active);
        delta.request_wake(CellState::Semiactive);
        assert_eq!(delta.wake, Some(CellState::Active));
    }

    #[test]
    fn test_outflow_scale_limits_to_available() {
        let total = GasVector::new(20.0, 5.0, 0.0, 0.0);
        let available = GasVector::new(10.0, 10.0, 0.0, 0.0);
        assert_eq!(outflow_scale(&total, &available), 0.5);
        assert_eq!(outflow_scale(&GasVector::zeros(), &available), 1.0);
    }
}
