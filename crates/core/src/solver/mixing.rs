//! Diffusive mixing for cells without a net pressure gradient
//!
//! The receiver's follow-up state depends on the pressure residual left after the
//! transfer, converted to the moles flux would move for it in one tick. Only a
//! residual worth more than `flux_epsilon` promotes the receiver to Active.
//! Smaller residuals settle through Semiactive, including the one left between
//! two pressure-balanced cells at slightly different temperatures, which flux
//! would otherwise keep pushing back.

use super::{outflow_scale, CellOutcome, SolverParams};
use crate::core_types::gas::{self, GasVector};
use crate::core_types::GAS_CONSTANT;
use crate::grid::{CellState, Direction, NeighbourView};

/// Move `(own − neighbour) · mix_rate` of each species towards every open
/// neighbour holding less of it.
///
/// Each receiving neighbour is asked to become Active when flux would move more
/// than `flux_epsilon` moles for the pressure residual left after the transfer,
/// Semiactive otherwise.
///
/// # Returns
///
/// Whether any direction mixed.
pub fn run(
    neighbours: &[Option<NeighbourView>; 4],
    params: &SolverParams,
    out: &mut CellOutcome,
) -> bool {
    let amounts = *out.mixture.amounts();
    let mut transfers = [GasVector::zeros(); 4];

    for direction in Direction::ALL {
        let i = direction.index();
        let Some(neighbour) = neighbours[i] else {
            continue;
        };
        if !neighbour.state.is_wakeable() {
            continue;
        }
        let difference =
            gas::non_negative(&((amounts - neighbour.mixture.amounts()) * params.mix_rate));
        if gas::any_above(&difference, params.min_mole_transfer) {
            transfers[i] = difference;
        }
    }

    let total = transfers.iter().fold(GasVector::zeros(), |sum, t| sum + t);
    if total.iter().all(|&moles| moles <= 0.0) {
        return false;
    }
    let scale = outflow_scale(&total, &amounts);
    for transfer in &mut transfers {
        *transfer *= scale;
        out.mixture.remove_all(transfer);
    }

    let own_pressure = out.mixture.pressure();
    let flux_per_kpa = 1000.0 * out.mixture.volume()
        / (out.mixture.temperature() * GAS_CONSTANT)
        * params.timestep;
    for direction in Direction::ALL {
        let i = direction.index();
        let Some(neighbour) = neighbours[i] else {
            continue;
        };
        if transfers[i].iter().all(|&moles| moles <= 0.0) {
            continue;
        }
        let delta = &mut out.deltas[i];
        delta.gas += transfers[i];

        let mut projected = neighbour.mixture;
        projected.add_all(&delta.gas);
        let residual = (projected.pressure() - own_pressure).abs() * flux_per_kpa;
        delta.request_wake(if residual > params.flux_epsilon {
            CellState::Active
        } else {
            CellState::Semiactive
        });
    }

    true
}
