//! Pressure-driven flux
//!
//! For every open neighbour at lower pressure, the partial-pressure difference is
//! converted to moles with the ideal gas law,
//!
//! ```text
//! n = ΔP · 1000 · V / (T · R) · dt
//! ```
//!
//! clamped to what the cell holds. When the directional transfers together would
//! export more than exists, all of them are scaled down by one common factor.
//! Vacuum neighbours drain gas without receiving it.

use super::{outflow_scale, CellOutcome, SolverParams};
use crate::core_types::gas::{self, GasVector};
use crate::core_types::GAS_CONSTANT;
use crate::grid::{CellState, Direction, NeighbourView};

/// Compute and apply flux for an Active cell.
///
/// Fills `active_direction`, `pending_flux`, the gas part of the neighbour
/// deltas and `drained`. Also asks higher-pressure idle neighbours to wake so
/// they push gas this way next tick.
///
/// A neighbour is only promoted to Active when the flow involved would count as
/// moving (more than `flux_epsilon` moles per tick). Receivers of smaller
/// transfers become Semiactive, and idle neighbours with a smaller surplus stay
/// as they are.
///
/// # Returns
///
/// Whether the cell is still moving gas: some direction exceeded
/// `flux_epsilon` or anything drained to vacuum.
pub fn run(
    neighbours: &[Option<NeighbourView>; 4],
    params: &SolverParams,
    out: &mut CellOutcome,
) -> bool {
    let own = out.mixture;
    let amounts = *own.amounts();
    let pressure = own.pressure();
    let partial_pressures = own.partial_pressures();
    let moles_per_kpa = 1000.0 * own.volume() / (own.temperature() * GAS_CONSTANT);

    let mut transfers = [GasVector::zeros(); 4];
    let mut into_vacuum = [false; 4];

    for direction in Direction::ALL {
        let i = direction.index();
        let Some(neighbour) = neighbours[i] else {
            continue;
        };

        match neighbour.state {
            CellState::Blocked => {}
            CellState::Vacuum => {
                if own.total_moles() > 0.0 {
                    into_vacuum[i] = true;
                    transfers[i] = amounts * params.timestep;
                }
            }
            CellState::Active | CellState::Semiactive | CellState::Inactive => {
                let difference = pressure - neighbour.mixture.pressure();
                if difference > params.pressure_epsilon {
                    out.active_direction[i] = true;
                    let gradient = gas::non_negative(
                        &(partial_pressures - neighbour.mixture.partial_pressures()),
                    );
                    let moles = gas::non_negative(&(gradient * moles_per_kpa * params.timestep))
                        .inf(&amounts);
                    if gas::any_above(&moles, params.min_mole_transfer) {
                        transfers[i] = moles;
                    }
                } else if difference < -params.pressure_epsilon
                    && -difference * moles_per_kpa * params.timestep > params.flux_epsilon
                    && matches!(neighbour.state, CellState::Inactive | CellState::Semiactive)
                {
                    out.deltas[i].request_wake(CellState::Active);
                }
            }
        }
    }

    let total = transfers.iter().fold(GasVector::zeros(), |sum, t| sum + t);
    let scale = outflow_scale(&total, &amounts);
    if scale < 1.0 {
        for transfer in &mut transfers {
            *transfer *= scale;
        }
    }

    for direction in Direction::ALL {
        let i = direction.index();
        let moles = transfers[i].sum();
        if moles <= 0.0 {
            continue;
        }
        out.mixture.remove_all(&transfers[i]);
        out.pending_flux[i] = moles;
        out.deltas[i].flux += moles;
        if into_vacuum[i] {
            out.drained += moles;
        } else {
            out.deltas[i].gas += transfers[i];
            out.deltas[i].request_wake(if moles > params.flux_epsilon {
                CellState::Active
            } else {
                CellState::Semiactive
            });
        }
    }

    // A trace left next to space is lost entirely instead of decaying forever
    if let Some(i) = into_vacuum.iter().position(|&v| v) {
        let remaining = out.mixture.total_moles();
        if remaining > 0.0 && remaining < params.min_mole_transfer {
            out.mixture.make_empty();
            out.pending_flux[i] += remaining;
            out.drained += remaining;
        }
    }

    out.drained > 0.0
        || out
            .pending_flux
            .iter()
            .any(|&moles| moles > params.flux_epsilon)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{CellInput, CellOutcome, SolverParams};
    use super::*;
    use crate::core_types::{GasMixture, Species};
    use approx::assert_relative_eq;

    fn run_flux(own: GasMixture, neighbours: &[Option<NeighbourView>; 4]) -> CellOutcome {
        let input: CellInput<'_> = input(CellState::Active, own, neighbours);
        let mut out = CellOutcome::unchanged(&input);
        run(neighbours, &SolverParams::default(), &mut out);
        out
    }

    #[test]
    fn test_transfer_follows_ideal_gas_law() {
        let neighbours = [view(CellState::Active, oxygen(0.0)), None, None, None];
        let out = run_flux(oxygen(100.0), &neighbours);
        // Same temperature on both sides: n = Δn · dt
        assert_relative_eq!(out.pending_flux[0], 10.0, epsilon = 1e-3);
        assert_relative_eq!(out.mixture.total_moles(), 90.0, epsilon = 1e-3);
        assert!(out.active_direction[0]);
    }

    #[test]
    fn test_vacuum_drains_without_receiving() {
        let neighbours = [
            view(CellState::Vacuum, GasMixture::empty(2.5)),
            view(CellState::Blocked, GasMixture::empty(2.5)),
            None,
            None,
        ];
        let out = run_flux(GasMixture::air(2.5), &neighbours);
        assert!(out.drained > 0.0);
        assert!(out.deltas[0].gas.iter().all(|&m| m == 0.0));
        assert!(!out.active_direction[0]);
        assert_eq!(out.pending_flux[1], 0.0);
    }

    #[test]
    fn test_trace_next_to_vacuum_is_emptied() {
        let neighbours = [view(CellState::Vacuum, GasMixture::empty(2.5)), None, None, None];
        let out = run_flux(oxygen(0.0005), &neighbours);
        assert_eq!(out.mixture.total_moles(), 0.0);
        assert_relative_eq!(out.drained, 0.0005, epsilon = 1e-7);
    }

    #[test]
    fn test_outflow_never_exceeds_holdings() {
        let params = SolverParams {
            timestep: 1.0,
            ..SolverParams::default()
        };
        let neighbours = [view(CellState::Active, oxygen(0.0)); 4];
        let own = oxygen(40.0);
        let input = input(CellState::Active, own, &neighbours);
        let mut out = CellOutcome::unchanged(&input);
        run(&neighbours, &params, &mut out);

        let sent: f32 = out.pending_flux.iter().sum();
        assert!(sent <= 40.0 + 1e-3);
        assert!(out.mixture.total_moles() >= 0.0);
        assert_relative_eq!(sent, 40.0, epsilon = 1e-3);
        assert_relative_eq!(out.pending_flux[0], out.pending_flux[2], epsilon = 1e-4);
    }

    #[test]
    fn test_higher_pressure_idle_neighbour_is_woken() {
        let neighbours = [
            view(CellState::Inactive, GasMixture::air(2.5)),
            view(CellState::Active, GasMixture::air(2.5)),
            None,
            None,
        ];
        let out = run_flux(oxygen(1.0), &neighbours);
        assert_eq!(out.deltas[0].wake, Some(CellState::Active));
        // Already active, nothing to request
        assert_eq!(out.deltas[1].wake, None);
        assert!(out.deltas[0].is_quiet());
    }

    #[test]
    fn test_small_gradients_do_not_promote_neighbours() {
        // 0.2 mol apart: the transfer is 0.02 mol, under flux_epsilon
        let neighbours = [
            view(CellState::Inactive, oxygen(100.0)),
            view(CellState::Inactive, oxygen(100.4)),
            None,
            None,
        ];
        let out = run_flux(oxygen(100.2), &neighbours);
        assert!(out.pending_flux[0] > 0.0);
        assert_eq!(out.deltas[0].wake, Some(CellState::Semiactive));
        assert_eq!(out.deltas[1].wake, None);
    }

    #[test]
    fn test_partial_pressure_gradient_is_per_species() {
        let mut own = oxygen(50.0);
        own.add_species(Species::Nitrogen, 10.0);
        let mut neighbour = GasMixture::empty(2.5);
        neighbour.add_species(Species::Nitrogen, 30.0);

        let out = run_flux(own, &[view(CellState::Active, neighbour), None, None, None]);
        let sent = out.deltas[0].gas;
        assert!(sent[Species::Oxygen.index()] > 0.0);
        assert_eq!(sent[Species::Nitrogen.index()], 0.0);
    }
}
