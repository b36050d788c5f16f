//! Temperature exchange along active flux directions

use super::{CellOutcome, SolverParams};
use crate::grid::{CellState, Direction, NeighbourView};

/// Conduct heat to every colder neighbour in a direction flagged active by flux.
///
/// `ΔT · thermal_base · V` moves from this cell to the neighbour when it exceeds
/// `thermal_epsilon`. Returns whether anything moved, which keeps the cell
/// Active for the following tick.
pub fn run(
    neighbours: &[Option<NeighbourView>; 4],
    params: &SolverParams,
    out: &mut CellOutcome,
) -> bool {
    let volume = out.mixture.volume();
    let mut exchanged = false;

    for direction in Direction::ALL {
        let i = direction.index();
        if !out.active_direction[i] {
            continue;
        }
        let Some(neighbour) = neighbours[i] else {
            continue;
        };

        let difference = out.mixture.temperature() - neighbour.mixture.temperature();
        let transfer = difference * params.thermal_base * volume;
        if transfer > params.thermal_epsilon {
            let cooled = out.mixture.temperature() - transfer;
            if out.mixture.set_temperature(cooled) {
                let delta = &mut out.deltas[i];
                delta.temperature += transfer;
                delta.request_wake(CellState::Active);
                exchanged = true;
            }
        }
    }

    exchanged
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{solve, CellOutcome, SolverParams};
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_heat_flows_from_hot_to_cold_along_flux() {
        let mut hot = oxygen(100.0);
        hot.set_temperature(400.0);
        let neighbours = [view(CellState::Active, oxygen(10.0)), None, None, None];

        let input = input(CellState::Active, hot, &neighbours);
        let mut out = CellOutcome::unchanged(&input);
        out.active_direction[0] = true;
        assert!(run(&neighbours, &SolverParams::default(), &mut out));

        let expected = (400.0 - 293.0) * 0.024 * 2.5;
        assert_relative_eq!(out.deltas[0].temperature, expected, epsilon = 1e-3);
        assert_relative_eq!(out.mixture.temperature(), 400.0 - expected, epsilon = 1e-3);
    }

    #[test]
    fn test_no_exchange_without_active_direction() {
        let mut hot = oxygen(10.0);
        hot.set_temperature(400.0);
        let neighbours = [view(CellState::Active, oxygen(10.0)), None, None, None];
        let input = input(CellState::Active, hot, &neighbours);
        let mut out = CellOutcome::unchanged(&input);
        assert!(!run(&neighbours, &SolverParams::default(), &mut out));
        assert_eq!(out.deltas[0].temperature, 0.0);
    }

    #[test]
    fn test_temperature_exchange_keeps_cell_active() {
        let mut hot = oxygen(10.02);
        hot.set_temperature(350.0);
        let neighbours = [view(CellState::Active, oxygen(10.0)), None, None, None];
        let outcome = solve(
            &input(CellState::Active, hot, &neighbours),
            &SolverParams::default(),
        );
        assert!(outcome.temperature_settling);
        assert_eq!(outcome.state, CellState::Active);
    }
}
