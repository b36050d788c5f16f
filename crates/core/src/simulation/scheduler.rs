//! Tick phases
//!
//! One tick runs four phases over the cell array, then the same phases over the
//! devices:
//!
//! 1. **snapshot**: every processed cell copies its neighbours' exposed state,
//!    and every device copies the exposed state of what it links to
//! 2. **compute**: cells are solved in parallel batches against their snapshot,
//!    writing only their own `outcome`
//! 3. **barrier**: the parallel iterator returns only when every batch finished
//! 4. **commit**: outcomes are applied in index order, first each cell's own
//!    result, then every neighbour delta
//!
//! Devices are computed and committed after the grid commit, against the
//! snapshot taken at the start of the tick. Gas a device draws from a cell is
//! clamped to what the cell still holds at that point.
//!
//! Because nothing reads live neighbour state during compute and the commit is
//! sequential, the result of a tick does not depend on batch size, thread count
//! or scheduling order.

use super::device::{DeviceLink, DeviceSlot, LinkTarget};
use crate::core_types::{GasMixture, GasVector, Vec2};
use crate::grid::{Cell, CellState, Direction, NeighbourView, Topology};
use crate::solver::{solve, CellInput, NeighbourDelta, SolverParams};
use rayon::prelude::*;

/// Totals gathered while running one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct TickReport {
    /// Moles removed by vacuum, including deltas sent to cells that cannot hold gas
    pub drained: f32,
    /// Cells and devices skipped because their volume is not positive
    pub invalid_cells: usize,
}

/// Run the grid phases followed by the device phases
pub(crate) fn run_tick(
    cells: &mut [Cell],
    devices: &mut [DeviceSlot],
    topology: &Topology,
    params: &SolverParams,
    batch_size: usize,
) -> TickReport {
    snapshot_cells(cells, batch_size);
    if !devices.is_empty() {
        snapshot_devices(devices, cells, topology);
    }
    let mut invalid_cells = compute_cells(cells, params, batch_size);
    let mut drained = commit_cells(cells);

    if !devices.is_empty() {
        invalid_cells += compute_devices(devices, params);
        drained += commit_devices(devices, cells, params);
    }

    TickReport {
        drained,
        invalid_cells,
    }
}

// ============================================================================
// Grid cells
// ============================================================================

fn snapshot_cells(cells: &mut [Cell], batch_size: usize) {
    let views: Vec<NeighbourView> = cells.par_iter().map(Cell::view).collect();

    cells.par_chunks_mut(batch_size).for_each(|chunk| {
        for cell in chunk {
            cell.snapshot = if cell.state.is_processed() {
                cell.neighbours.map(|n| n.map(|index| views[index]))
            } else {
                [None; 4]
            };
        }
    });
}

fn compute_cells(cells: &mut [Cell], params: &SolverParams, batch_size: usize) -> usize {
    cells
        .par_chunks_mut(batch_size)
        .map(|chunk| {
            let mut invalid = 0;
            for cell in chunk {
                cell.outcome = None;
                if !cell.state.is_processed() {
                    continue;
                }
                if cell.mixture.volume() <= 0.0 {
                    invalid += 1;
                    continue;
                }
                let input = CellInput {
                    state: cell.state,
                    mixture: cell.mixture,
                    temperature_settling: cell.temperature_settling,
                    neighbours: &cell.snapshot,
                };
                cell.outcome = Some(solve(&input, params));
            }
            invalid
        })
        .sum()
}

fn commit_cells(cells: &mut [Cell]) -> f32 {
    let mut drained = 0.0;

    for cell in cells.iter_mut() {
        cell.velocity = Vec2::zeros();
    }

    let outcomes: Vec<_> = cells
        .iter_mut()
        .enumerate()
        .filter_map(|(index, cell)| cell.outcome.take().map(|outcome| (index, outcome)))
        .collect();

    for (index, outcome) in &outcomes {
        let cell = &mut cells[*index];
        cell.state = outcome.state;
        cell.mixture = outcome.mixture;
        cell.temperature_settling = outcome.temperature_settling;
        cell.active_direction = outcome.active_direction;
        cell.pending_flux = outcome.pending_flux;
        for direction in Direction::ALL {
            cell.velocity += direction.unit() * outcome.pending_flux[direction.index()];
        }
        drained += outcome.drained;
    }

    for (index, outcome) in &outcomes {
        let neighbours = cells[*index].neighbours;
        for direction in Direction::ALL {
            let i = direction.index();
            let Some(target) = neighbours[i] else {
                continue;
            };
            let delta = &outcome.deltas[i];
            let cell = &mut cells[target];
            drained += absorb(&mut cell.state, &mut cell.mixture, delta);
            cell.velocity += direction.unit() * delta.flux;
        }
    }

    drained
}

/// Apply one neighbour delta to a live state.
///
/// Returns the moles lost because the receiver cannot hold gas.
fn absorb(state: &mut CellState, mixture: &mut GasMixture, delta: &NeighbourDelta) -> f32 {
    if matches!(*state, CellState::Vacuum | CellState::Blocked) || mixture.volume() <= 0.0 {
        return delta.gas.sum();
    }
    mixture.add_all(&delta.gas);
    if delta.temperature != 0.0 {
        let temperature = mixture.temperature() + delta.temperature;
        mixture.set_temperature(temperature);
    }
    if let Some(wake) = delta.wake {
        *state = state.woken_to(wake);
    }
    0.0
}

// ============================================================================
// Devices
// ============================================================================

fn snapshot_devices(devices: &mut [DeviceSlot], cells: &[Cell], topology: &Topology) {
    let views: Vec<NeighbourView> = devices.iter().map(DeviceSlot::view).collect();

    for slot in devices.iter_mut() {
        slot.targets = slot.device.links().map(|link| match link? {
            DeviceLink::Tile(coord) => topology.index_of(coord).map(LinkTarget::Cell),
            DeviceLink::Device(id) => (id < views.len()).then_some(LinkTarget::Device(id)),
        });
        slot.snapshot = slot.targets.map(|target| match target? {
            LinkTarget::Cell(index) => cells.get(index).map(Cell::view),
            LinkTarget::Device(id) => views.get(id).copied(),
        });
    }

    // A device draws through a link unless the far side links back and pushes itself
    let targets: Vec<[Option<LinkTarget>; 4]> = devices.iter().map(|slot| slot.targets).collect();
    for (id, slot) in devices.iter_mut().enumerate() {
        slot.draws = slot.targets.map(|target| match target {
            Some(LinkTarget::Cell(_)) => true,
            Some(LinkTarget::Device(other)) => {
                other != id && !targets[other].contains(&Some(LinkTarget::Device(id)))
            }
            None => false,
        });
    }
}

/// Solve every device and the far side of its drawing links.
///
/// Returns the number of processed devices skipped for a non-positive volume.
fn compute_devices(devices: &mut [DeviceSlot], params: &SolverParams) -> usize {
    devices
        .par_iter_mut()
        .map(|slot| {
            slot.outcome = None;
            slot.intakes = [None; 4];
            let state = slot.device.state();
            if slot.device.mixture().volume() <= 0.0 {
                return usize::from(state.is_processed());
            }

            let own = [Some(slot.view()), None, None, None];
            slot.intakes = std::array::from_fn(|i| {
                let sender = slot.snapshot[i].filter(|_| slot.draws[i])?;
                let input = CellInput {
                    state: sender.state,
                    mixture: sender.mixture,
                    temperature_settling: false,
                    neighbours: &own,
                };
                let delta = solve(&input, params).deltas[0];
                (!delta.is_quiet() || delta.wake.is_some()).then_some(delta)
            });

            if state.is_processed() {
                let input = CellInput {
                    state,
                    mixture: *slot.device.mixture(),
                    temperature_settling: slot.temperature_settling,
                    neighbours: &slot.snapshot,
                };
                slot.outcome = Some(solve(&input, params));
            }
            0
        })
        .sum()
}

fn commit_devices(devices: &mut [DeviceSlot], cells: &mut [Cell], params: &SolverParams) -> f32 {
    let mut drained = 0.0;

    let outcomes: Vec<_> = devices
        .iter_mut()
        .enumerate()
        .filter_map(|(id, slot)| slot.outcome.take().map(|outcome| (id, outcome)))
        .collect();

    for (id, outcome) in &outcomes {
        let slot = &mut devices[*id];
        slot.device.set_state(outcome.state);
        *slot.device.mixture_mut() = outcome.mixture;
        slot.temperature_settling = outcome.temperature_settling;
        drained += outcome.drained;
    }

    for (id, outcome) in &outcomes {
        let targets = devices[*id].targets;
        for (target, delta) in targets.iter().zip(outcome.deltas.iter()) {
            match target {
                Some(LinkTarget::Cell(index)) => {
                    let cell = &mut cells[*index];
                    drained += absorb(&mut cell.state, &mut cell.mixture, delta);
                }
                Some(LinkTarget::Device(other)) => {
                    let device = &mut devices[*other].device;
                    let mut state = device.state();
                    drained += absorb(&mut state, device.mixture_mut(), delta);
                    device.set_state(state);
                }
                None => {}
            }
        }
    }

    for id in 0..devices.len() {
        let targets = devices[id].targets;
        let intakes = std::mem::replace(&mut devices[id].intakes, [None; 4]);
        for (target, intake) in targets.iter().zip(intakes) {
            let (Some(target), Some(mut delta)) = (*target, intake) else {
                continue;
            };
            delta.gas = match target {
                LinkTarget::Cell(index) => {
                    let cell = &mut cells[index];
                    release(&mut cell.state, &mut cell.mixture, &delta, params)
                }
                LinkTarget::Device(other) => {
                    let device = &mut devices[other].device;
                    let mut state = device.state();
                    let released = release(&mut state, device.mixture_mut(), &delta, params);
                    device.set_state(state);
                    released
                }
            };
            let device = &mut devices[id].device;
            let mut state = device.state();
            drained += absorb(&mut state, device.mixture_mut(), &delta);
            device.set_state(state);
        }
    }

    drained
}

/// Take the gas and heat of a drawn delta out of its sender.
///
/// The gas is clamped to what the sender holds now. A sender that loses gas is
/// woken so the grid rebalances around it. Returns the gas actually released.
fn release(
    state: &mut CellState,
    mixture: &mut GasMixture,
    delta: &NeighbourDelta,
    params: &SolverParams,
) -> GasVector {
    if !state.is_wakeable() || mixture.volume() <= 0.0 {
        return GasVector::zeros();
    }
    let released = delta.gas.inf(mixture.amounts());
    mixture.remove_all(&released);
    if delta.temperature != 0.0 {
        let temperature = mixture.temperature() - delta.temperature;
        mixture.set_temperature(temperature);
    }
    let moles = released.sum();
    if moles > 0.0 {
        *state = state.woken_to(if moles > params.flux_epsilon {
            CellState::Active
        } else {
            CellState::Semiactive
        });
    }
    released
}
