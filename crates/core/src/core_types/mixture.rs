//! Per-cell gas store
//!
//! A [`GasMixture`] holds moles per species, a temperature and a constant volume.
//! Pressure follows the ideal gas law and is reported in kPa:
//!
//! ```text
//! P = n · R · T / V / 1000
//! ```
//!
//! Every derived quantity returns 0 for an empty mixture instead of NaN, and all
//! mutators clamp amounts to `>= 0`, so consumers never observe negative or NaN state.

use super::gas::{
    self, GasVector, Species, BREATHABLE_MAX_CARBON_DIOXIDE, BREATHABLE_MIN_OXYGEN,
    DEFAULT_VOLUME, GAS_CONSTANT, MIN_TEMPERATURE, ROOM_TEMPERATURE,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Oxygen in the default air mixture (mol)
pub const AIR_OXYGEN: f32 = 20.79;
/// Nitrogen in the default air mixture (mol)
pub const AIR_NITROGEN: f32 = 83.17;

/// Reference mole count used to scale external heating
const HEAT_REFERENCE_MOLES: f32 = 100.0;

/// Gas amounts, temperature and volume of one cell or device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasMixture {
    /// Moles per species, always `>= 0`
    amounts: GasVector,
    /// Temperature (K)
    temperature: f32,
    /// Volume, constant for the lifetime of a cell
    volume: f32,
}

impl Default for GasMixture {
    fn default() -> Self {
        Self::empty(DEFAULT_VOLUME)
    }
}

impl GasMixture {
    /// Empty mixture at room temperature
    pub fn empty(volume: f32) -> Self {
        Self {
            amounts: GasVector::zeros(),
            temperature: ROOM_TEMPERATURE,
            volume,
        }
    }

    /// Standard breathable air at 293 K
    pub fn air(volume: f32) -> Self {
        let mut mixture = Self::empty(volume);
        mixture.make_air();
        mixture
    }

    /// Mixture with explicit amounts and temperature.
    ///
    /// Amounts are clamped to `>= 0`; an invalid temperature falls back to
    /// [`MIN_TEMPERATURE`].
    pub fn with_amounts(volume: f32, amounts: GasVector, temperature: f32) -> Self {
        let mut mixture = Self {
            amounts: gas::non_negative(&amounts),
            temperature,
            volume,
        };
        mixture.sanitize();
        mixture
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Moles per species
    #[inline]
    pub fn amounts(&self) -> &GasVector {
        &self.amounts
    }

    /// Moles of a single species
    #[inline]
    pub fn amount(&self, species: Species) -> f32 {
        self.amounts[species.index()]
    }

    /// Temperature (K)
    #[inline]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Volume
    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    /// Sum of all species (mol)
    #[inline]
    pub fn total_moles(&self) -> f32 {
        self.amounts.sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_moles() <= 0.0
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Add moles of one species. The result is clamped to `>= 0`.
    pub fn add_species(&mut self, species: Species, amount: f32) {
        if !amount.is_finite() {
            warn!("Ignoring non-finite {} amount {}", species.name(), amount);
            return;
        }
        let slot = &mut self.amounts[species.index()];
        *slot = (*slot + amount).max(0.0);
    }

    /// Remove moles of one species. The result is clamped to `>= 0`.
    pub fn remove_species(&mut self, species: Species, amount: f32) {
        self.add_species(species, -amount);
    }

    /// Component-wise add, clamped to `>= 0`
    pub fn add_all(&mut self, amounts: &GasVector) {
        self.amounts = gas::non_negative(&(self.amounts + amounts));
    }

    /// Component-wise remove, clamped to `>= 0`
    pub fn remove_all(&mut self, amounts: &GasVector) {
        self.amounts = gas::non_negative(&(self.amounts - amounts));
    }

    /// Replace all amounts, clamped to `>= 0`
    pub fn set_amounts(&mut self, amounts: &GasVector) {
        self.amounts = gas::non_negative(amounts);
    }

    /// Set the temperature.
    ///
    /// Negative or non-finite values are rejected and the previous value is kept.
    /// Returns whether the value was accepted.
    pub fn set_temperature(&mut self, temperature: f32) -> bool {
        if temperature.is_finite() && temperature >= 0.0 {
            self.temperature = temperature;
            true
        } else {
            false
        }
    }

    /// Remove all gas, keeping temperature and volume
    pub fn make_empty(&mut self) {
        self.amounts = GasVector::zeros();
    }

    /// Replace contents with standard air (20.79 mol O2, 83.17 mol N2, 293 K)
    pub fn make_air(&mut self) {
        self.make_empty();
        self.add_species(Species::Oxygen, AIR_OXYGEN);
        self.add_species(Species::Nitrogen, AIR_NITROGEN);
        self.temperature = ROOM_TEMPERATURE;
    }

    /// Empty mixture at background temperature, used for vacuum and blocked cells
    pub fn make_vacuum_like(&mut self) {
        self.make_empty();
        self.temperature = MIN_TEMPERATURE;
    }

    /// Fill with random amounts around standard air composition
    pub fn make_random<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.make_empty();
        self.add_species(Species::Oxygen, rng.random_range(0.0..2.0 * AIR_OXYGEN));
        self.add_species(Species::Nitrogen, rng.random_range(0.0..2.0 * AIR_NITROGEN));
        self.add_species(Species::CarbonDioxide, rng.random_range(0.0..2.0));
        self.temperature = rng.random_range(273.0..313.0);
    }

    /// Warm the mixture towards an external heat source.
    ///
    /// `ΔT = (T_source − T) / c · (100 / n) · dt`, never overshooting the source.
    /// No effect on an empty mixture or a colder source.
    pub fn add_heat(&mut self, source_temperature: f32, dt: f32) {
        let Some(rate) = self.heat_rate(dt) else {
            return;
        };
        let difference = (source_temperature - self.temperature).max(0.0);
        let delta = (difference * rate).min(difference);
        self.temperature += delta;
    }

    /// Cool the mixture towards an external heat sink. Mirror of [`Self::add_heat`].
    pub fn remove_heat(&mut self, sink_temperature: f32, dt: f32) {
        let Some(rate) = self.heat_rate(dt) else {
            return;
        };
        let difference = (self.temperature - sink_temperature).max(0.0);
        let delta = (difference * rate).min(difference);
        self.temperature = (self.temperature - delta).max(0.0);
    }

    fn heat_rate(&self, dt: f32) -> Option<f32> {
        let moles = self.total_moles();
        let specific_heat = self.specific_heat();
        if moles <= 0.0 || specific_heat <= 0.0 || !dt.is_finite() || dt <= 0.0 {
            return None;
        }
        Some(HEAT_REFERENCE_MOLES / moles / specific_heat * dt)
    }

    /// Clamp invalid state in place and report whether anything had to change.
    ///
    /// NaN or negative amounts become zero; a NaN, infinite or non-positive
    /// temperature becomes [`MIN_TEMPERATURE`].
    pub fn sanitize(&mut self) -> bool {
        let mut clamped = false;
        let amounts = gas::non_negative(&self.amounts);
        if amounts != self.amounts {
            warn!("Clamped invalid gas amounts {:?}", self.amounts);
            self.amounts = amounts;
            clamped = true;
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            warn!(
                "Clamped invalid temperature {} to {}",
                self.temperature, MIN_TEMPERATURE
            );
            self.temperature = MIN_TEMPERATURE;
            clamped = true;
        }
        clamped
    }

    // ------------------------------------------------------------------
    // Derived quantities
    // ------------------------------------------------------------------

    /// Pressure (kPa), 0 for an empty mixture or a degenerate volume
    pub fn pressure(&self) -> f32 {
        self.pressure_of(self.total_moles())
    }

    /// Partial pressure of one species (kPa)
    pub fn partial_pressure(&self, species: Species) -> f32 {
        self.pressure_of(self.amount(species))
    }

    /// Partial pressures of all species (kPa)
    pub fn partial_pressures(&self) -> GasVector {
        self.amounts.map(|moles| self.pressure_of(moles))
    }

    #[inline]
    fn pressure_of(&self, moles: f32) -> f32 {
        if moles <= 0.0 || self.volume <= 0.0 {
            return 0.0;
        }
        let pressure = moles * GAS_CONSTANT * self.temperature / self.volume / 1000.0;
        if pressure.is_finite() {
            pressure
        } else {
            0.0
        }
    }

    /// Mass of the contained gas in grams
    pub fn mass(&self) -> f32 {
        self.amounts.component_mul(&gas::molar_masses()).sum()
    }

    /// Mole-weighted specific heat (J/(mol·K)), 0 when empty
    pub fn specific_heat(&self) -> f32 {
        let moles = self.total_moles();
        if moles <= 0.0 {
            return 0.0;
        }
        self.amounts.component_mul(&gas::specific_heats()).sum() / moles
    }

    /// Oxygen partial pressure of at least 16 kPa and carbon dioxide below 8 kPa
    pub fn is_breathable(&self) -> bool {
        self.partial_pressure(Species::Oxygen) >= BREATHABLE_MIN_OXYGEN
            && self.partial_pressure(Species::CarbonDioxide) < BREATHABLE_MAX_CARBON_DIOXIDE
    }
}
