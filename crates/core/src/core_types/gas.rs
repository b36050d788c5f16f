//! Gas species and the fixed-width per-species amount vector
//!
//! The species set is small and closed, so amounts are stored in a
//! `nalgebra::Vector4<f32>` indexed by [`Species::index`]. Component-wise
//! arithmetic (`sup`, `inf`, `component_mul`, `sum`) replaces per-species loops.

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

/// Per-species amounts (moles, or any per-species quantity) indexed by [`Species::index`].
pub type GasVector = Vector4<f32>;

/// Number of tracked gas species.
pub const SPECIES_COUNT: usize = 4;

/// Universal gas constant R in J/(mol·K)
pub const GAS_CONSTANT: f32 = 8.314;

/// Lowest temperature a mixture is clamped to when an invalid value is observed (K).
/// Cosmic microwave background temperature.
pub const MIN_TEMPERATURE: f32 = 2.7;

/// Default temperature for freshly created mixtures (K)
pub const ROOM_TEMPERATURE: f32 = 293.0;

/// Default cell volume
pub const DEFAULT_VOLUME: f32 = 2.5;

/// Minimum oxygen partial pressure for a breathable atmosphere (kPa)
pub const BREATHABLE_MIN_OXYGEN: f32 = 16.0;

/// Carbon dioxide partial pressure at which the atmosphere stops being breathable (kPa)
pub const BREATHABLE_MAX_CARBON_DIOXIDE: f32 = 8.0;

/// Gas species tracked by every mixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Species {
    Oxygen = 0,
    Nitrogen = 1,
    CarbonDioxide = 2,
    Plasma = 3,
}

impl Species {
    /// All species in index order
    pub const ALL: [Species; SPECIES_COUNT] = [
        Species::Oxygen,
        Species::Nitrogen,
        Species::CarbonDioxide,
        Species::Plasma,
    ];

    /// Index of this species inside a [`GasVector`]
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Convert from a raw discriminant (used by the C API)
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    /// Molar mass in g/mol
    pub const fn molar_mass(self) -> f32 {
        match self {
            Species::Oxygen => 32.0,
            Species::Nitrogen => 28.0,
            Species::CarbonDioxide => 44.0,
            Species::Plasma => 78.0,
        }
    }

    /// Molar specific heat in J/(mol·K)
    pub const fn specific_heat(self) -> f32 {
        match self {
            Species::Oxygen => 29.4,
            Species::Nitrogen => 29.1,
            Species::CarbonDioxide => 37.1,
            Species::Plasma => 80.0,
        }
    }

    /// Human readable name
    pub const fn name(self) -> &'static str {
        match self {
            Species::Oxygen => "oxygen",
            Species::Nitrogen => "nitrogen",
            Species::CarbonDioxide => "carbon dioxide",
            Species::Plasma => "plasma",
        }
    }
}

/// Molar masses of all species as a vector (g/mol)
pub fn molar_masses() -> GasVector {
    GasVector::from_fn(|i, _| Species::ALL[i].molar_mass())
}

/// Molar specific heats of all species as a vector (J/(mol·K))
pub fn specific_heats() -> GasVector {
    GasVector::from_fn(|i, _| Species::ALL[i].specific_heat())
}

/// Build a vector holding `amount` for a single species
pub fn single(species: Species, amount: f32) -> GasVector {
    let mut v = GasVector::zeros();
    v[species.index()] = amount;
    v
}

/// Clamp every component to `>= 0`, mapping non-finite components to zero.
#[inline]
pub fn non_negative(v: &GasVector) -> GasVector {
    v.map(|a| if a.is_finite() { a.max(0.0) } else { 0.0 })
}

/// True if any component is strictly greater than `threshold`
#[inline]
pub fn any_above(v: &GasVector, threshold: f32) -> bool {
    v.iter().any(|&a| a > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_round_trip_through_u8() {
        for species in Species::ALL {
            assert_eq!(Species::from_u8(species as u8), Some(species));
        }
        assert_eq!(Species::from_u8(4), None);
    }

    #[test]
    fn test_non_negative_clears_nan_and_negatives() {
        let v = GasVector::new(-1.0, f32::NAN, 2.0, f32::INFINITY);
        assert_eq!(non_negative(&v), GasVector::new(0.0, 0.0, 2.0, 0.0));
    }

    #[test]
    fn test_single_sets_one_component() {
        let v = single(Species::CarbonDioxide, 3.0);
        assert_eq!(v.sum(), 3.0);
        assert_eq!(v[Species::CarbonDioxide.index()], 3.0);
    }
}
