//! Distance falloff for point lights.

use serde::{Deserialize, Serialize};

use super::{pow2, pow4, saturate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttenuationMode {
    /// Windowed polynomial falloff reaching zero at the cutoff.
    #[default]
    Legacy,
    /// Inverse power falloff with a smooth quartic window.
    Physical,
}

/// Falloff with the mode already chosen: `(distance, cutoff, decay) -> factor`.
pub type Attenuation = fn(f32, f32, f32) -> f32;

impl AttenuationMode {
    pub fn function(self) -> Attenuation {
        match self {
            AttenuationMode::Legacy => distance_attenuation,
            AttenuationMode::Physical => physical_distance_attenuation,
        }
    }
}

/// `saturate(1 - d / cutoff) ^ decay` when both the cutoff and the decay are
/// positive, otherwise no falloff.
pub fn distance_attenuation(light_distance: f32, cutoff_distance: f32, decay_exponent: f32) -> f32 {
    if cutoff_distance > 0.0 && decay_exponent > 0.0 {
        return saturate(-light_distance / cutoff_distance + 1.0).powf(decay_exponent);
    }
    1.0
}

// Frostbite "moving to PBR" course notes, eq. 26 (window1).
pub fn physical_distance_attenuation(light_distance: f32, cutoff_distance: f32, decay_exponent: f32) -> f32 {
    let mut falloff = 1.0 / light_distance.powf(decay_exponent).max(0.01);
    if cutoff_distance > 0.0 {
        falloff *= pow2(saturate(1.0 - pow4(light_distance / cutoff_distance)));
    }
    falloff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_zero_at_cutoff() {
        for decay in [0.5, 1.0, 2.0, 3.7] {
            assert_eq!(distance_attenuation(5.0, 5.0, decay), 0.0);
            assert_eq!(distance_attenuation(0.0, 5.0, decay), 1.0);
        }
    }

    #[test]
    fn beyond_cutoff_stays_zero() {
        assert_eq!(distance_attenuation(12.0, 5.0, 2.0), 0.0);
    }

    #[test]
    fn non_positive_range_disables_falloff() {
        for d in [0.0, 0.3, 4.0, 1000.0] {
            assert_eq!(distance_attenuation(d, 0.0, 2.0), 1.0);
            assert_eq!(distance_attenuation(d, -1.0, 2.0), 1.0);
            assert_eq!(distance_attenuation(d, 5.0, 0.0), 1.0);
        }
    }

    #[test]
    fn falloff_is_monotonic_inside_window() {
        let mut prev = 1.0;
        for i in 1..=10 {
            let a = distance_attenuation(i as f32 * 0.5, 5.0, 2.0);
            assert!(a <= prev);
            prev = a;
        }
        assert!((distance_attenuation(2.5, 5.0, 2.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn physical_mode_clamps_near_source() {
        assert_eq!(physical_distance_attenuation(0.0, 0.0, 2.0), 100.0);
        assert_eq!(physical_distance_attenuation(5.0, 5.0, 2.0), 0.0);
        assert!((AttenuationMode::Physical.function()(2.0, 0.0, 2.0) - 0.25).abs() < 1e-6);
        assert_eq!(AttenuationMode::Legacy.function()(2.5, 5.0, 2.0), distance_attenuation(2.5, 5.0, 2.0));
    }
}
