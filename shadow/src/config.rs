use serde::{Deserialize, Serialize};

use crate::MAX_CASCADES;

/// How shadow lookups are filtered in the shading pass. The subsystem only
/// selects the mode and forwards it through the uniform buffer; the kernel
/// itself is a shader concern.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[repr(u32)]
pub enum FilterMode {
    Hard = 0,
    Pcf = 1,
    Pcss = 2,
    Vsm = 3,
}

/// Session-wide shadow tuning. Validate with [`ShadowConfig::validated`]
/// before handing it to the resource manager: out-of-range values are
/// clamped there and never reach buffer allocation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Number of cascades, 1 to [`MAX_CASCADES`].
    pub cascade_count: u32,
    /// Resolution of each cascade layer. Power of two recommended.
    pub shadow_map_size: u32,
    pub split_lambda: f32,
    pub filter_mode: FilterMode,
    pub pcf_sample_count: u32,
    pub pcf_radius: f32,
    pub depth_bias_constant: f32,
    pub depth_bias_slope: f32,
    pub normal_offset_scale: f32,
    /// Shadows stop at this camera-space distance, whatever the camera far
    /// plane is.
    pub max_shadow_distance: f32,
    pub fade_start_distance: f32,
    pub visualize_cascades: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            cascade_count: 4,
            shadow_map_size: 2048,
            split_lambda: 0.89,
            filter_mode: FilterMode::Pcf,
            pcf_sample_count: 16,
            pcf_radius: 2.0,
            depth_bias_constant: 1.25,
            depth_bias_slope: 1.75,
            normal_offset_scale: 0.02,
            max_shadow_distance: 150.0,
            fade_start_distance: 135.0,
            visualize_cascades: false,
        }
    }
}

impl ShadowConfig {
    /// Clamps every field into its valid range, warning about anything that
    /// had to change.
    pub fn validated(mut self) -> Self {
        if self.cascade_count < 1 || self.cascade_count > MAX_CASCADES as u32 {
            log::warn!(
                "cascade count {} outside 1..={}, clamping",
                self.cascade_count,
                MAX_CASCADES
            );
            self.cascade_count = self.cascade_count.clamp(1, MAX_CASCADES as u32);
        }
        if self.shadow_map_size == 0 {
            log::warn!("shadow map size of 0 requested, using 1");
            self.shadow_map_size = 1;
        } else if !self.shadow_map_size.is_power_of_two() {
            log::warn!(
                "shadow map size {} is not a power of two",
                self.shadow_map_size
            );
        }
        if !(0.0..=1.0).contains(&self.split_lambda) {
            log::warn!("split lambda {} outside [0, 1], clamping", self.split_lambda);
            self.split_lambda = self.split_lambda.clamp(0.0, 1.0);
        }
        if self.pcf_sample_count == 0 {
            log::warn!("pcf sample count of 0 requested, using 1");
            self.pcf_sample_count = 1;
        }
        if self.max_shadow_distance <= 0.0 {
            log::warn!(
                "non-positive max shadow distance {}, using default",
                self.max_shadow_distance
            );
            self.max_shadow_distance = Self::default().max_shadow_distance;
        }
        if self.fade_start_distance > self.max_shadow_distance {
            self.fade_start_distance = self.max_shadow_distance;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_cascade_count_is_clamped() {
        let config = ShadowConfig {
            cascade_count: 5,
            ..Default::default()
        }
        .validated();

        assert_eq!(config.cascade_count, 4);
    }

    #[test]
    fn zero_cascade_count_is_clamped() {
        let config = ShadowConfig {
            cascade_count: 0,
            ..Default::default()
        }
        .validated();

        assert_eq!(config.cascade_count, 1);
    }

    #[test]
    fn lambda_is_clamped_into_unit_range() {
        let config = ShadowConfig {
            split_lambda: 1.5,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.split_lambda, 1.0);

        let config = ShadowConfig {
            split_lambda: -0.5,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.split_lambda, 0.0);
    }

    #[test]
    fn fade_start_never_exceeds_max_distance() {
        let config = ShadowConfig {
            max_shadow_distance: 100.0,
            fade_start_distance: 200.0,
            ..Default::default()
        }
        .validated();

        assert_eq!(config.fade_start_distance, 100.0);
    }

    #[test]
    fn default_config_is_already_valid() {
        let config = ShadowConfig::default();
        let validated = config.validated();

        assert_eq!(config.cascade_count, validated.cascade_count);
        assert_eq!(config.shadow_map_size, validated.shadow_map_size);
        assert_eq!(config.split_lambda, validated.split_lambda);
    }
}
