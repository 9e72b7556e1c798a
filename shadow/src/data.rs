use bytemuck::{Pod, Zeroable};
use nalgebra::{vector, Matrix4, Point3, Vector3};

use crate::{math::shape::BoundingShape, CascadeFit, ShadowConfig, MAX_CASCADES};

const MATRIX_IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// One depth slice of the camera frustum with its fitted light matrices.
#[derive(Clone, Copy, Debug)]
pub struct ShadowCascade {
    pub view_matrix: Matrix4<f32>,
    pub proj_matrix: Matrix4<f32>,
    /// Always `proj_matrix * view_matrix`.
    pub view_proj_matrix: Matrix4<f32>,
    /// Far edge of this cascade in camera-space depth.
    pub split_distance: f32,
    pub bounds: BoundingShape,
}

impl Default for ShadowCascade {
    fn default() -> Self {
        Self {
            view_matrix: Matrix4::identity(),
            proj_matrix: Matrix4::identity(),
            view_proj_matrix: Matrix4::identity(),
            split_distance: 0.0,
            bounds: BoundingShape::Sphere {
                origin: Point3::origin(),
                radius: 0.0,
            },
        }
    }
}

impl ShadowCascade {
    pub fn from_fit(fit: &CascadeFit, split_distance: f32) -> Self {
        Self {
            view_matrix: fit.view,
            proj_matrix: fit.projection,
            view_proj_matrix: fit.projection * fit.view,
            split_distance,
            bounds: fit.bounds,
        }
    }
}

/// A shadow-casting directional light, as handed over by the scene system.
#[derive(Clone, Copy, Debug)]
pub struct DirectionalLight {
    pub direction: Vector3<f32>,
    pub shadow_strength: f32,
}

/// Per-frame cascade set for one directional light. Recomputed from the
/// current camera every frame; holds no identity across frames.
#[derive(Clone, Copy, Debug)]
pub struct DirectionalLightShadow {
    pub cascades: [ShadowCascade; MAX_CASCADES],
    pub active_cascade_count: u32,
    pub light_direction: Vector3<f32>,
    pub shadow_strength: f32,
}

impl Default for DirectionalLightShadow {
    fn default() -> Self {
        Self {
            cascades: [ShadowCascade::default(); MAX_CASCADES],
            active_cascade_count: 0,
            light_direction: vector![0.0, -1.0, 0.0],
            shadow_strength: 1.0,
        }
    }
}

impl DirectionalLightShadow {
    /// The cascade covering a camera-space depth; depths past the last
    /// split stay in the last cascade.
    pub fn cascade_for_depth(&self, view_depth: f32) -> usize {
        let count = (self.active_cascade_count as usize).clamp(1, MAX_CASCADES);
        for i in 0..count {
            if view_depth < self.cascades[i].split_distance {
                return i;
            }
        }
        count - 1
    }
}

/// Placeholder payloads: the render path for these light kinds is not
/// implemented.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointLightShadow;

#[derive(Clone, Copy, Debug, Default)]
pub struct SpotLightShadow;

/// Shadow data for any light kind.
#[derive(Clone, Copy, Debug)]
pub enum LightShadowData {
    Directional(DirectionalLightShadow),
    Point(PointLightShadow),
    Spot(SpotLightShadow),
}

impl LightShadowData {
    pub fn as_directional(&self) -> Option<&DirectionalLightShadow> {
        match self {
            LightShadowData::Directional(shadow) => Some(shadow),
            _ => None,
        }
    }
}

/// GPU mirror of the per-frame shadow state.
///
/// The layout is fixed-size and 16-byte aligned no matter how many
/// cascades are active; inactive matrix slots hold identity and inactive
/// distances zero, so shaders can index blindly.
///
/// - `shadow_params`: bias constant, normal offset scale, pcf radius,
///   shadow strength
/// - `shadow_config`: cascade count, filter mode, map size, cascade
///   visualization flag
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ShadowUbo {
    pub light_space_matrices: [[[f32; 4]; 4]; MAX_CASCADES],
    pub cascade_distances: [f32; 4],
    pub shadow_params: [f32; 4],
    pub shadow_config: [u32; 4],
    pub light_direction: [f32; 4],
}

impl ShadowUbo {
    pub fn from_shadow_data(shadow: &DirectionalLightShadow, config: &ShadowConfig) -> Self {
        let mut ubo = Self {
            light_space_matrices: [MATRIX_IDENTITY; MAX_CASCADES],
            cascade_distances: [0.0; 4],
            shadow_params: [
                config.depth_bias_constant,
                config.normal_offset_scale,
                config.pcf_radius,
                shadow.shadow_strength,
            ],
            shadow_config: [0; 4],
            light_direction: [
                shadow.light_direction.x,
                shadow.light_direction.y,
                shadow.light_direction.z,
                0.0,
            ],
        };

        let count = (shadow.active_cascade_count as usize).min(MAX_CASCADES);
        for i in 0..count {
            ubo.light_space_matrices[i] = shadow.cascades[i].view_proj_matrix.into();
            ubo.cascade_distances[i] = shadow.cascades[i].split_distance;
        }
        ubo.shadow_config = [
            count as u32,
            config.filter_mode as u32,
            config.shadow_map_size,
            config.visualize_cascades as u32,
        ];
        ubo
    }
}
