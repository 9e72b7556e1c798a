//! Pure cascade math: split planning, frustum corner extraction and the
//! directional-light frustum fit. Nothing in here touches the device; the
//! resource side lives in [`crate::ShadowResourceManager`].

use nalgebra::{vector, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{math::shape::BoundingShape, Camera, SMALL_NUMBER};

/// Hard cap from the fixed-size uniform buffer layout.
pub const MAX_CASCADES: usize = 4;

/// Fitting policy for a single cascade, distinct from the session-wide
/// [`crate::ShadowConfig`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CascadeSettings {
    /// Blend between uniform (0) and logarithmic (1) split spacing.
    pub split_lambda: f32,
    /// Extra light-space depth margin so casters slightly outside the
    /// fitted volume still land in the map.
    pub z_padding: f32,
    /// Depth-range expansion used by the stabilized (non-tight) Z mode.
    pub z_mult: f32,
    /// Tight per-cascade Z bounds, or a stabilized range derived from the
    /// cascade's bounding sphere.
    pub tight_z: bool,
    pub enable_texel_snapping: bool,
    /// XY inflation applied to the light-space bounds before building the
    /// projection, guarding edge-aligned casters against clipping.
    pub aabb_epsilon: f32,
    /// Reference up axis for the light view. A fallback axis is substituted
    /// when the light direction is parallel to it.
    pub world_up: Vector3<f32>,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            split_lambda: 0.89,
            z_padding: 10.0,
            z_mult: 10.0,
            tight_z: true,
            enable_texel_snapping: true,
            aabb_epsilon: 0.01,
            world_up: vector![0.0, 1.0, 0.0],
        }
    }
}

/// Per-cascade fit result; `projection * view` is the light-space matrix
/// shaders consume.
#[derive(Clone, Copy, Debug)]
pub struct CascadeFit {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub bounds: BoundingShape,
}

/// Cascade boundaries for the practical split scheme.
///
/// Returns `cascade_count + 1` strictly increasing values starting at
/// `near` and ending at `far`. Counts outside `1..=MAX_CASCADES` are
/// clamped. `near` must be positive: the logarithmic term is undefined
/// otherwise, so callers clamp degenerate ranges first.
pub fn compute_cascade_splits(near: f32, far: f32, cascade_count: u32, lambda: f32) -> Vec<f32> {
    debug_assert!(near > 0.0, "cascade splits need a positive near plane");
    debug_assert!(near < far, "cascade splits need near < far");

    let count = cascade_count.clamp(1, MAX_CASCADES as u32) as usize;
    let lambda = lambda.clamp(0.0, 1.0);
    let ratio = far / near;
    let range = far - near;

    let mut splits = Vec::with_capacity(count + 1);
    splits.push(near);
    for i in 1..count {
        let p = i as f32 / count as f32;
        let log_split = near * ratio.powf(p);
        let uniform_split = near + range * p;
        splits.push(lambda * log_split + (1.0 - lambda) * uniform_split);
    }
    splits.push(far);
    splits
}

/// World-space corners of the camera sub-frustum covering
/// `[split_near, split_far]`.
///
/// The first four corners are the near plane, the last four the far plane,
/// both in `(-1,-1) (1,-1) (1,1) (-1,1)` NDC winding. Downstream fitting
/// and the test fixtures rely on this ordering.
///
/// A zero-length range returns the near corners duplicated into the far
/// slots instead of failing on a singular projection.
pub fn frustum_corners_world_space(
    camera: &Camera,
    split_near: f32,
    split_far: f32,
) -> [Point3<f32>; 8] {
    if (split_far - split_near).abs() <= f32::EPSILON {
        let sub_camera = camera.with_depth_range(split_near, split_near + 1.0);
        let mut corners = corners_of(&sub_camera);
        let (near_corners, far_corners) = corners.split_at_mut(4);
        far_corners.copy_from_slice(near_corners);
        return corners;
    }

    corners_of(&camera.with_depth_range(split_near, split_far))
}

fn corners_of(camera: &Camera) -> [Point3<f32>; 8] {
    let view_projection = camera.projection() * camera.view();
    let Some(inverse) = view_projection.try_inverse() else {
        log::warn!("singular view-projection while extracting frustum corners");
        return [camera.location; 8];
    };

    let ndc_corners = [
        vector![-1.0, -1.0, -1.0, 1.0],
        vector![1.0, -1.0, -1.0, 1.0],
        vector![1.0, 1.0, -1.0, 1.0],
        vector![-1.0, 1.0, -1.0, 1.0],
        vector![-1.0, -1.0, 1.0, 1.0],
        vector![1.0, -1.0, 1.0, 1.0],
        vector![1.0, 1.0, 1.0, 1.0],
        vector![-1.0, 1.0, 1.0, 1.0],
    ];

    let mut corners = [Point3::origin(); 8];
    for (corner, ndc) in corners.iter_mut().zip(ndc_corners) {
        let world = inverse * ndc;
        *corner = Point3::from(world.xyz() / world.w);
    }
    corners
}

pub fn frustum_center(corners: &[Point3<f32>; 8]) -> Point3<f32> {
    let mut center = Vector3::zeros();
    for corner in corners {
        center += corner.coords;
    }
    Point3::from(center / corners.len() as f32)
}

fn bounding_radius(corners: &[Point3<f32>; 8], center: &Point3<f32>) -> f32 {
    corners
        .iter()
        .map(|corner| (corner - center).norm())
        .fold(0.0f32, f32::max)
}

/// Light view matrix looking through the frustum centroid along
/// `light_direction`.
///
/// The virtual eye backs off by twice the corner set's bounding radius,
/// which keeps light-space coordinates small enough for f32 while placing
/// every corner in front of the eye. If `world_up` is (near) parallel to
/// the light direction a fallback axis keeps the basis orthonormal.
pub fn build_light_view(
    light_direction: &Vector3<f32>,
    corners: &[Point3<f32>; 8],
    world_up: &Vector3<f32>,
) -> Matrix4<f32> {
    let direction = if light_direction.norm() > SMALL_NUMBER {
        light_direction.normalize()
    } else {
        log::warn!("zero-length light direction, substituting straight down");
        vector![0.0, -1.0, 0.0]
    };

    let up = if direction.dot(world_up).abs() < 1.0 - SMALL_NUMBER {
        *world_up
    } else if direction.z.abs() < 1.0 - SMALL_NUMBER {
        vector![0.0, 0.0, 1.0]
    } else {
        vector![0.0, 1.0, 0.0]
    };

    let center = frustum_center(corners);
    let radius = bounding_radius(corners, &center);
    let eye = center - direction * (radius * 2.0).max(1.0);
    Matrix4::look_at_rh(&eye, &center, &up)
}

/// Componentwise extremes of the corners in light view space.
pub fn light_space_bounds(
    corners: &[Point3<f32>; 8],
    light_view: &Matrix4<f32>,
) -> (Point3<f32>, Point3<f32>) {
    BoundingShape::bounding_box_from_points(
        corners.iter().map(|corner| light_view.transform_point(corner)),
    )
    .box_extremes()
}

/// Orthographic projection over the light-space bounds of `corners`.
///
/// XY spans the bounds inflated by `aabb_epsilon`. The depth range is
/// either the tight corner range padded by `z_padding`, or the stabilized
/// range `centroid ± radius * z_mult`, which stays constant while casters
/// move through the cascade at the cost of bias precision.
pub fn build_cascade_projection(
    corners: &[Point3<f32>; 8],
    light_view: &Matrix4<f32>,
    settings: &CascadeSettings,
) -> Matrix4<f32> {
    let (mut min, mut max) = light_space_bounds(corners, light_view);
    min.x -= settings.aabb_epsilon;
    min.y -= settings.aabb_epsilon;
    max.x += settings.aabb_epsilon;
    max.y += settings.aabb_epsilon;

    let (z_min, z_max) = if settings.tight_z {
        (min.z - settings.z_padding, max.z + settings.z_padding)
    } else {
        let center = frustum_center(corners);
        let radius = bounding_radius(corners, &center);
        let center_z = light_view.transform_point(&center).z;
        (
            center_z - radius * settings.z_mult - settings.z_padding,
            center_z + radius * settings.z_mult + settings.z_padding,
        )
    };

    // The light view looks down -Z, so the closest plane sits at z_max.
    Matrix4::new_orthographic(min.x, max.x, min.y, max.y, -z_max, -z_min)
}

/// Shifts the projection so the given world-space point lands on an exact
/// shadow-map texel boundary.
///
/// Sub-texel drift of the light frustum between frames shows up as edge
/// shimmer; rounding the projected centroid to the texel grid makes the
/// frustum translate in whole-texel steps only. Snapping an
/// already-snapped projection with the same centroid is a no-op.
pub fn apply_texel_snapping(
    light_view: &Matrix4<f32>,
    light_projection: &Matrix4<f32>,
    center: &Point3<f32>,
    resolution: u32,
) -> Matrix4<f32> {
    if resolution == 0 {
        return *light_projection;
    }

    let view_projection = light_projection * light_view;
    let projected = view_projection.transform_point(center);

    // One texel in NDC units
    let texel_size = 2.0 / resolution as f32;
    let snapped_x = (projected.x / texel_size).round() * texel_size;
    let snapped_y = (projected.y / texel_size).round() * texel_size;

    let mut snapped = *light_projection;
    snapped[(0, 3)] += snapped_x - projected.x;
    snapped[(1, 3)] += snapped_y - projected.y;
    snapped
}

/// Full fit for one cascade: corner extraction, light view, projection and
/// optional texel snapping.
pub fn fit_cascade(
    camera: &Camera,
    light_direction: &Vector3<f32>,
    split_near: f32,
    split_far: f32,
    resolution: u32,
    settings: &CascadeSettings,
) -> CascadeFit {
    let corners = frustum_corners_world_space(camera, split_near, split_far);
    let view = build_light_view(light_direction, &corners, &settings.world_up);
    let mut projection = build_cascade_projection(&corners, &view, settings);

    let center = frustum_center(&corners);
    if settings.enable_texel_snapping {
        projection = apply_texel_snapping(&view, &projection, &center, resolution);
    }

    CascadeFit {
        view,
        projection,
        bounds: BoundingShape::Sphere {
            origin: center,
            radius: bounding_radius(&corners, &center),
        },
    }
}

/// The combined light-space matrix for one cascade.
pub fn calculate_directional_light_matrix(
    camera: &Camera,
    light_direction: &Vector3<f32>,
    split_near: f32,
    split_far: f32,
    resolution: u32,
    settings: &CascadeSettings,
) -> Matrix4<f32> {
    let fit = fit_cascade(
        camera,
        light_direction,
        split_near,
        split_far,
        resolution,
        settings,
    );
    fit.projection * fit.view
}
