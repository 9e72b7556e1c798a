use nalgebra::{vector, Matrix4, Point3, Vector3};

use crate::{compute_cascade_splits, SMALL_NUMBER};

#[derive(Clone, Copy)]
pub enum CameraMode {
    Perspective { fov_degrees: f32 },
    Orthographic,
}

#[derive(Clone, Copy)]
pub struct Camera {
    pub location: Point3<f32>,
    pub forward: Vector3<f32>,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,

    pub mode: CameraMode,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            location: Default::default(),
            forward: vector![0.0, 0.0, 1.0],
            width: 1240.0,
            height: 720.0,
            near: 0.1,
            far: 100.0,
            mode: CameraMode::Perspective { fov_degrees: 45.0 },
        }
    }
}

impl Camera {
    pub fn new_perspective(fov_degrees: f32, width: f32, height: f32, near: f32, far: f32) -> Self {
        Self {
            mode: CameraMode::Perspective { fov_degrees },
            width,
            height,
            near,
            far,
            ..Default::default()
        }
    }

    pub fn new_orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        Self {
            mode: CameraMode::Orthographic,
            width,
            height,
            near,
            far,
            ..Default::default()
        }
    }

    /// Same camera restricted to the `[near, far]` depth sub-range.
    pub fn with_depth_range(&self, near: f32, far: f32) -> Self {
        Self {
            near,
            far,
            ..*self
        }
    }

    pub fn view(&self) -> Matrix4<f32> {
        let up = if self.forward.y >= 1.0 - SMALL_NUMBER {
            vector![0.0, 0.0, 1.0]
        } else if self.forward.y <= -1.0 + SMALL_NUMBER {
            vector![0.0, 0.0, -1.0]
        } else {
            vector![0.0, 1.0, 0.0]
        };
        Matrix4::look_at_rh(&self.location, &(self.location + self.forward), &up)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection() * self.view()
    }

    pub fn projection(&self) -> Matrix4<f32> {
        match self.mode {
            CameraMode::Perspective { fov_degrees } => Matrix4::new_perspective(
                self.width / self.height,
                fov_degrees.to_radians(),
                self.near,
                self.far,
            ),
            CameraMode::Orthographic => Matrix4::new_orthographic(
                -self.width * 0.5,
                self.width * 0.5,
                -self.height * 0.5,
                self.height * 0.5,
                self.near,
                self.far,
            ),
        }
    }

    /// Splits the depth range into `num_slices` sub-cameras along the
    /// practical split scheme. `lambda` blends uniform (0) and logarithmic
    /// (1) spacing.
    pub fn split_into_slices(&self, num_slices: u8, lambda: f32) -> Vec<Camera> {
        let splits = compute_cascade_splits(self.near, self.far, num_slices as u32, lambda);
        splits
            .windows(2)
            .map(|range| self.with_depth_range(range[0], range[1]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::Camera;

    #[test]
    fn slices_cover_the_full_depth_range() {
        let camera = Camera::new_perspective(90.0, 1.0, 1.0, 0.1, 1000.0);

        let slices = camera.split_into_slices(4, 0.5);
        assert_eq!(slices.len(), 4);
        assert_abs_diff_eq!(slices[0].near, camera.near);
        assert_abs_diff_eq!(slices[3].far, camera.far);
        for pair in slices.windows(2) {
            assert_abs_diff_eq!(pair[0].far, pair[1].near);
            assert!(pair[0].near < pair[0].far);
        }
    }

    #[test]
    fn straight_down_camera_still_builds_a_view() {
        let mut camera = Camera::default();
        camera.forward = nalgebra::vector![0.0, -1.0, 0.0];

        let view = camera.view();
        assert!(view.iter().all(|value| value.is_finite()));
    }
}
