use gpu::{CommandBuffer, Gpu};
use nalgebra::vector;

use crate::{
    compute_cascade_splits, fit_cascade, Camera, CascadeSettings, DirectionalLight,
    DirectionalLightShadow, ShadowCascade, ShadowConfig, ShadowResourceManager, MAX_CASCADES,
    SMALL_NUMBER,
};

/// Smallest near plane fed into the split planner; the logarithmic term is
/// undefined at zero.
const MIN_SHADOW_NEAR: f32 = 0.01;
/// Depth range substituted when the clamped camera range collapses.
const FALLBACK_SHADOW_RANGE: f32 = 100.0;

/// Per-frame orchestrator for directional cascaded shadows.
///
/// Composes the pure cascade math with the resource manager: computes the
/// cascade set from the current camera and light, uploads the uniform
/// buffer and brackets the per-cascade depth passes. Cascades are encoded
/// strictly sequentially; the shading pass that samples the array must be
/// recorded after the last cascade closed.
///
/// A failed [`ShadowMapManager::initialize`] disables the manager instead
/// of failing the renderer: every per-frame entry point turns into a no-op
/// and the frame simply renders without shadows.
pub struct ShadowMapManager {
    resources: ShadowResourceManager,
    settings: CascadeSettings,
    enabled: bool,
}

impl ShadowMapManager {
    pub fn new(config: ShadowConfig, settings: CascadeSettings, frames_in_flight: usize) -> Self {
        Self {
            resources: ShadowResourceManager::new(config, frames_in_flight),
            settings,
            enabled: false,
        }
    }

    /// Creates the GPU resources. Returns whether shadows are available;
    /// on failure the cause is logged and the manager stays disabled.
    pub fn initialize(&mut self, gpu: &dyn Gpu, depth_only_vertex_shader: &[u32]) -> bool {
        match self.resources.initialize(gpu, depth_only_vertex_shader) {
            Ok(()) => {
                self.enabled = true;
                true
            }
            Err(error) => {
                log::error!("shadow map initialization failed, shadows disabled: {error:#}");
                self.enabled = false;
                false
            }
        }
    }

    pub fn shutdown(&mut self, gpu: &dyn Gpu) {
        self.resources.shutdown(gpu);
        self.enabled = false;
    }

    /// Applies a new configuration, recreating the depth array when its
    /// layout (size or cascade count) changed. Returns whether shadows are
    /// still available; a failed recreation disables the manager.
    pub fn reconfigure(
        &mut self,
        gpu: &dyn Gpu,
        config: ShadowConfig,
        depth_only_vertex_shader: &[u32],
    ) -> bool {
        match self
            .resources
            .reconfigure(gpu, config, depth_only_vertex_shader)
        {
            Ok(()) => self.enabled,
            Err(error) => {
                log::error!("shadow map reconfiguration failed, shadows disabled: {error:#}");
                self.enabled = false;
                false
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    pub fn resources(&self) -> &ShadowResourceManager {
        &self.resources
    }

    /// Index of the cascade currently being rendered, if any.
    pub fn current_cascade(&self) -> Option<u32> {
        self.resources.open_cascade()
    }

    /// Computes this frame's cascade set from the camera and light.
    ///
    /// The usable depth range is the camera range clamped to the configured
    /// maximum shadow distance; a range that collapses under clamping is
    /// replaced by a default one (degraded quality, never a failure).
    pub fn calculate_directional_light_cascades(
        &self,
        light: &DirectionalLight,
        camera: &Camera,
        shadow_data: &mut DirectionalLightShadow,
    ) {
        let config = self.resources.config();
        let cascade_count = config.cascade_count.min(MAX_CASCADES as u32);

        let direction = if light.direction.norm() > SMALL_NUMBER {
            light.direction.normalize()
        } else {
            log::warn!("zero-length light direction, substituting straight down");
            vector![0.0, -1.0, 0.0]
        };

        let near = camera.near.max(MIN_SHADOW_NEAR);
        let mut far = camera.far.min(config.max_shadow_distance);
        if near >= far {
            log::warn!(
                "degenerate shadow depth range [{near}, {far}], substituting a default range"
            );
            far = near + FALLBACK_SHADOW_RANGE;
        }

        let splits = compute_cascade_splits(near, far, cascade_count, config.split_lambda);
        for i in 0..cascade_count as usize {
            let fit = fit_cascade(
                camera,
                &direction,
                splits[i],
                splits[i + 1],
                config.shadow_map_size,
                &self.settings,
            );
            shadow_data.cascades[i] = ShadowCascade::from_fit(&fit, splits[i + 1]);
        }
        for cascade in shadow_data.cascades[cascade_count as usize..].iter_mut() {
            *cascade = ShadowCascade::default();
        }

        shadow_data.active_cascade_count = cascade_count;
        shadow_data.light_direction = direction;
        shadow_data.shadow_strength = light.shadow_strength.clamp(0.0, 1.0);
    }

    /// Uploads the frame's shadow state into the current uniform buffer.
    /// Must run before the commands reading it are submitted.
    pub fn prepare_frame(
        &mut self,
        gpu: &dyn Gpu,
        shadow_data: &DirectionalLightShadow,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.resources.update_ubo(gpu, shadow_data)
    }

    pub fn begin_cascade(
        &mut self,
        cmd: &mut dyn CommandBuffer,
        cascade_index: u32,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.resources.begin_cascade_pass(cmd, cascade_index)
    }

    pub fn end_cascade(&mut self, cmd: &mut dyn CommandBuffer) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.resources.end_cascade_pass(cmd)
    }

    /// Rotates the uniform buffer ring; call once per frame after the
    /// frame's command buffer is handed to the device.
    pub fn finish_frame(&mut self) {
        if !self.enabled {
            return;
        }
        self.resources.advance_frame();
    }
}
