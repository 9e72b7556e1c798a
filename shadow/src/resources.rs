use anyhow::Context;
use gpu::{
    AttachmentStoreOp, BeginRenderPassInfo, BufferCreateInfo, BufferHandle, BufferUsageFlags,
    CommandBuffer, CompareOp, ComponentMapping, CullMode, DepthLoadOp, Extent2D, Filter,
    FramebufferDepthAttachment, FrontFace, Gpu, GraphicsPipelineCreateInfo, ImageAspectFlags,
    ImageCreateInfo, ImageFormat, ImageHandle, ImageLayout, ImageSubresourceRange, ImageUsageFlags,
    ImageViewCreateInfo, ImageViewHandle, ImageViewType, MemoryDomain, PipelineHandle, Rect2D,
    SampleCount, SamplerAddressMode, SamplerCreateInfo, SamplerHandle, ShaderModuleCreateInfo,
    ShaderModuleHandle, VertexAttributeFormat, VertexInputDescription, Viewport,
};

use crate::{DirectionalLightShadow, ShadowConfig, ShadowUbo};

pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

// Positions drive the depth pass; the other attributes only keep the input
// layout compatible with the scene vertex buffers.
const SHADOW_VERTEX_LAYOUT: [VertexInputDescription; 3] = [
    VertexInputDescription {
        location: 0,
        offset: 0,
        stride: 12,
        format: VertexAttributeFormat::Float3,
    },
    VertexInputDescription {
        location: 1,
        offset: 0,
        stride: 12,
        format: VertexAttributeFormat::Float3,
    },
    VertexInputDescription {
        location: 2,
        offset: 0,
        stride: 8,
        format: VertexAttributeFormat::Float2,
    },
];

struct ShadowResources {
    depth_image: ImageHandle,
    array_view: ImageViewHandle,
    layer_views: Vec<ImageViewHandle>,
    sampler: SamplerHandle,
    ubo_ring: Vec<BufferHandle>,
    vertex_shader: ShaderModuleHandle,
    pipeline: PipelineHandle,
}

#[derive(Default)]
struct PartialResources {
    depth_image: Option<ImageHandle>,
    array_view: Option<ImageViewHandle>,
    layer_views: Vec<ImageViewHandle>,
    sampler: Option<SamplerHandle>,
    ubo_ring: Vec<BufferHandle>,
    vertex_shader: Option<ShaderModuleHandle>,
    pipeline: Option<PipelineHandle>,
}

impl PartialResources {
    /// Reverse-order release of whatever was created before a failure.
    fn release(self, gpu: &dyn Gpu) {
        if let Some(pipeline) = self.pipeline {
            if let Err(error) = gpu.destroy_graphics_pipeline(pipeline) {
                log::error!("rollback failed to destroy pipeline: {error:#}");
            }
        }
        if let Some(module) = self.vertex_shader {
            if let Err(error) = gpu.destroy_shader_module(module) {
                log::error!("rollback failed to destroy shader module: {error:#}");
            }
        }
        for buffer in self.ubo_ring.into_iter().rev() {
            if let Err(error) = gpu.destroy_buffer(buffer) {
                log::error!("rollback failed to destroy uniform buffer: {error:#}");
            }
        }
        if let Some(sampler) = self.sampler {
            if let Err(error) = gpu.destroy_sampler(sampler) {
                log::error!("rollback failed to destroy sampler: {error:#}");
            }
        }
        for view in self.layer_views.into_iter().rev() {
            if let Err(error) = gpu.destroy_image_view(view) {
                log::error!("rollback failed to destroy layer view: {error:#}");
            }
        }
        if let Some(view) = self.array_view {
            if let Err(error) = gpu.destroy_image_view(view) {
                log::error!("rollback failed to destroy array view: {error:#}");
            }
        }
        if let Some(image) = self.depth_image {
            if let Err(error) = gpu.destroy_image(image) {
                log::error!("rollback failed to destroy depth array: {error:#}");
            }
        }
    }

    fn into_resources(self) -> Option<ShadowResources> {
        Some(ShadowResources {
            depth_image: self.depth_image?,
            array_view: self.array_view?,
            layer_views: self.layer_views,
            sampler: self.sampler?,
            ubo_ring: self.ubo_ring,
            vertex_shader: self.vertex_shader?,
            pipeline: self.pipeline?,
        })
    }
}

/// Owns every GPU resource of the cascaded shadow path: the depth array
/// (one layer per cascade), its per-layer render-target views, the full
/// array view and comparison sampler the shading pass binds, the uniform
/// buffer ring and the depth-only pipeline.
///
/// `initialize` either fully succeeds or rolls back every resource it
/// already created; `shutdown` releases everything in reverse creation
/// order and may be called any number of times.
pub struct ShadowResourceManager {
    config: ShadowConfig,
    frames_in_flight: usize,
    cur_frame: usize,
    open_cascade: Option<u32>,
    resources: Option<ShadowResources>,
}

impl ShadowResourceManager {
    pub fn new(config: ShadowConfig, frames_in_flight: usize) -> Self {
        Self {
            config: config.validated(),
            frames_in_flight: frames_in_flight.max(1),
            cur_frame: 0,
            open_cascade: None,
            resources: None,
        }
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    /// Index of the cascade currently being rendered, if a pass is open.
    pub fn open_cascade(&self) -> Option<u32> {
        self.open_cascade
    }

    /// Full-array view for the shading pass to sample.
    pub fn shadow_map_view(&self) -> Option<ImageViewHandle> {
        self.resources.as_ref().map(|resources| resources.array_view)
    }

    pub fn shadow_sampler(&self) -> Option<SamplerHandle> {
        self.resources.as_ref().map(|resources| resources.sampler)
    }

    /// The uniform buffer this frame's commands should bind.
    pub fn current_ubo(&self) -> Option<BufferHandle> {
        self.resources
            .as_ref()
            .map(|resources| resources.ubo_ring[self.cur_frame])
    }

    pub fn initialize(
        &mut self,
        gpu: &dyn Gpu,
        depth_only_vertex_shader: &[u32],
    ) -> anyhow::Result<()> {
        if self.resources.is_some() {
            log::warn!("shadow resources already initialized");
            return Ok(());
        }

        let mut partial = PartialResources::default();
        if let Err(error) = self.create_resources(gpu, depth_only_vertex_shader, &mut partial) {
            partial.release(gpu);
            return Err(error);
        }
        match partial.into_resources() {
            Some(resources) => {
                self.resources = Some(resources);
                self.cur_frame = 0;
                log::info!(
                    "shadow resources initialized: {} cascades at {}x{}",
                    self.config.cascade_count,
                    self.config.shadow_map_size,
                    self.config.shadow_map_size
                );
                Ok(())
            }
            None => anyhow::bail!("shadow resource creation finished with missing resources"),
        }
    }

    fn create_resources(
        &self,
        gpu: &dyn Gpu,
        depth_only_vertex_shader: &[u32],
        out: &mut PartialResources,
    ) -> anyhow::Result<()> {
        let size = self.config.shadow_map_size;
        let cascade_count = self.config.cascade_count;

        let depth_image = gpu
            .make_image(
                &ImageCreateInfo {
                    label: Some("Shadow Cascade Array"),
                    width: size,
                    height: size,
                    depth: 1,
                    mips: 1,
                    layers: cascade_count,
                    samples: SampleCount::Sample1,
                    format: ImageFormat::Depth,
                    usage: ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | ImageUsageFlags::SAMPLED,
                },
                MemoryDomain::DeviceLocal,
                None,
            )
            .context("shadow cascade depth array")?;
        out.depth_image = Some(depth_image);

        out.array_view = Some(
            gpu.make_image_view(&ImageViewCreateInfo {
                image: depth_image,
                view_type: ImageViewType::Type2DArray,
                format: ImageFormat::Depth,
                components: ComponentMapping::default(),
                subresource_range: ImageSubresourceRange {
                    aspect_mask: ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: cascade_count,
                },
            })
            .context("shadow cascade array view")?,
        );

        for layer in 0..cascade_count {
            let view = gpu
                .make_image_view(&ImageViewCreateInfo {
                    image: depth_image,
                    view_type: ImageViewType::Type2D,
                    format: ImageFormat::Depth,
                    components: ComponentMapping::default(),
                    subresource_range: ImageSubresourceRange {
                        aspect_mask: ImageAspectFlags::DEPTH,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: layer,
                        layer_count: 1,
                    },
                })
                .with_context(|| format!("shadow cascade layer view #{layer}"))?;
            out.layer_views.push(view);
        }

        // Sampling outside the map must read "far", never shadowed
        out.sampler = Some(
            gpu.make_sampler(&SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                address_u: SamplerAddressMode::ClampToBorder,
                address_v: SamplerAddressMode::ClampToBorder,
                address_w: SamplerAddressMode::ClampToBorder,
                mip_lod_bias: 0.0,
                compare_function: Some(CompareOp::LessEqual),
                min_lod: 0.0,
                max_lod: 1.0,
                border_color: [1.0; 4],
            })
            .context("shadow comparison sampler")?,
        );

        for i in 0..self.frames_in_flight {
            let buffer = gpu
                .make_buffer(
                    &BufferCreateInfo {
                        label: Some(&format!("Shadow Parameters #{}", i)),
                        size: std::mem::size_of::<ShadowUbo>(),
                        usage: BufferUsageFlags::UNIFORM_BUFFER | BufferUsageFlags::TRANSFER_DST,
                    },
                    MemoryDomain::HostVisible | MemoryDomain::HostCoherent,
                )
                .with_context(|| format!("shadow uniform buffer #{i}"))?;
            out.ubo_ring.push(buffer);
        }

        let vertex_shader = gpu
            .make_shader_module(&ShaderModuleCreateInfo {
                code: depth_only_vertex_shader,
            })
            .context("depth-only vertex shader")?;
        out.vertex_shader = Some(vertex_shader);

        // Front-face culling keeps back faces in the map, which hides most
        // peter-panning caused by the depth bias.
        out.pipeline = Some(
            gpu.make_graphics_pipeline(&GraphicsPipelineCreateInfo {
                label: Some("Shadow Cascade Emit"),
                vertex_shader,
                fragment_shader: None,
                vertex_inputs: &SHADOW_VERTEX_LAYOUT,
                cull_mode: CullMode::Front,
                front_face: FrontFace::CounterClockWise,
                depth_test_enabled: true,
                depth_write_enabled: true,
                depth_compare_op: CompareOp::LessEqual,
                color_output_enabled: false,
            })
            .context("shadow cascade pipeline")?,
        );

        Ok(())
    }

    /// Releases everything in reverse creation order. A no-op when nothing
    /// is initialized.
    pub fn shutdown(&mut self, gpu: &dyn Gpu) {
        let Some(resources) = self.resources.take() else {
            return;
        };
        if self.open_cascade.take().is_some() {
            log::warn!("shutting down shadow resources with a cascade pass still open");
        }

        if let Err(error) = gpu.destroy_graphics_pipeline(resources.pipeline) {
            log::error!("failed to destroy shadow pipeline: {error:#}");
        }
        if let Err(error) = gpu.destroy_shader_module(resources.vertex_shader) {
            log::error!("failed to destroy shadow vertex shader: {error:#}");
        }
        for buffer in resources.ubo_ring.into_iter().rev() {
            if let Err(error) = gpu.destroy_buffer(buffer) {
                log::error!("failed to destroy shadow uniform buffer: {error:#}");
            }
        }
        if let Err(error) = gpu.destroy_sampler(resources.sampler) {
            log::error!("failed to destroy shadow sampler: {error:#}");
        }
        for view in resources.layer_views.into_iter().rev() {
            if let Err(error) = gpu.destroy_image_view(view) {
                log::error!("failed to destroy shadow layer view: {error:#}");
            }
        }
        if let Err(error) = gpu.destroy_image_view(resources.array_view) {
            log::error!("failed to destroy shadow array view: {error:#}");
        }
        if let Err(error) = gpu.destroy_image(resources.depth_image) {
            log::error!("failed to destroy shadow depth array: {error:#}");
        }

        self.cur_frame = 0;
        log::info!("shadow resources released");
    }

    /// Opens the depth pass rendering into one cascade layer: clears depth
    /// to far, binds the depth-only pipeline and programs viewport, scissor
    /// and depth bias. Invalid requests are logged and skipped.
    pub fn begin_cascade_pass(
        &mut self,
        cmd: &mut dyn CommandBuffer,
        cascade_index: u32,
    ) -> anyhow::Result<()> {
        let Some(resources) = &self.resources else {
            log::warn!("begin_cascade_pass called before initialization");
            return Ok(());
        };
        if cascade_index >= self.config.cascade_count {
            log::warn!(
                "cascade index {} out of range ({} cascades)",
                cascade_index,
                self.config.cascade_count
            );
            return Ok(());
        }
        if let Some(open) = self.open_cascade {
            log::warn!("cascade {} is still open, ignoring begin", open);
            return Ok(());
        }

        let size = self.config.shadow_map_size;
        let full_area = Rect2D {
            offset: Default::default(),
            extent: Extent2D {
                width: size,
                height: size,
            },
        };

        cmd.begin_render_pass(&BeginRenderPassInfo {
            label: Some("Shadow Cascade Emit"),
            color_attachments: &[],
            depth_attachment: Some(FramebufferDepthAttachment {
                image_view: resources.layer_views[cascade_index as usize],
                load_op: DepthLoadOp::Clear(1.0),
                store_op: AttachmentStoreOp::Store,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::ShaderReadOnly,
            }),
            render_area: full_area,
        })
        .with_context(|| format!("begin depth pass for cascade {cascade_index}"))?;

        cmd.bind_pipeline(&resources.pipeline);
        cmd.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: size as f32,
            height: size as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(full_area);
        cmd.set_depth_bias(
            self.config.depth_bias_constant,
            self.config.depth_bias_slope,
        );

        self.open_cascade = Some(cascade_index);
        Ok(())
    }

    /// Closes the open cascade pass. Ending the pass transitions that one
    /// layer to its shader-readable state; other layers are unaffected.
    pub fn end_cascade_pass(&mut self, cmd: &mut dyn CommandBuffer) -> anyhow::Result<()> {
        if self.open_cascade.take().is_none() {
            log::warn!("end_cascade_pass without a matching begin");
            return Ok(());
        }
        cmd.end_render_pass().context("end cascade depth pass")
    }

    /// Uploads this frame's cascade matrices and parameters into the
    /// current ring buffer. Call [`ShadowResourceManager::advance_frame`]
    /// once the frame's commands are submitted so the next frame writes a
    /// buffer no in-flight commands can still be reading.
    pub fn update_ubo(
        &mut self,
        gpu: &dyn Gpu,
        shadow: &DirectionalLightShadow,
    ) -> anyhow::Result<()> {
        let Some(resources) = &self.resources else {
            log::warn!("update_ubo called before initialization");
            return Ok(());
        };
        let ubo = ShadowUbo::from_shadow_data(shadow, &self.config);
        gpu.write_buffer(
            &resources.ubo_ring[self.cur_frame],
            0,
            bytemuck::bytes_of(&ubo),
        )
        .context("upload shadow parameters")
    }

    pub fn advance_frame(&mut self) {
        self.cur_frame = (self.cur_frame + 1) % self.frames_in_flight;
    }

    /// Applies a new configuration.
    ///
    /// The depth array does not support partial resizes: when the map size
    /// or cascade count changes, the whole resource set is destroyed and
    /// recreated. Other tuning values just replace the stored config.
    pub fn reconfigure(
        &mut self,
        gpu: &dyn Gpu,
        config: ShadowConfig,
        depth_only_vertex_shader: &[u32],
    ) -> anyhow::Result<()> {
        let config = config.validated();
        let needs_recreate = self.resources.is_some()
            && (config.shadow_map_size != self.config.shadow_map_size
                || config.cascade_count != self.config.cascade_count);

        self.config = config;
        if needs_recreate {
            log::info!(
                "shadow map layout changed, recreating resources for {} cascades at {}",
                config.cascade_count,
                config.shadow_map_size
            );
            self.shutdown(gpu);
            self.initialize(gpu, depth_only_vertex_shader)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gpu::dummy::{CommandEvent, DummyGpu, ResourceKind};
    use gpu::QueueType;

    use super::*;

    const TEST_SHADER: [u32; 4] = [0x0723_0203, 1, 2, 3];

    fn test_manager() -> ShadowResourceManager {
        let _ = env_logger::builder().is_test(true).try_init();
        ShadowResourceManager::new(ShadowConfig::default(), DEFAULT_FRAMES_IN_FLIGHT)
    }

    // image + array view + 4 layer views + sampler + 2 ubos + shader + pipeline
    const EXPECTED_ALLOCATIONS: u32 = 11;

    #[test]
    fn initialize_creates_the_full_resource_set() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();

        manager.initialize(&gpu, &TEST_SHADER).unwrap();
        assert!(manager.is_initialized());

        assert_eq!(gpu.live_count(ResourceKind::Image), 1);
        assert_eq!(gpu.live_count(ResourceKind::ImageView), 5);
        assert_eq!(gpu.live_count(ResourceKind::Sampler), 1);
        assert_eq!(
            gpu.live_count(ResourceKind::Buffer),
            DEFAULT_FRAMES_IN_FLIGHT
        );
        assert_eq!(gpu.live_count(ResourceKind::ShaderModule), 1);
        assert_eq!(gpu.live_count(ResourceKind::Pipeline), 1);

        let array_view = manager.shadow_map_view().unwrap();
        assert_eq!(gpu.view_layer_range(&array_view), Some((0, 4)));
        assert!(manager.shadow_sampler().is_some());
        assert!(manager.current_ubo().is_some());
    }

    #[test]
    fn comparison_sampler_never_shadows_outside_the_map() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();
        manager.initialize(&gpu, &TEST_SHADER).unwrap();

        let sampler = manager.shadow_sampler().unwrap();
        let info = gpu.sampler_info(&sampler).unwrap();
        assert_eq!(info.compare_function, Some(CompareOp::LessEqual));
        assert_eq!(info.address_u, SamplerAddressMode::ClampToBorder);
        assert_eq!(info.address_v, SamplerAddressMode::ClampToBorder);
        // Border reads as maximum depth, so lookups past the edge pass the
        // comparison and stay lit
        assert_eq!(info.border_color, [1.0; 4]);
        assert_eq!(info.mag_filter, Filter::Linear);
    }

    #[test]
    fn shadow_pipeline_is_depth_only_with_front_culling() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();
        manager.initialize(&gpu, &TEST_SHADER).unwrap();

        let mut cmd = gpu.start_command_buffer(QueueType::Graphics).unwrap();
        manager.begin_cascade_pass(cmd.as_mut(), 0).unwrap();

        let pipeline = gpu
            .events()
            .iter()
            .find_map(|event| match event {
                CommandEvent::BindPipeline(pipeline) => Some(*pipeline),
                _ => None,
            })
            .expect("pipeline bound");
        let info = gpu.pipeline_info(&pipeline).unwrap();
        assert!(info.depth_only);
        assert_eq!(info.cull_mode, gpu::CullMode::Front);
    }

    #[test]
    fn double_initialize_is_a_warned_no_op() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();

        manager.initialize(&gpu, &TEST_SHADER).unwrap();
        manager.initialize(&gpu, &TEST_SHADER).unwrap();
        assert_eq!(gpu.live_total(), EXPECTED_ALLOCATIONS as usize);
    }

    #[test]
    fn shutdown_releases_everything_and_is_idempotent() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();

        manager.initialize(&gpu, &TEST_SHADER).unwrap();
        manager.shutdown(&gpu);
        assert!(!manager.is_initialized());
        assert_eq!(gpu.live_total(), 0);

        // A second shutdown must not touch the device again
        manager.shutdown(&gpu);
        assert_eq!(gpu.live_total(), 0);
    }

    #[test]
    fn failed_initialize_rolls_back_every_resource() {
        for allowed in 0..EXPECTED_ALLOCATIONS {
            let gpu = DummyGpu::new();
            let mut manager = test_manager();
            gpu.fail_after(allowed);

            let result = manager.initialize(&gpu, &TEST_SHADER);
            assert!(result.is_err(), "allocation #{allowed} should have failed");
            assert!(!manager.is_initialized());
            assert_eq!(
                gpu.live_total(),
                0,
                "rollback leaked resources when failing after {allowed} allocations"
            );
        }
    }

    #[test]
    fn empty_shader_blob_fails_initialize() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();

        assert!(manager.initialize(&gpu, &[]).is_err());
        assert_eq!(gpu.live_total(), 0);
    }

    #[test]
    fn cascade_pass_brackets_one_layer() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();
        manager.initialize(&gpu, &TEST_SHADER).unwrap();
        gpu.clear_events();

        let mut cmd = gpu.start_command_buffer(QueueType::Graphics).unwrap();
        manager.begin_cascade_pass(cmd.as_mut(), 2).unwrap();
        assert_eq!(manager.open_cascade(), Some(2));
        manager.end_cascade_pass(cmd.as_mut()).unwrap();
        assert_eq!(manager.open_cascade(), None);

        let events = gpu.events();
        let CommandEvent::BeginRenderPass {
            depth_view: Some(view),
            clear_depth,
            ..
        } = &events[0]
        else {
            panic!("expected a render pass begin, got {:?}", events[0]);
        };
        // The pass must target exactly the third array layer, cleared to far
        assert_eq!(gpu.view_layer_range(view), Some((2, 1)));
        assert_eq!(*clear_depth, Some(1.0));

        assert!(matches!(
            events[events.len() - 1],
            CommandEvent::EndRenderPass {
                depth_final_layout: Some(gpu::ImageLayout::ShaderReadOnly),
                ..
            }
        ));
        assert!(events.iter().any(|event| matches!(
            event,
            CommandEvent::SetDepthBias {
                constant,
                slope,
            } if *constant == 1.25 && *slope == 1.75
        )));
    }

    #[test]
    fn invalid_pass_requests_are_no_ops() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();
        manager.initialize(&gpu, &TEST_SHADER).unwrap();
        gpu.clear_events();

        let mut cmd = gpu.start_command_buffer(QueueType::Graphics).unwrap();

        // Out-of-range cascade
        manager.begin_cascade_pass(cmd.as_mut(), 7).unwrap();
        assert!(gpu.events().is_empty());

        // End without begin
        manager.end_cascade_pass(cmd.as_mut()).unwrap();
        assert!(gpu.events().is_empty());

        // Begin while another cascade is open
        manager.begin_cascade_pass(cmd.as_mut(), 0).unwrap();
        let events_after_first = gpu.events().len();
        manager.begin_cascade_pass(cmd.as_mut(), 1).unwrap();
        assert_eq!(gpu.events().len(), events_after_first);
        assert_eq!(manager.open_cascade(), Some(0));
    }

    #[test]
    fn ubo_ring_rotates_between_frames() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();
        manager.initialize(&gpu, &TEST_SHADER).unwrap();

        let shadow = DirectionalLightShadow {
            active_cascade_count: 4,
            ..Default::default()
        };
        let expected = ShadowUbo::from_shadow_data(&shadow, manager.config());

        let first_buffer = manager.current_ubo().unwrap();
        manager.update_ubo(&gpu, &shadow).unwrap();
        assert_eq!(
            gpu.buffer_contents(&first_buffer).unwrap(),
            bytemuck::bytes_of(&expected)
        );

        manager.advance_frame();
        let second_buffer = manager.current_ubo().unwrap();
        assert_ne!(first_buffer, second_buffer);

        // The ring wraps back around after frames_in_flight frames
        manager.advance_frame();
        assert_eq!(manager.current_ubo().unwrap(), first_buffer);
    }

    #[test]
    fn reconfigure_recreates_only_on_layout_changes() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();
        manager.initialize(&gpu, &TEST_SHADER).unwrap();
        let first_view = manager.shadow_map_view().unwrap();

        // Bias tuning keeps the existing resources
        let mut config = *manager.config();
        config.depth_bias_constant = 3.0;
        manager.reconfigure(&gpu, config, &TEST_SHADER).unwrap();
        assert_eq!(manager.shadow_map_view().unwrap(), first_view);
        assert_eq!(manager.config().depth_bias_constant, 3.0);

        // A resolution change rebuilds the whole set, nothing leaks
        config.shadow_map_size = 4096;
        manager.reconfigure(&gpu, config, &TEST_SHADER).unwrap();
        assert_ne!(manager.shadow_map_view().unwrap(), first_view);
        assert_eq!(gpu.live_total(), EXPECTED_ALLOCATIONS as usize);

        // Fewer cascades means fewer layer views
        config.cascade_count = 2;
        manager.reconfigure(&gpu, config, &TEST_SHADER).unwrap();
        assert_eq!(gpu.live_count(ResourceKind::ImageView), 3);
        let array_view = manager.shadow_map_view().unwrap();
        assert_eq!(gpu.view_layer_range(&array_view), Some((0, 2)));
    }

    #[test]
    fn operations_before_initialize_are_no_ops() {
        let gpu = DummyGpu::new();
        let mut manager = test_manager();

        let shadow = DirectionalLightShadow::default();
        manager.update_ubo(&gpu, &shadow).unwrap();

        let mut cmd = gpu.start_command_buffer(QueueType::Graphics).unwrap();
        manager.begin_cascade_pass(cmd.as_mut(), 0).unwrap();
        assert!(gpu.events().is_empty());
    }
}
