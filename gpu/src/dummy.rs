//! Headless device backend.
//!
//! Creates no real GPU objects: resources are id entries in tracking maps
//! and recorded commands land in an inspectable event log. Used by tests
//! and tooling that need lifecycle/ordering observability without a
//! graphics driver.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::{Arc, Mutex};

use anyhow::Context;

use crate::{
    BeginRenderPassInfo, BufferCreateInfo, BufferHandle, CommandBuffer, CullMode, DepthLoadOp,
    DeviceError, Extent2D, FramebufferDepthAttachment, FrontFace, GraphicsPipelineCreateInfo, Gpu,
    Handle, ImageCreateInfo, ImageFormat, ImageHandle, ImageLayout, ImageViewCreateInfo,
    ImageViewHandle, MemoryDomain, PipelineHandle, QueueType, Rect2D, SamplerCreateInfo,
    SamplerHandle, ShaderModuleCreateInfo, ShaderModuleHandle, Viewport,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum ResourceKind {
    Buffer,
    Image,
    ImageView,
    Sampler,
    ShaderModule,
    Pipeline,
}

/// One recorded command, in submission order across all command buffers of
/// the device.
#[derive(Clone, PartialEq, Debug)]
pub enum CommandEvent {
    BeginRenderPass {
        label: Option<String>,
        depth_view: Option<ImageViewHandle>,
        clear_depth: Option<f32>,
    },
    EndRenderPass {
        depth_view: Option<ImageViewHandle>,
        depth_final_layout: Option<ImageLayout>,
    },
    BindPipeline(PipelineHandle),
    SetViewport(Viewport),
    SetScissor(Rect2D),
    SetDepthBias {
        constant: f32,
        slope: f32,
    },
    Draw {
        vertices: u32,
        instances: u32,
    },
    DrawIndexed {
        indices: u32,
        instances: u32,
    },
}

#[derive(Clone, Copy, Debug)]
struct ImageInfo {
    width: u32,
    height: u32,
    layers: u32,
    format: ImageFormat,
}

#[derive(Clone, Copy, Debug)]
struct ViewInfo {
    image: ImageHandle,
    base_array_layer: u32,
    layer_count: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct PipelineInfo {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_only: bool,
}

struct DummyState {
    next_id: AtomicU64,
    allocations_left: Mutex<Option<u32>>,
    buffers: Mutex<BTreeMap<u64, Vec<u8>>>,
    images: Mutex<BTreeMap<u64, ImageInfo>>,
    image_views: Mutex<BTreeMap<u64, ViewInfo>>,
    samplers: Mutex<BTreeMap<u64, SamplerCreateInfo>>,
    shader_modules: Mutex<BTreeMap<u64, usize>>,
    pipelines: Mutex<BTreeMap<u64, PipelineInfo>>,
    events: Mutex<Vec<CommandEvent>>,
}

impl Default for DummyState {
    fn default() -> Self {
        Self {
            // ID 0 is the null handle
            next_id: AtomicU64::new(1),
            allocations_left: Mutex::new(None),
            buffers: Mutex::new(BTreeMap::new()),
            images: Mutex::new(BTreeMap::new()),
            image_views: Mutex::new(BTreeMap::new()),
            samplers: Mutex::new(BTreeMap::new()),
            shader_modules: Mutex::new(BTreeMap::new()),
            pipelines: Mutex::new(BTreeMap::new()),
            events: Mutex::new(Vec::new()),
        }
    }
}

#[derive(Default)]
pub struct DummyGpu {
    state: Arc<DummyState>,
}

impl DummyGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every resource creation after the next `remaining` ones fail
    /// with an out-of-memory error.
    pub fn fail_after(&self, remaining: u32) {
        *self.state.allocations_left.lock().unwrap() = Some(remaining);
    }

    pub fn clear_failure(&self) {
        *self.state.allocations_left.lock().unwrap() = None;
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Buffer => self.state.buffers.lock().unwrap().len(),
            ResourceKind::Image => self.state.images.lock().unwrap().len(),
            ResourceKind::ImageView => self.state.image_views.lock().unwrap().len(),
            ResourceKind::Sampler => self.state.samplers.lock().unwrap().len(),
            ResourceKind::ShaderModule => self.state.shader_modules.lock().unwrap().len(),
            ResourceKind::Pipeline => self.state.pipelines.lock().unwrap().len(),
        }
    }

    pub fn live_total(&self) -> usize {
        [
            ResourceKind::Buffer,
            ResourceKind::Image,
            ResourceKind::ImageView,
            ResourceKind::Sampler,
            ResourceKind::ShaderModule,
            ResourceKind::Pipeline,
        ]
        .iter()
        .map(|kind| self.live_count(*kind))
        .sum()
    }

    pub fn buffer_contents(&self, buffer: &BufferHandle) -> Option<Vec<u8>> {
        self.state.buffers.lock().unwrap().get(&buffer.id()).cloned()
    }

    pub fn image_layer_count(&self, image: &ImageHandle) -> Option<u32> {
        self.state
            .images
            .lock()
            .unwrap()
            .get(&image.id())
            .map(|info| info.layers)
    }

    pub fn image_extent(&self, image: &ImageHandle) -> Option<Extent2D> {
        self.state
            .images
            .lock()
            .unwrap()
            .get(&image.id())
            .map(|info| Extent2D {
                width: info.width,
                height: info.height,
            })
    }

    pub fn image_format(&self, image: &ImageHandle) -> Option<ImageFormat> {
        self.state
            .images
            .lock()
            .unwrap()
            .get(&image.id())
            .map(|info| info.format)
    }

    pub fn view_image(&self, view: &ImageViewHandle) -> Option<ImageHandle> {
        self.state
            .image_views
            .lock()
            .unwrap()
            .get(&view.id())
            .map(|info| info.image)
    }

    pub fn sampler_info(&self, sampler: &SamplerHandle) -> Option<SamplerCreateInfo> {
        self.state
            .samplers
            .lock()
            .unwrap()
            .get(&sampler.id())
            .copied()
    }

    pub fn view_layer_range(&self, view: &ImageViewHandle) -> Option<(u32, u32)> {
        self.state
            .image_views
            .lock()
            .unwrap()
            .get(&view.id())
            .map(|info| (info.base_array_layer, info.layer_count))
    }

    pub fn pipeline_info(&self, pipeline: &PipelineHandle) -> Option<PipelineInfo> {
        self.state
            .pipelines
            .lock()
            .unwrap()
            .get(&pipeline.id())
            .copied()
    }

    pub fn events(&self) -> Vec<CommandEvent> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.state.events.lock().unwrap().clear();
    }

    fn take_allocation(&self) -> anyhow::Result<u64> {
        let mut left = self.state.allocations_left.lock().unwrap();
        if let Some(remaining) = left.as_mut() {
            if *remaining == 0 {
                return Err(DeviceError::OutOfMemory.into());
            }
            *remaining -= 1;
        }
        let id = self.state.next_id.fetch_add(1, Relaxed);
        log::trace!("dummy device allocated resource #{id}");
        Ok(id)
    }
}

impl Gpu for DummyGpu {
    fn make_buffer(
        &self,
        info: &BufferCreateInfo,
        _memory_domain: MemoryDomain,
    ) -> anyhow::Result<BufferHandle> {
        if info.size == 0 {
            return Err(DeviceError::InvalidDescription("zero sized buffer".into()).into());
        }
        let id = self
            .take_allocation()
            .with_context(|| format!("buffer {:?}", info.label))?;
        self.state
            .buffers
            .lock()
            .unwrap()
            .insert(id, vec![0; info.size]);
        Ok(BufferHandle::new(id))
    }

    fn write_buffer(&self, buffer: &BufferHandle, offset: u64, data: &[u8]) -> anyhow::Result<()> {
        let mut buffers = self.state.buffers.lock().unwrap();
        let contents = buffers
            .get_mut(&buffer.id())
            .ok_or(DeviceError::InvalidHandle)?;
        let offset = offset as usize;
        let end = offset + data.len();
        if end > contents.len() {
            return Err(DeviceError::InvalidDescription(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                contents.len()
            ))
            .into());
        }
        contents[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn make_image(
        &self,
        info: &ImageCreateInfo,
        _memory_domain: MemoryDomain,
        _initial_data: Option<&[u8]>,
    ) -> anyhow::Result<ImageHandle> {
        if info.width == 0 || info.height == 0 || info.depth == 0 {
            return Err(DeviceError::InvalidDescription("zero sized image".into()).into());
        }
        if info.layers == 0 || info.mips == 0 {
            return Err(
                DeviceError::InvalidDescription("image needs at least one layer and mip".into())
                    .into(),
            );
        }
        let id = self
            .take_allocation()
            .with_context(|| format!("image {:?}", info.label))?;
        self.state.images.lock().unwrap().insert(
            id,
            ImageInfo {
                width: info.width,
                height: info.height,
                layers: info.layers,
                format: info.format,
            },
        );
        Ok(ImageHandle::new(id))
    }

    fn make_image_view(&self, info: &ImageViewCreateInfo) -> anyhow::Result<ImageViewHandle> {
        let range = info.subresource_range;
        {
            let images = self.state.images.lock().unwrap();
            let image = images
                .get(&info.image.id())
                .ok_or(DeviceError::InvalidHandle)?;
            if range.layer_count == 0 || range.base_array_layer + range.layer_count > image.layers {
                return Err(DeviceError::InvalidDescription(format!(
                    "view layers {}..{} outside image with {} layers",
                    range.base_array_layer,
                    range.base_array_layer + range.layer_count,
                    image.layers
                ))
                .into());
            }
        }
        let id = self.take_allocation().context("image view")?;
        self.state.image_views.lock().unwrap().insert(
            id,
            ViewInfo {
                image: info.image,
                base_array_layer: range.base_array_layer,
                layer_count: range.layer_count,
            },
        );
        Ok(ImageViewHandle::new(id))
    }

    fn make_sampler(&self, info: &SamplerCreateInfo) -> anyhow::Result<SamplerHandle> {
        let id = self.take_allocation().context("sampler")?;
        self.state.samplers.lock().unwrap().insert(id, *info);
        Ok(SamplerHandle::new(id))
    }

    fn make_shader_module(
        &self,
        info: &ShaderModuleCreateInfo,
    ) -> anyhow::Result<ShaderModuleHandle> {
        if info.code.is_empty() {
            return Err(DeviceError::InvalidDescription("empty shader module".into()).into());
        }
        let id = self.take_allocation().context("shader module")?;
        self.state
            .shader_modules
            .lock()
            .unwrap()
            .insert(id, info.code.len());
        Ok(ShaderModuleHandle::new(id))
    }

    fn make_graphics_pipeline(
        &self,
        info: &GraphicsPipelineCreateInfo,
    ) -> anyhow::Result<PipelineHandle> {
        {
            let modules = self.state.shader_modules.lock().unwrap();
            if !modules.contains_key(&info.vertex_shader.id()) {
                return Err(DeviceError::InvalidHandle).context("pipeline vertex shader");
            }
            if let Some(fragment) = info.fragment_shader {
                if !modules.contains_key(&fragment.id()) {
                    return Err(DeviceError::InvalidHandle).context("pipeline fragment shader");
                }
            }
        }
        let id = self
            .take_allocation()
            .with_context(|| format!("pipeline {:?}", info.label))?;
        self.state.pipelines.lock().unwrap().insert(
            id,
            PipelineInfo {
                cull_mode: info.cull_mode,
                front_face: info.front_face,
                depth_only: info.fragment_shader.is_none() && !info.color_output_enabled,
            },
        );
        Ok(PipelineHandle::new(id))
    }

    fn destroy_buffer(&self, buffer: BufferHandle) -> anyhow::Result<()> {
        self.state
            .buffers
            .lock()
            .unwrap()
            .remove(&buffer.id())
            .map(|_| ())
            .ok_or_else(|| DeviceError::InvalidHandle.into())
    }

    fn destroy_image(&self, image: ImageHandle) -> anyhow::Result<()> {
        self.state
            .images
            .lock()
            .unwrap()
            .remove(&image.id())
            .map(|_| ())
            .ok_or_else(|| DeviceError::InvalidHandle.into())
    }

    fn destroy_image_view(&self, view: ImageViewHandle) -> anyhow::Result<()> {
        self.state
            .image_views
            .lock()
            .unwrap()
            .remove(&view.id())
            .map(|_| ())
            .ok_or_else(|| DeviceError::InvalidHandle.into())
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) -> anyhow::Result<()> {
        self.state
            .samplers
            .lock()
            .unwrap()
            .remove(&sampler.id())
            .map(|_| ())
            .ok_or_else(|| DeviceError::InvalidHandle.into())
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) -> anyhow::Result<()> {
        self.state
            .shader_modules
            .lock()
            .unwrap()
            .remove(&module.id())
            .map(|_| ())
            .ok_or_else(|| DeviceError::InvalidHandle.into())
    }

    fn destroy_graphics_pipeline(&self, pipeline: PipelineHandle) -> anyhow::Result<()> {
        self.state
            .pipelines
            .lock()
            .unwrap()
            .remove(&pipeline.id())
            .map(|_| ())
            .ok_or_else(|| DeviceError::InvalidHandle.into())
    }

    fn start_command_buffer(
        &self,
        _queue_type: QueueType,
    ) -> anyhow::Result<Box<dyn CommandBuffer>> {
        Ok(Box::new(DummyCommandBuffer {
            state: Arc::clone(&self.state),
            current_depth_attachment: None,
            pass_open: false,
        }))
    }
}

pub struct DummyCommandBuffer {
    state: Arc<DummyState>,
    current_depth_attachment: Option<FramebufferDepthAttachment>,
    pass_open: bool,
}

impl DummyCommandBuffer {
    fn record(&self, event: CommandEvent) {
        self.state.events.lock().unwrap().push(event);
    }
}

impl CommandBuffer for DummyCommandBuffer {
    fn begin_render_pass(&mut self, info: &BeginRenderPassInfo) -> anyhow::Result<()> {
        if self.pass_open {
            return Err(DeviceError::InvalidRecordingState(
                "begin_render_pass with a pass already open".into(),
            )
            .into());
        }
        if let Some(depth) = &info.depth_attachment {
            let views = self.state.image_views.lock().unwrap();
            if !views.contains_key(&depth.image_view.id()) {
                return Err(DeviceError::InvalidHandle).context("render pass depth attachment");
            }
        }
        self.pass_open = true;
        self.current_depth_attachment = info.depth_attachment;
        self.record(CommandEvent::BeginRenderPass {
            label: info.label.map(str::to_owned),
            depth_view: info.depth_attachment.map(|depth| depth.image_view),
            clear_depth: info.depth_attachment.and_then(|depth| match depth.load_op {
                DepthLoadOp::Clear(value) => Some(value),
                _ => None,
            }),
        });
        Ok(())
    }

    fn end_render_pass(&mut self) -> anyhow::Result<()> {
        if !self.pass_open {
            return Err(DeviceError::InvalidRecordingState(
                "end_render_pass without an open pass".into(),
            )
            .into());
        }
        self.pass_open = false;
        let depth = self.current_depth_attachment.take();
        self.record(CommandEvent::EndRenderPass {
            depth_view: depth.map(|attachment| attachment.image_view),
            depth_final_layout: depth.map(|attachment| attachment.final_layout),
        });
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &PipelineHandle) {
        self.record(CommandEvent::BindPipeline(*pipeline));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(CommandEvent::SetViewport(viewport));
    }

    fn set_scissor(&mut self, scissor: Rect2D) {
        self.record(CommandEvent::SetScissor(scissor));
    }

    fn set_depth_bias(&mut self, constant: f32, slope: f32) {
        self.record(CommandEvent::SetDepthBias { constant, slope });
    }

    fn draw(
        &mut self,
        vertices: u32,
        instances: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) -> anyhow::Result<()> {
        if !self.pass_open {
            return Err(
                DeviceError::InvalidRecordingState("draw outside a render pass".into()).into(),
            );
        }
        self.record(CommandEvent::Draw {
            vertices,
            instances,
        });
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        indices: u32,
        instances: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) -> anyhow::Result<()> {
        if !self.pass_open {
            return Err(
                DeviceError::InvalidRecordingState("draw outside a render pass".into()).into(),
            );
        }
        self.record(CommandEvent::DrawIndexed {
            indices,
            instances,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AttachmentStoreOp, BufferUsageFlags, ComponentMapping, Extent2D, ImageAspectFlags,
        ImageSubresourceRange, ImageUsageFlags, ImageViewType, SampleCount,
    };

    fn test_image_info() -> ImageCreateInfo<'static> {
        ImageCreateInfo {
            label: Some("test image"),
            width: 64,
            height: 64,
            depth: 1,
            mips: 1,
            layers: 4,
            samples: SampleCount::Sample1,
            format: ImageFormat::Depth,
            usage: ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | ImageUsageFlags::SAMPLED,
        }
    }

    #[test]
    fn create_and_destroy_tracks_liveness() {
        let gpu = DummyGpu::new();
        let image = gpu
            .make_image(&test_image_info(), MemoryDomain::DeviceLocal, None)
            .unwrap();
        assert_eq!(gpu.live_count(ResourceKind::Image), 1);

        gpu.destroy_image(image).unwrap();
        assert_eq!(gpu.live_total(), 0);

        // Double destroy must be rejected
        assert!(gpu.destroy_image(image).is_err());
    }

    #[test]
    fn view_layer_range_validated_against_image() {
        let gpu = DummyGpu::new();
        let image = gpu
            .make_image(&test_image_info(), MemoryDomain::DeviceLocal, None)
            .unwrap();

        let view_info = ImageViewCreateInfo {
            image,
            view_type: ImageViewType::Type2D,
            format: ImageFormat::Depth,
            components: ComponentMapping::default(),
            subresource_range: ImageSubresourceRange {
                aspect_mask: ImageAspectFlags::DEPTH,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 3,
                layer_count: 1,
            },
        };
        let view = gpu.make_image_view(&view_info).unwrap();
        assert_eq!(gpu.view_layer_range(&view), Some((3, 1)));

        let out_of_range = ImageViewCreateInfo {
            subresource_range: ImageSubresourceRange {
                base_array_layer: 4,
                ..view_info.subresource_range
            },
            ..view_info
        };
        assert!(gpu.make_image_view(&out_of_range).is_err());
    }

    #[test]
    fn allocation_failure_injection() {
        let gpu = DummyGpu::new();
        gpu.fail_after(1);

        gpu.make_image(&test_image_info(), MemoryDomain::DeviceLocal, None)
            .unwrap();
        assert!(gpu
            .make_image(&test_image_info(), MemoryDomain::DeviceLocal, None)
            .is_err());

        gpu.clear_failure();
        gpu.make_image(&test_image_info(), MemoryDomain::DeviceLocal, None)
            .unwrap();
    }

    #[test]
    fn buffer_writes_are_bounds_checked() {
        let gpu = DummyGpu::new();
        let buffer = gpu
            .make_buffer(
                &BufferCreateInfo {
                    label: None,
                    size: 16,
                    usage: BufferUsageFlags::UNIFORM_BUFFER,
                },
                MemoryDomain::HostVisible | MemoryDomain::HostCoherent,
            )
            .unwrap();

        gpu.write_buffer(&buffer, 8, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(
            gpu.buffer_contents(&buffer).unwrap()[8..],
            [1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert!(gpu.write_buffer(&buffer, 12, &[0; 8]).is_err());
    }

    #[test]
    fn empty_shader_module_is_rejected() {
        let gpu = DummyGpu::new();
        assert!(gpu
            .make_shader_module(&ShaderModuleCreateInfo { code: &[] })
            .is_err());
    }

    #[test]
    fn render_pass_bracketing_is_enforced() {
        let gpu = DummyGpu::new();
        let image = gpu
            .make_image(&test_image_info(), MemoryDomain::DeviceLocal, None)
            .unwrap();
        let view = gpu
            .make_image_view(&ImageViewCreateInfo {
                image,
                view_type: ImageViewType::Type2D,
                format: ImageFormat::Depth,
                components: ComponentMapping::default(),
                subresource_range: ImageSubresourceRange {
                    aspect_mask: ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
            })
            .unwrap();

        let mut cmd = gpu.start_command_buffer(QueueType::Graphics).unwrap();
        assert!(cmd.end_render_pass().is_err());
        assert!(cmd.draw(3, 1, 0, 0).is_err());

        let pass_info = BeginRenderPassInfo {
            label: Some("test pass"),
            color_attachments: &[],
            depth_attachment: Some(FramebufferDepthAttachment {
                image_view: view,
                load_op: DepthLoadOp::Clear(1.0),
                store_op: AttachmentStoreOp::Store,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::ShaderReadOnly,
            }),
            render_area: Rect2D {
                offset: Default::default(),
                extent: Extent2D {
                    width: 64,
                    height: 64,
                },
            },
        };
        cmd.begin_render_pass(&pass_info).unwrap();
        assert!(cmd.begin_render_pass(&pass_info).is_err());
        cmd.draw(3, 1, 0, 0).unwrap();
        cmd.end_render_pass().unwrap();

        let events = gpu.events();
        assert_eq!(
            events.last(),
            Some(&CommandEvent::EndRenderPass {
                depth_view: Some(view),
                depth_final_layout: Some(ImageLayout::ShaderReadOnly),
            })
        );
    }
}
