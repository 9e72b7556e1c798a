use crate::{
    BufferCreateInfo, BufferHandle, CommandBuffer, GraphicsPipelineCreateInfo, ImageCreateInfo,
    ImageHandle, ImageViewCreateInfo, ImageViewHandle, MemoryDomain, PipelineHandle, QueueType,
    SamplerCreateInfo, SamplerHandle, ShaderModuleCreateInfo, ShaderModuleHandle,
};

/// The graphics device boundary.
///
/// Implementations own the actual backend objects; callers only ever hold
/// the id handles returned here. Creation either fully succeeds or returns
/// an error without leaking partial backend state. Destruction is explicit
/// and must be called with a handle obtained from the same device.
pub trait Gpu {
    fn make_buffer(
        &self,
        info: &BufferCreateInfo,
        memory_domain: MemoryDomain,
    ) -> anyhow::Result<BufferHandle>;

    fn write_buffer(&self, buffer: &BufferHandle, offset: u64, data: &[u8]) -> anyhow::Result<()>;

    fn make_image(
        &self,
        info: &ImageCreateInfo,
        memory_domain: MemoryDomain,
        initial_data: Option<&[u8]>,
    ) -> anyhow::Result<ImageHandle>;

    fn make_image_view(&self, info: &ImageViewCreateInfo) -> anyhow::Result<ImageViewHandle>;

    fn make_sampler(&self, info: &SamplerCreateInfo) -> anyhow::Result<SamplerHandle>;

    fn make_shader_module(
        &self,
        info: &ShaderModuleCreateInfo,
    ) -> anyhow::Result<ShaderModuleHandle>;

    fn make_graphics_pipeline(
        &self,
        info: &GraphicsPipelineCreateInfo,
    ) -> anyhow::Result<PipelineHandle>;

    fn destroy_buffer(&self, buffer: BufferHandle) -> anyhow::Result<()>;
    fn destroy_image(&self, image: ImageHandle) -> anyhow::Result<()>;
    fn destroy_image_view(&self, view: ImageViewHandle) -> anyhow::Result<()>;
    fn destroy_sampler(&self, sampler: SamplerHandle) -> anyhow::Result<()>;
    fn destroy_shader_module(&self, module: ShaderModuleHandle) -> anyhow::Result<()>;
    fn destroy_graphics_pipeline(&self, pipeline: PipelineHandle) -> anyhow::Result<()>;

    fn start_command_buffer(&self, queue_type: QueueType) -> anyhow::Result<Box<dyn CommandBuffer>>;
}
