use crate::{ImageLayout, ImageViewHandle, PipelineHandle, Rect2D, Viewport};

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ColorLoadOp {
    DontCare,
    Load,
    Clear([f32; 4]),
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum DepthLoadOp {
    DontCare,
    Load,
    Clear(f32),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AttachmentStoreOp {
    DontCare,
    Store,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FramebufferColorAttachment {
    pub image_view: ImageViewHandle,
    pub load_op: ColorLoadOp,
    pub store_op: AttachmentStoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FramebufferDepthAttachment {
    pub image_view: ImageViewHandle,
    pub load_op: DepthLoadOp,
    pub store_op: AttachmentStoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

#[derive(Copy, Clone, Debug)]
pub struct BeginRenderPassInfo<'a> {
    pub label: Option<&'a str>,
    pub color_attachments: &'a [FramebufferColorAttachment],
    pub depth_attachment: Option<FramebufferDepthAttachment>,
    pub render_area: Rect2D,
}

/// Command recording surface handed to render-pass drivers.
///
/// Passes are bracketed explicitly: `end_render_pass` performs the layout
/// transitions declared by the attachments' `final_layout`, scoped to each
/// attachment view's subresource range. Recording is single threaded; a
/// command buffer is not expected to be shared across threads.
pub trait CommandBuffer {
    fn begin_render_pass(&mut self, info: &BeginRenderPassInfo) -> anyhow::Result<()>;
    fn end_render_pass(&mut self) -> anyhow::Result<()>;

    fn bind_pipeline(&mut self, pipeline: &PipelineHandle);
    fn set_viewport(&mut self, viewport: Viewport);
    fn set_scissor(&mut self, scissor: Rect2D);
    fn set_depth_bias(&mut self, constant: f32, slope: f32);

    fn draw(
        &mut self,
        vertices: u32,
        instances: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> anyhow::Result<()>;

    fn draw_indexed(
        &mut self,
        indices: u32,
        instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> anyhow::Result<()>;
}
