use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ImageHandle, ShaderModuleHandle};

/// Structured failures a device implementation can report besides
/// backend-specific errors. Wrapped in `anyhow::Error` at the trait boundary.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("invalid resource description: {0}")]
    InvalidDescription(String),
    #[error("unknown or already destroyed handle")]
    InvalidHandle,
    #[error("out of device memory")]
    OutOfMemory,
    #[error("invalid command recording state: {0}")]
    InvalidRecordingState(String),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Offset2D {
    pub x: i32,
    pub y: i32,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect2D {
    pub offset: Offset2D,
    pub extent: Extent2D,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SampleCount {
    #[default]
    Sample1,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImageFormat {
    Rgba8,
    Depth,
}

impl ImageFormat {
    pub fn aspect(&self) -> ImageAspectFlags {
        match self {
            ImageFormat::Rgba8 => ImageAspectFlags::COLOR,
            ImageFormat::Depth => ImageAspectFlags::DEPTH,
        }
    }

    pub fn default_usage_flags(&self) -> ImageUsageFlags {
        match self {
            ImageFormat::Rgba8 => ImageUsageFlags::COLOR_ATTACHMENT,
            ImageFormat::Depth => ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImageViewType {
    Type2D,
    Type2DArray,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
pub enum ComponentSwizzle {
    #[default]
    Identity,
    Zero,
    One,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
pub struct ComponentMapping {
    pub r: ComponentSwizzle,
    pub g: ComponentSwizzle,
    pub b: ComponentSwizzle,
    pub a: ComponentSwizzle,
}

bitflags! {
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Ord, PartialOrd, PartialEq, Eq, Hash, Default)]
    pub struct ImageAspectFlags: u32 {
        const COLOR = 0b01;
        const DEPTH = 0b10;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Ord, PartialOrd, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsageFlags: u32 {
        const TRANSFER_SRC = 0b1;
        const TRANSFER_DST = 0b10;
        const SAMPLED = 0b100;
        const COLOR_ATTACHMENT = 0b1_0000;
        const DEPTH_STENCIL_ATTACHMENT = 0b10_0000;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Ord, PartialOrd, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsageFlags: u32 {
        const TRANSFER_SRC = 0b1;
        const TRANSFER_DST = 0b10;
        const UNIFORM_BUFFER = 0b1_0000;
        const STORAGE_BUFFER = 0b10_0000;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Ord, PartialOrd, PartialEq, Eq, Hash)]
    pub struct MemoryDomain: u32 {
        const DeviceLocal =     0b00000001;
        const HostVisible =     0b00000010;
        const HostCoherent =    0b00000100;
    }
}

/// Image layouts a resource can be transitioned through. Render passes
/// declare the transition on their attachments: ending the pass leaves the
/// attachment's subresource range in `final_layout`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
pub enum ImageLayout {
    #[default]
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockWise,
    ClockWise,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Default)]
pub enum SamplerAddressMode {
    #[default]
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct ImageSubresourceRange {
    pub aspect_mask: ImageAspectFlags,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct ImageCreateInfo<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mips: u32,
    pub layers: u32,
    pub samples: SampleCount,
    pub format: ImageFormat,
    pub usage: ImageUsageFlags,
}

#[derive(Copy, Clone, Debug)]
pub struct ImageViewCreateInfo {
    pub image: ImageHandle,
    pub view_type: ImageViewType,
    pub format: ImageFormat,
    pub components: ComponentMapping,
    pub subresource_range: ImageSubresourceRange,
}

#[derive(Copy, Clone, Debug)]
pub struct SamplerCreateInfo {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub address_u: SamplerAddressMode,
    pub address_v: SamplerAddressMode,
    pub address_w: SamplerAddressMode,
    pub mip_lod_bias: f32,
    pub compare_function: Option<CompareOp>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: [f32; 4],
}

#[derive(Copy, Clone, Debug)]
pub struct BufferCreateInfo<'a> {
    pub label: Option<&'a str>,
    pub size: usize,
    pub usage: BufferUsageFlags,
}

#[derive(Copy, Clone, Debug)]
pub struct ShaderModuleCreateInfo<'a> {
    pub code: &'a [u32],
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum VertexAttributeFormat {
    Float2,
    Float3,
    Float4,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct VertexInputDescription {
    pub location: u32,
    pub offset: u32,
    pub stride: u32,
    pub format: VertexAttributeFormat,
}

/// Viewport, scissor and depth bias are always dynamic state; everything
/// else is baked at creation time.
#[derive(Copy, Clone, Debug)]
pub struct GraphicsPipelineCreateInfo<'a> {
    pub label: Option<&'a str>,
    pub vertex_shader: ShaderModuleHandle,
    pub fragment_shader: Option<ShaderModuleHandle>,
    pub vertex_inputs: &'a [VertexInputDescription],
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_test_enabled: bool,
    pub depth_write_enabled: bool,
    pub depth_compare_op: CompareOp,
    pub color_output_enabled: bool,
}
