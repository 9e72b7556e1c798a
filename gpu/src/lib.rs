//! Graphics-device collaborator interface.
//!
//! Renderer subsystems consume this crate through the [`Gpu`] and
//! [`CommandBuffer`] traits; concrete backends (Vulkan, tests) live behind
//! them. Only the headless [`dummy`] backend ships here.

mod command_buffer;
pub mod dummy;
mod gpu;
mod handle;
mod types;

pub use command_buffer::*;
pub use gpu::*;
pub use handle::*;
pub use types::*;

#[derive(Default)]
pub enum QueueType {
    #[default]
    Graphics,
    AsyncCompute,
    Transfer,
}
