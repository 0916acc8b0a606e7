//! Backend abstraction consumed by the frame graph.
//!
//! The executor talks to the GPU driver exclusively through [`RenderBackend`].
//! Backends mint opaque handles for the objects they create; the frame graph
//! never inspects them beyond equality.

use thiserror::Error;

use crate::backend::types::{
    BufferDescriptor, RenderTargetInfo, TargetFlags, TextureDescriptor, MAX_COLOR_ATTACHMENTS,
};

/// Backend error type.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create render target: {0}")]
    TargetCreationFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a concrete GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u64);

/// Handle to a concrete GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

/// Handle to a concrete GPU render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u64);

macro_rules! raw_handle {
    ($name:ident) => {
        impl $name {
            /// Wrap a raw backend identifier.
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw backend identifier.
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

raw_handle!(TextureHandle);
raw_handle!(BufferHandle);
raw_handle!(TargetHandle);

/// Concrete textures bound to the attachment slots of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConcreteAttachments {
    /// Color attachments, by slot.
    pub color: [Option<TextureHandle>; MAX_COLOR_ATTACHMENTS],
    /// Depth attachment.
    pub depth: Option<TextureHandle>,
    /// Stencil attachment.
    pub stencil: Option<TextureHandle>,
}

/// GPU driver interface required by the frame graph.
///
/// All operations record into the backend's command stream; `flush` submits
/// accumulated work. The trait is object safe so the executor can hold a
/// `&mut dyn RenderBackend`.
pub trait RenderBackend {
    /// Create a texture.
    fn create_texture(
        &mut self,
        name: &str,
        desc: &TextureDescriptor,
    ) -> BackendResult<TextureHandle>;

    /// Destroy a texture.
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Create a buffer.
    fn create_buffer(&mut self, name: &str, desc: &BufferDescriptor)
        -> BackendResult<BufferHandle>;

    /// Destroy a buffer.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Create a render target binding the given concrete attachments.
    fn create_render_target(
        &mut self,
        name: &str,
        info: &RenderTargetInfo,
        attachments: &ConcreteAttachments,
    ) -> BackendResult<TargetHandle>;

    /// Destroy a render target. Attached textures are not destroyed.
    fn destroy_render_target(&mut self, target: TargetHandle);

    /// Begin a render pass on `target`.
    ///
    /// `clear` selects attachments cleared on load; `discard_start` selects
    /// attachments whose prior contents need not be loaded.
    fn begin_render_pass(&mut self, target: TargetHandle, clear: TargetFlags, discard_start: TargetFlags);

    /// End the current render pass.
    ///
    /// `discard_end` selects attachments whose contents need not be stored.
    fn end_render_pass(&mut self, discard_end: TargetFlags);

    /// Submit accumulated commands.
    fn flush(&mut self);
}
