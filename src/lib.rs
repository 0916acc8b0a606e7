//! # framegraph
//!
//! A per-frame declarative scheduler for GPU rendering work.
//!
//! Passes declare the virtual resources they read and write through a
//! [`Builder`]; the graph culls unreferenced work, fits concrete resource
//! lifetimes to the surviving passes, pools render targets across disjoint
//! lifetimes, and invokes each pass's deferred execution callback against a
//! [`RenderBackend`].
//!
//! See the [`frame_graph`] module for the pipeline walkthrough.

pub mod backend;
pub mod frame_graph;

pub use backend::{
    BackendError, BackendResult, BufferDescriptor, BufferHandle, BufferUsage, ConcreteAttachments,
    RenderBackend, RenderTargetInfo, TargetFlags, TargetHandle, TextureDescriptor, TextureFormat,
    TextureHandle, TextureUsage, MAX_COLOR_ATTACHMENTS,
};
pub use frame_graph::{
    Buffer, BufferId, Builder, FrameGraph, PassHandle, PassRef, PassResources,
    RenderTargetDescriptor, ResourceHandle, ResourceKind, TargetAttachments, Texture, TextureId,
    TypedHandle,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
