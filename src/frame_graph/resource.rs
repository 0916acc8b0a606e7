//! Resource entries and versioned nodes.
//!
//! An *entry* is the backing store that eventually holds a concrete backend
//! resource; a *node* is a version stamp onto an entry. Each write that
//! re-versions a resource adds a node, so one entry can be viewed through
//! many nodes over the course of a frame.

use crate::backend::types::{
    BufferDescriptor, RenderTargetInfo, TargetFlags, TextureDescriptor,
};
use crate::backend::{BufferHandle, TargetHandle, TextureHandle};
use crate::frame_graph::pass::PassHandle;

/// Marker for texture resources.
pub struct Texture;

/// Marker for buffer resources.
pub struct Buffer;

/// Marker for imported render targets.
pub struct ImportedTarget;

/// Kinds of resources the graph can manage.
pub trait ResourceKind {
    /// Display name used in handle debug output.
    const NAME: &'static str;
}

impl ResourceKind for Texture {
    const NAME: &'static str = "texture";
}

impl ResourceKind for Buffer {
    const NAME: &'static str = "buffer";
}

impl ResourceKind for ImportedTarget {
    const NAME: &'static str = "target";
}

/// Type-specific state of a resource entry.
#[derive(Debug, Clone)]
pub(crate) enum ResourcePayload {
    Texture {
        desc: TextureDescriptor,
        concrete: Option<TextureHandle>,
    },
    Buffer {
        desc: BufferDescriptor,
        concrete: Option<BufferHandle>,
    },
    /// An externally owned render target. Always concrete.
    Target {
        info: RenderTargetInfo,
        concrete: TargetHandle,
    },
}

/// Backing store for one virtual resource.
///
/// Lifetime fields are assigned by compile; the concrete object inside the
/// payload exists only between the entry's first-use and last-use passes.
#[derive(Debug)]
pub(crate) struct ResourceEntry {
    pub(crate) name: String,
    pub(crate) payload: ResourcePayload,
    pub(crate) imported: bool,
    /// Caller-supplied discard flags. Only meaningful for imported targets.
    pub(crate) discard_start: TargetFlags,
    pub(crate) discard_end: TargetFlags,
    /// Latest version number issued for this entry.
    pub(crate) version: u32,
    /// Index of the node holding the latest version.
    pub(crate) latest_node: u32,
    /// Some surviving pass samples this entry as a texture.
    pub(crate) sampled: bool,
    /// Pinned as a frame output via `present`.
    pub(crate) presented: bool,
    /// Surviving read references, for diagnostics and export.
    pub(crate) ref_count: u32,
    pub(crate) first_use: Option<u32>,
    pub(crate) last_use: Option<u32>,
}

impl ResourceEntry {
    pub(crate) fn new(name: String, payload: ResourcePayload, imported: bool) -> Self {
        Self {
            name,
            payload,
            imported,
            discard_start: TargetFlags::empty(),
            discard_end: TargetFlags::empty(),
            version: 0,
            latest_node: 0,
            sampled: false,
            presented: false,
            ref_count: 0,
            first_use: None,
            last_use: None,
        }
    }

    /// Whether a concrete backend object currently backs this entry.
    pub(crate) fn is_instantiated(&self) -> bool {
        match &self.payload {
            ResourcePayload::Texture { concrete, .. } => concrete.is_some(),
            ResourcePayload::Buffer { concrete, .. } => concrete.is_some(),
            ResourcePayload::Target { .. } => true,
        }
    }

    /// Width and height, when the payload has dimensions.
    pub(crate) fn dimensions(&self) -> Option<(u32, u32)> {
        match &self.payload {
            ResourcePayload::Texture { desc, .. } => Some((desc.width, desc.height)),
            ResourcePayload::Buffer { .. } => None,
            ResourcePayload::Target { info, .. } => Some((info.width, info.height)),
        }
    }

    /// Sample count, when the payload has one.
    pub(crate) fn samples(&self) -> Option<u32> {
        match &self.payload {
            ResourcePayload::Texture { desc, .. } => Some(desc.sample_count),
            ResourcePayload::Buffer { .. } => None,
            ResourcePayload::Target { info, .. } => Some(u32::from(info.samples)),
        }
    }

    /// Record that a surviving pass at `index` touches this entry.
    pub(crate) fn extend_lifetime(&mut self, index: u32) {
        self.first_use = Some(self.first_use.map_or(index, |f| f.min(index)));
        self.last_use = Some(self.last_use.map_or(index, |l| l.max(index)));
    }
}

/// A version stamp onto a resource entry.
#[derive(Debug, Clone)]
pub(crate) struct ResourceNode {
    pub(crate) entry: u32,
    pub(crate) version: u32,
    /// The pass writing this version, derived during compile.
    pub(crate) writer: Option<PassHandle>,
    /// Reads of this node are accounted against the alias target instead.
    pub(crate) alias: Option<u32>,
    /// Surviving reads of this version, derived during compile.
    pub(crate) read_count: u32,
}

impl ResourceNode {
    pub(crate) fn new(entry: u32, version: u32) -> Self {
        Self {
            entry,
            version,
            writer: None,
            alias: None,
            read_count: 0,
        }
    }
}
