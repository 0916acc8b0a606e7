//! Virtual render targets and the concrete target cache.
//!
//! Every `create_render_target` declaration registers a *virtual* target.
//! During compile the registry dedupes virtual targets with the same resolved
//! attachments onto one cache slot, and reuses expired slots with the same
//! structural shape for targets whose lifetimes do not overlap. Concrete
//! backend targets are created lazily by the executor, one per cache slot in
//! use.

use crate::backend::types::{
    RenderTargetInfo, TargetFlags, TextureDescriptor, MAX_COLOR_ATTACHMENTS,
};
use crate::backend::{ConcreteAttachments, TargetHandle};
use crate::frame_graph::handle::TextureId;
use crate::frame_graph::pass::PassHandle;

/// Total number of attachment slots: colors plus depth and stencil.
pub(crate) const ATTACHMENT_SLOTS: usize = MAX_COLOR_ATTACHMENTS + 2;

/// Texture handles bound to the attachment slots of a virtual render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetAttachments {
    /// Color attachments, by slot.
    pub color: [Option<TextureId>; MAX_COLOR_ATTACHMENTS],
    /// Depth attachment.
    pub depth: Option<TextureId>,
    /// Stencil attachment.
    pub stencil: Option<TextureId>,
}

impl TargetAttachments {
    /// Create an empty attachment set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a color attachment.
    pub fn with_color(mut self, index: usize, texture: TextureId) -> Self {
        assert!(index < MAX_COLOR_ATTACHMENTS, "invalid color slot {index}");
        self.color[index] = Some(texture);
        self
    }

    /// Bind the depth attachment.
    pub fn with_depth(mut self, texture: TextureId) -> Self {
        self.depth = Some(texture);
        self
    }

    /// Bind the stencil attachment.
    pub fn with_stencil(mut self, texture: TextureId) -> Self {
        self.stencil = Some(texture);
        self
    }

    /// All slots with their flag, in slot order.
    pub(crate) fn slots(&self) -> [(TargetFlags, Option<TextureId>); ATTACHMENT_SLOTS] {
        [
            (TargetFlags::COLOR0, self.color[0]),
            (TargetFlags::COLOR1, self.color[1]),
            (TargetFlags::COLOR2, self.color[2]),
            (TargetFlags::COLOR3, self.color[3]),
            (TargetFlags::DEPTH, self.depth),
            (TargetFlags::STENCIL, self.stencil),
        ]
    }

    /// Whether any slot is bound.
    pub fn is_empty(&self) -> bool {
        self.slots().iter().all(|(_, texture)| texture.is_none())
    }
}

/// Descriptor of a virtual render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    /// Attachment bindings.
    pub attachments: TargetAttachments,
    /// Sample count.
    pub samples: u8,
}

impl RenderTargetDescriptor {
    /// Create a single-sampled descriptor from an attachment set.
    pub fn new(attachments: TargetAttachments) -> Self {
        Self {
            attachments,
            samples: 1,
        }
    }

    /// Set the sample count.
    pub fn with_samples(mut self, samples: u8) -> Self {
        self.samples = samples;
        self
    }
}

/// A render target declared by one pass.
#[derive(Debug)]
pub(crate) struct VirtualTarget {
    pub(crate) name: String,
    pub(crate) desc: RenderTargetDescriptor,
    pub(crate) clear: TargetFlags,
    pub(crate) pass: PassHandle,
    /// Cache slot assigned during compile. Unset for culled or imported.
    pub(crate) cache_slot: Option<u32>,
    /// Entry of an imported backend target this virtual target resolves to.
    pub(crate) imported_entry: Option<u32>,
    /// Attachment entries resolved through aliases, by slot. Set during
    /// compile; the executor binds these, not the cache slot's key.
    pub(crate) resolved_entries: [Option<u32>; ATTACHMENT_SLOTS],
    pub(crate) discard_start: TargetFlags,
    pub(crate) discard_end: TargetFlags,
}

impl VirtualTarget {
    pub(crate) fn new(
        name: String,
        desc: RenderTargetDescriptor,
        clear: TargetFlags,
        pass: PassHandle,
    ) -> Self {
        Self {
            name,
            desc,
            clear,
            pass,
            cache_slot: None,
            imported_entry: None,
            resolved_entries: [None; ATTACHMENT_SLOTS],
            discard_start: TargetFlags::empty(),
            discard_end: TargetFlags::empty(),
        }
    }
}

/// Structural identity of a concrete target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TargetKey {
    /// Resolved entry index per slot; identity for same-content dedup.
    pub(crate) entries: [Option<u32>; ATTACHMENT_SLOTS],
    /// Per-slot texture descriptor; shape for lifetime-based pooling.
    pub(crate) specs: [Option<TextureDescriptor>; ATTACHMENT_SLOTS],
    pub(crate) info: RenderTargetInfo,
}

/// One pooled concrete render target.
#[derive(Debug)]
pub(crate) struct TargetCacheEntry {
    pub(crate) name: String,
    pub(crate) key: TargetKey,
    /// Pass interval of the current owners.
    pub(crate) first_use: u32,
    pub(crate) last_use: u32,
    /// Virtual targets assigned to this slot.
    pub(crate) users: Vec<u32>,
    /// Created lazily by the executor.
    pub(crate) concrete: Option<TargetHandle>,
    /// Concrete attachments the backend target was created with.
    pub(crate) bound_attachments: Option<ConcreteAttachments>,
}

impl TargetCacheEntry {
    /// Same resolved attachments: the virtual targets render to the same
    /// storage and may share the slot regardless of lifetime.
    pub(crate) fn matches_identity(&self, key: &TargetKey) -> bool {
        self.key.info == key.info && self.key.entries == key.entries
    }

    /// Same structural shape: the slot may be handed over to a target whose
    /// lifetime does not overlap the current owners'.
    pub(crate) fn matches_shape(&self, key: &TargetKey) -> bool {
        self.key.info == key.info && self.key.specs == key.specs
    }
}
