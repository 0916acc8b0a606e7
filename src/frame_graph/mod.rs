//! Frame graph: a per-frame declarative scheduler for GPU rendering work.
//!
//! Client code declares *passes* and the virtual resources each pass reads
//! and writes. The graph validates the declarations, culls passes whose
//! outputs nobody consumes, fits concrete resource lifetimes to the
//! surviving passes, and executes the remaining passes in declaration order.
//!
//! The design is largely inspired by Yuriy O'Donnell's 2017 GDC talk
//! "FrameGraph: Extensible Rendering Architecture in Frostbite".
//!
//! # Pipeline
//!
//! | Phase | Entry point | Purpose |
//! |-------|-------------|---------|
//! | Declare | [`FrameGraph::add_pass`] | Passes declare resources via a [`Builder`] |
//! | Compile | [`FrameGraph::compile`] | Cull, lifetimes, target pooling, discards |
//! | Execute | [`FrameGraph::execute`] | Instantiate, bind, run pass callbacks |
//!
//! # Example
//!
//! ```ignore
//! let mut graph = FrameGraph::new();
//!
//! #[derive(Default, Clone)]
//! struct GBufferData {
//!     albedo: TextureId,
//! }
//!
//! let gbuffer = graph.add_pass(
//!     "gbuffer",
//!     |builder, data: &mut GBufferData| {
//!         let albedo = builder.create_texture("albedo", desc);
//!         data.albedo = builder.create_color_target("gbuffer_rt", albedo, TargetFlags::COLOR0);
//!     },
//!     |resources, data, backend| {
//!         let _albedo = resources.texture(data.albedo);
//!     },
//! );
//! graph.present(gbuffer.data().albedo);
//! graph.compile();
//! graph.execute(&mut backend)?;
//! ```

pub mod builder;
pub mod compile;
pub mod executor;
pub mod graphviz;
pub mod handle;
pub mod pass;
pub mod resource;
pub mod target;

pub use builder::Builder;
pub use handle::{BufferId, ResourceHandle, TextureId, TypedHandle};
pub use pass::{PassHandle, PassRef, PassResources};
pub use resource::{Buffer, ImportedTarget, ResourceKind, Texture};
pub use target::{RenderTargetDescriptor, TargetAttachments};

use std::mem;

use crate::backend::types::{
    BufferDescriptor, RenderTargetInfo, TargetFlags, TextureDescriptor,
};
use crate::backend::{BufferHandle, RenderBackend, TargetHandle, TextureHandle};
use pass::{ExecuteFn, PassNode, PassRead, PassWrite};
use resource::{ResourceEntry, ResourceNode, ResourcePayload};
use target::{TargetCacheEntry, VirtualTarget};

/// Captured state allowed for an execute callback, in bytes.
///
/// Execute callbacks are stored alongside pass metadata for the whole frame;
/// anything larger than this should live in the pass data instead.
const MAX_EXECUTE_CAPTURE: usize = 1024;

/// A recorded `move_resource` call, resolved during compile.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Alias {
    pub(crate) from: ResourceHandle,
    pub(crate) to: ResourceHandle,
    /// Entries at record time, for debug export.
    pub(crate) from_entry: u32,
    pub(crate) to_entry: u32,
    /// Node count at record time. Only writes declared before the move are
    /// disconnected by it.
    pub(crate) watermark: u32,
}

/// The frame graph. Rebuilt every frame; see the module docs.
#[derive(Default)]
pub struct FrameGraph {
    pub(crate) passes: Vec<PassNode>,
    pub(crate) nodes: Vec<ResourceNode>,
    pub(crate) entries: Vec<ResourceEntry>,
    pub(crate) targets: Vec<VirtualTarget>,
    pub(crate) target_cache: Vec<TargetCacheEntry>,
    pub(crate) aliases: Vec<Alias>,
    pub(crate) presented: Vec<ResourceHandle>,
    pub(crate) compiled: bool,
}

impl FrameGraph {
    /// Create a new empty frame graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pass to the frame graph.
    ///
    /// `setup` runs immediately with a [`Builder`] and a default `D`, and
    /// declares the resources the pass uses. `execute` is stored and invoked
    /// during [`execute`](Self::execute); it must capture by copy, not by
    /// reference to frame state.
    ///
    /// Returns the pass handle together with a copy of the declared data.
    pub fn add_pass<D, S, E>(&mut self, name: &str, setup: S, execute: E) -> PassRef<D>
    where
        D: Default + Clone + 'static,
        S: FnOnce(&mut Builder<'_>, &mut D),
        E: FnOnce(&PassResources<'_>, &D, &mut dyn RenderBackend) + 'static,
    {
        assert!(
            mem::size_of::<E>() + mem::size_of::<D>() <= MAX_EXECUTE_CAPTURE,
            "execute callback of pass '{name}' captures too much data"
        );
        assert!(!self.compiled, "cannot add a pass after compile()");

        let index = self.passes.len() as u32;
        self.passes.push(PassNode::new(name.to_string()));

        let mut data = D::default();
        {
            let mut builder = Builder::new(self, index as usize);
            setup(&mut builder, &mut data);
        }

        let result = data.clone();
        let executor: ExecuteFn = Box::new(
            move |resources: &PassResources<'_>, backend: &mut dyn RenderBackend| {
                execute(resources, &data, backend)
            },
        );
        self.passes[index as usize].executor = Some(executor);

        PassRef::new(PassHandle::new(index), result)
    }

    /// Pin a resource as a frame output, preventing it and its producers
    /// from being culled.
    pub fn present(&mut self, handle: impl Into<ResourceHandle>) {
        let handle = handle.into();
        if !self.is_valid(handle) {
            log::error!("present() with a stale resource handle {handle:?}");
            debug_assert!(false, "present() with a stale resource handle");
            return;
        }
        self.presented.push(handle);
    }

    /// Import an externally owned texture.
    ///
    /// The entry is never instantiated or destroyed by the executor.
    /// Writing to it marks the writing pass as side-effecting.
    pub fn import_texture(
        &mut self,
        name: &str,
        desc: TextureDescriptor,
        texture: TextureHandle,
    ) -> TextureId {
        let handle = self.create_entry(
            name.to_string(),
            ResourcePayload::Texture {
                desc,
                concrete: Some(texture),
            },
            true,
        );
        TypedHandle::from_raw(handle)
    }

    /// Import an externally owned buffer.
    pub fn import_buffer(
        &mut self,
        name: &str,
        desc: BufferDescriptor,
        buffer: BufferHandle,
    ) -> BufferId {
        let handle = self.create_entry(
            name.to_string(),
            ResourcePayload::Buffer {
                desc,
                concrete: Some(buffer),
            },
            true,
        );
        TypedHandle::from_raw(handle)
    }

    /// Import an externally owned render target (typically the swapchain).
    ///
    /// The returned handle is attached as a color attachment; a virtual
    /// render target whose attachments resolve to this entry binds the
    /// imported backend target directly. `discard_start` and `discard_end`
    /// describe which of its attachments the external owner allows the graph
    /// to discard at the frame boundaries.
    pub fn import_render_target(
        &mut self,
        name: &str,
        info: RenderTargetInfo,
        target: TargetHandle,
        discard_start: TargetFlags,
        discard_end: TargetFlags,
    ) -> TextureId {
        let handle = self.create_entry(
            name.to_string(),
            ResourcePayload::Target {
                info,
                concrete: target,
            },
            true,
        );
        let entry = self.nodes[handle.node_index()].entry as usize;
        self.entries[entry].discard_start = discard_start;
        self.entries[entry].discard_end = discard_end;
        TypedHandle::from_raw(handle)
    }

    /// Move the resource behind `from` onto the handle `to`.
    ///
    /// After compile, every consumer of `to` reads the storage that backed
    /// `from`, and passes that wrote `to` lose those references. `from`
    /// becomes invalid immediately, as if it had been written.
    pub fn move_resource<K: ResourceKind>(&mut self, from: TypedHandle<K>, to: TypedHandle<K>) {
        let (from, to) = (from.raw(), to.raw());
        if !self.is_valid(from) || !self.is_valid(to) {
            log::error!("move_resource() with a stale handle ({from:?} -> {to:?})");
            debug_assert!(false, "move_resource() with a stale handle");
            return;
        }
        let from_entry = self.nodes[from.node_index()].entry;
        let to_entry = self.nodes[to.node_index()].entry;
        self.aliases.push(Alias {
            from,
            to,
            from_entry,
            to_entry,
            watermark: self.nodes.len() as u32,
        });
        // Invalidate `from` and every other handle onto its entry; `to`
        // becomes the entry's latest view once compile redirects it.
        self.entries[from_entry as usize].latest_node = to.node_index() as u32;
    }

    /// Whether `handle` still names the current version of its resource.
    pub fn is_valid(&self, handle: impl Into<ResourceHandle>) -> bool {
        let handle = handle.into();
        let index = handle.node_index();
        if index >= self.nodes.len() {
            return false;
        }
        let node = &self.nodes[index];
        handle.version() == node.version
            && self.entries[node.entry as usize].latest_node == index as u32
    }

    /// Descriptor of a texture resource. The handle must be valid.
    pub fn texture_descriptor(&self, id: TextureId) -> &TextureDescriptor {
        let entry = self.entry_of(id.raw());
        match &entry.payload {
            ResourcePayload::Texture { desc, .. } => desc,
            _ => panic!("resource '{}' is not a texture", entry.name),
        }
    }

    /// Descriptor of a buffer resource. The handle must be valid.
    pub fn buffer_descriptor(&self, id: BufferId) -> &BufferDescriptor {
        let entry = self.entry_of(id.raw());
        match &entry.payload {
            ResourcePayload::Buffer { desc, .. } => desc,
            _ => panic!("resource '{}' is not a buffer", entry.name),
        }
    }

    /// Debug name of the resource behind `handle`.
    pub fn name_of(&self, handle: impl Into<ResourceHandle>) -> &str {
        &self.entry_of(handle.into()).name
    }

    /// Number of declared passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Whether a pass was culled by [`compile`](Self::compile).
    pub fn is_culled(&self, pass: PassHandle) -> bool {
        self.passes[pass.index()].culled
    }

    /// The `[first_use, last_use]` pass interval assigned to the resource
    /// behind `handle`, if it survived compile.
    pub fn resource_lifetime(&self, handle: impl Into<ResourceHandle>) -> Option<(u32, u32)> {
        let entry = self.entry_of(handle.into());
        Some((entry.first_use?, entry.last_use?))
    }

    /// Clear the graph for the next frame. Storage capacity is retained so
    /// the per-frame rebuild does not reallocate.
    pub fn reset(&mut self) {
        log::trace!(
            "frame graph reset: {} passes, {} resources",
            self.passes.len(),
            self.entries.len()
        );
        self.passes.clear();
        self.nodes.clear();
        self.entries.clear();
        self.targets.clear();
        self.target_cache.clear();
        self.aliases.clear();
        self.presented.clear();
        self.compiled = false;
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    pub(crate) fn create_entry(
        &mut self,
        name: String,
        payload: ResourcePayload,
        imported: bool,
    ) -> ResourceHandle {
        let entry_index = self.entries.len() as u32;
        let node_index = self.nodes.len() as u32;
        let mut entry = ResourceEntry::new(name, payload, imported);
        entry.latest_node = node_index;
        self.entries.push(entry);
        self.nodes.push(ResourceNode::new(entry_index, 0));
        ResourceHandle::new(node_index, 0)
    }

    pub(crate) fn entry_of(&self, handle: ResourceHandle) -> &ResourceEntry {
        let node = &self.nodes[handle.node_index()];
        &self.entries[node.entry as usize]
    }

    /// Follow alias links to the node reads are accounted against.
    pub(crate) fn resolve_node(&self, mut index: usize) -> usize {
        let mut hops = 0;
        while let Some(alias) = self.nodes[index].alias {
            index = alias as usize;
            hops += 1;
            if hops > self.nodes.len() {
                log::warn!("alias chain does not terminate; moves form a cycle");
                break;
            }
        }
        index
    }

    /// Record a read declared by `pass`.
    pub(crate) fn record_read(
        &mut self,
        pass: usize,
        handle: ResourceHandle,
        attachment_only: bool,
    ) -> ResourceHandle {
        if !self.is_valid(handle) {
            log::error!(
                "pass '{}' reads a stale handle {handle:?}",
                self.passes[pass].name
            );
            debug_assert!(false, "read of a stale resource handle");
            return handle;
        }
        let node = handle.node_index() as u32;
        if let Some(read) = self.passes[pass]
            .reads
            .iter_mut()
            .find(|r| r.handle.node_index() == node as usize)
        {
            // A sampled read wins over an attachment-only one.
            read.attachment_only &= attachment_only;
        } else {
            self.passes[pass].reads.push(PassRead {
                handle,
                attachment_only,
            });
        }
        handle
    }

    /// Record a write declared by `pass`, re-versioning when needed.
    pub(crate) fn record_write(&mut self, pass: usize, handle: ResourceHandle) -> ResourceHandle {
        if !self.is_valid(handle) {
            log::error!(
                "pass '{}' writes a stale handle {handle:?}",
                self.passes[pass].name
            );
            debug_assert!(false, "write of a stale resource handle");
            return handle;
        }

        let node_index = handle.node_index();
        let entry_index = self.nodes[node_index].entry as usize;

        if self.entries[entry_index].imported {
            // Writing to an imported resource is externally observable.
            self.passes[pass].has_side_effect = true;
        }

        if self.nodes[node_index].writer.is_none() && !self.entries[entry_index].imported {
            // First write is free: claim the node without re-versioning.
            self.nodes[node_index].writer = Some(PassHandle::new(pass as u32));
            self.passes[pass].writes.push(PassWrite {
                handle,
                disconnected: false,
            });
            return handle;
        }

        // The node already has a producer: create a new version. The new
        // content builds on the old, so the pass implicitly reads it.
        self.record_read(pass, handle, true);

        self.entries[entry_index].version += 1;
        let version = self.entries[entry_index].version;
        let new_index = self.nodes.len() as u32;
        let mut node = ResourceNode::new(entry_index as u32, version);
        node.writer = Some(PassHandle::new(pass as u32));
        self.nodes.push(node);
        self.entries[entry_index].latest_node = new_index;

        let new_handle = ResourceHandle::new(new_index, version);
        self.passes[pass].writes.push(PassWrite {
            handle: new_handle,
            disconnected: false,
        });
        new_handle
    }
}
