//! Pass declaration API.
//!
//! A [`Builder`] exists only for the duration of a pass's setup callback. It
//! creates virtual resources, records reads and writes, and registers the
//! pass's render targets. Declaration mistakes (stale handles, undeclared
//! attachments, mismatched attachment shapes) are logged and rejected, and
//! abort in debug builds.

use crate::backend::types::{TargetFlags, TextureDescriptor};
use crate::backend::BufferDescriptor;
use crate::frame_graph::handle::{BufferId, ResourceHandle, TextureId, TypedHandle};
use crate::frame_graph::resource::{ResourceKind, ResourcePayload};
use crate::frame_graph::target::{RenderTargetDescriptor, TargetAttachments, VirtualTarget};
use crate::frame_graph::{FrameGraph, PassHandle};

/// Declares the resources used by one pass.
pub struct Builder<'a> {
    graph: &'a mut FrameGraph,
    pass: usize,
}

impl<'a> Builder<'a> {
    pub(crate) fn new(graph: &'a mut FrameGraph, pass: usize) -> Self {
        Self { graph, pass }
    }

    /// Name of the pass being built.
    pub fn pass_name(&self) -> &str {
        &self.graph.passes[self.pass].name
    }

    /// Create a virtual texture.
    ///
    /// No concrete resource is allocated until the executor reaches the
    /// first pass that uses it.
    pub fn create_texture(&mut self, name: &str, desc: TextureDescriptor) -> TextureId {
        let handle = self.graph.create_entry(
            name.to_string(),
            ResourcePayload::Texture {
                desc,
                concrete: None,
            },
            false,
        );
        TypedHandle::from_raw(handle)
    }

    /// Create a virtual buffer.
    pub fn create_buffer(&mut self, name: &str, desc: BufferDescriptor) -> BufferId {
        let handle = self.graph.create_entry(
            name.to_string(),
            ResourcePayload::Buffer {
                desc,
                concrete: None,
            },
            false,
        );
        TypedHandle::from_raw(handle)
    }

    /// Declare that this pass reads `input`, sampled as a texture.
    pub fn read<K: ResourceKind>(&mut self, input: TypedHandle<K>) -> TypedHandle<K> {
        TypedHandle::from_raw(self.graph.record_read(self.pass, input.raw(), false))
    }

    /// Declare that this pass consumes `input` as an attachment only, never
    /// sampled. Lets the compiler drop the sampled-usage requirement when
    /// instantiating the resource.
    pub fn read_as_attachment(&mut self, input: TextureId) -> TextureId {
        TypedHandle::from_raw(self.graph.record_read(self.pass, input.raw(), true))
    }

    /// Declare that this pass writes `output`.
    ///
    /// If the resource already has a producer (or is imported) the write
    /// creates a new version and the returned handle replaces `output`,
    /// which becomes invalid.
    pub fn write<K: ResourceKind>(&mut self, output: TypedHandle<K>) -> TypedHandle<K> {
        TypedHandle::from_raw(self.graph.record_write(self.pass, output.raw()))
    }

    /// Register a render target for this pass.
    ///
    /// Every attachment must have been passed to [`read`](Self::read) or
    /// [`write`](Self::write) on this builder beforehand, and all attachments
    /// must agree on dimensions and sample count.
    pub fn create_render_target(
        &mut self,
        name: &str,
        desc: RenderTargetDescriptor,
        clear: TargetFlags,
    ) {
        if !self.validate_target(name, &desc) {
            debug_assert!(false, "invalid render target declaration '{name}'");
            return;
        }
        let index = self.graph.targets.len() as u32;
        self.graph.targets.push(VirtualTarget::new(
            name.to_string(),
            desc,
            clear,
            PassHandle::new(self.pass as u32),
        ));
        self.graph.passes[self.pass].targets.push(index);
    }

    /// Write `texture` and register it as the single color attachment of a
    /// new render target. Returns the post-write handle.
    pub fn create_color_target(
        &mut self,
        name: &str,
        texture: TextureId,
        clear: TargetFlags,
    ) -> TextureId {
        let written = self.write(texture);
        self.create_render_target(
            name,
            RenderTargetDescriptor::new(TargetAttachments::new().with_color(0, written)),
            clear,
        );
        written
    }

    /// Mark this pass as having side effects outside the frame graph,
    /// preventing it from being culled.
    pub fn side_effect(&mut self) -> &mut Self {
        self.graph.passes[self.pass].has_side_effect = true;
        self
    }

    /// Debug name of the resource behind `handle`.
    pub fn name_of(&self, handle: impl Into<ResourceHandle>) -> &str {
        self.graph.name_of(handle)
    }

    /// Descriptor of a texture resource.
    pub fn texture_descriptor(&self, id: TextureId) -> &TextureDescriptor {
        self.graph.texture_descriptor(id)
    }

    /// Whether `id` is attached to some render target declared so far.
    pub fn is_attachment(&self, id: TextureId) -> bool {
        self.find_attachment_target(id).is_some()
    }

    /// Sample count of the render target `id` is attached to, or 1 if it is
    /// not an attachment.
    pub fn sample_count(&self, id: TextureId) -> u8 {
        self.find_attachment_target(id)
            .map_or(1, |target| target.desc.samples)
    }

    fn find_attachment_target(&self, id: TextureId) -> Option<&VirtualTarget> {
        let entry = self.graph.nodes[id.raw().node_index()].entry;
        self.graph.targets.iter().find(|target| {
            target
                .desc
                .attachments
                .slots()
                .iter()
                .any(|(_, texture)| match texture {
                    Some(texture) => {
                        self.graph.nodes[texture.raw().node_index()].entry == entry
                    }
                    None => false,
                })
        })
    }

    fn validate_target(&self, name: &str, desc: &RenderTargetDescriptor) -> bool {
        let pass = &self.graph.passes[self.pass];
        let mut dimensions = None;
        let mut samples = None;
        let mut any = false;

        for (_, texture) in desc.attachments.slots() {
            let Some(texture) = texture else { continue };
            any = true;
            let node = texture.raw().node_index() as u32;
            if !pass.reads_node(node) && !pass.writes_node(node) {
                log::error!(
                    "render target '{name}': attachment '{}' was not read or written by pass '{}'",
                    self.graph.name_of(texture),
                    pass.name
                );
                return false;
            }

            let entry = self.graph.entry_of(texture.raw());
            let dim = entry.dimensions();
            if *dimensions.get_or_insert(dim) != dim {
                log::error!("render target '{name}': attachments disagree on dimensions");
                return false;
            }
            let sample = entry.samples();
            if *samples.get_or_insert(sample) != sample {
                log::error!("render target '{name}': attachments disagree on sample count");
                return false;
            }
            if let Some(sample) = sample {
                if desc.samples > 1 && u32::from(desc.samples) != sample && sample != 1 {
                    log::error!("render target '{name}': sample count conflicts with attachments");
                    return false;
                }
            }
        }

        if !any {
            log::error!("render target '{name}' has no attachments");
            return false;
        }
        true
    }
}
