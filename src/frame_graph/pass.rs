//! Pass nodes and the execute-phase resource view.

use crate::backend::{BufferHandle, RenderBackend, TextureHandle};
use crate::frame_graph::handle::{BufferId, ResourceHandle, TextureId};
use crate::frame_graph::resource::ResourcePayload;
use crate::frame_graph::FrameGraph;

/// Handle to a pass in the frame graph.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is only valid within
/// the `FrameGraph` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle and declared data of a pass returned by
/// [`FrameGraph::add_pass`](crate::frame_graph::FrameGraph::add_pass).
///
/// The data is the copy filled in by the pass's setup callback, so later
/// passes can consume the handles it produced.
pub struct PassRef<D> {
    handle: PassHandle,
    data: D,
}

impl<D> PassRef<D> {
    pub(crate) fn new(handle: PassHandle, data: D) -> Self {
        Self { handle, data }
    }

    /// The pass handle.
    pub fn handle(&self) -> PassHandle {
        self.handle
    }

    /// The data declared by the setup callback.
    pub fn data(&self) -> &D {
        &self.data
    }
}

/// Deferred execution callback of a pass.
pub(crate) type ExecuteFn = Box<dyn for<'a> FnOnce(&PassResources<'a>, &mut dyn RenderBackend)>;

/// A declared read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassRead {
    pub(crate) handle: ResourceHandle,
    /// The pass consumes the resource as an attachment only, never sampled.
    pub(crate) attachment_only: bool,
}

/// A declared write.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassWrite {
    pub(crate) handle: ResourceHandle,
    /// Disconnected by alias resolution; contributes nothing to refcounts.
    pub(crate) disconnected: bool,
}

/// Metadata about a pass in the graph.
pub(crate) struct PassNode {
    pub(crate) name: String,
    pub(crate) reads: Vec<PassRead>,
    pub(crate) writes: Vec<PassWrite>,
    /// Virtual render targets declared by this pass.
    pub(crate) targets: Vec<u32>,
    pub(crate) has_side_effect: bool,
    /// Derived during compile.
    pub(crate) ref_count: u32,
    pub(crate) culled: bool,
    pub(crate) executor: Option<ExecuteFn>,
}

impl PassNode {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            reads: Vec::new(),
            writes: Vec::new(),
            targets: Vec::new(),
            has_side_effect: false,
            ref_count: 0,
            culled: false,
            executor: None,
        }
    }

    pub(crate) fn reads_node(&self, node: u32) -> bool {
        self.reads
            .iter()
            .any(|r| r.handle.node_index() == node as usize)
    }

    pub(crate) fn writes_node(&self, node: u32) -> bool {
        self.writes
            .iter()
            .any(|w| !w.disconnected && w.handle.node_index() == node as usize)
    }
}

/// Maps declared handles to concrete backend resources during execute.
///
/// Handed to each pass's execute callback; only resources the pass declared
/// in its setup callback may be looked up.
pub struct PassResources<'a> {
    graph: &'a FrameGraph,
    pass: usize,
}

impl<'a> PassResources<'a> {
    pub(crate) fn new(graph: &'a FrameGraph, pass: usize) -> Self {
        Self { graph, pass }
    }

    /// Name of the executing pass.
    pub fn pass_name(&self) -> &str {
        &self.graph.passes[self.pass].name
    }

    /// The concrete texture behind `id`.
    ///
    /// Panics if the pass did not declare the resource or if it is not
    /// instantiated (the compiler guarantees instantiation for every declared
    /// resource of a surviving pass).
    pub fn texture(&self, id: TextureId) -> TextureHandle {
        let entry = self.declared_entry(id.raw());
        match &entry.payload {
            ResourcePayload::Texture {
                concrete: Some(concrete),
                ..
            } => *concrete,
            ResourcePayload::Texture { concrete: None, .. } => {
                panic!("resource '{}' is not instantiated", entry.name)
            }
            _ => panic!("resource '{}' is not a texture", entry.name),
        }
    }

    /// The concrete buffer behind `id`.
    pub fn buffer(&self, id: BufferId) -> BufferHandle {
        let entry = self.declared_entry(id.raw());
        match &entry.payload {
            ResourcePayload::Buffer {
                concrete: Some(concrete),
                ..
            } => *concrete,
            ResourcePayload::Buffer { concrete: None, .. } => {
                panic!("resource '{}' is not instantiated", entry.name)
            }
            _ => panic!("resource '{}' is not a buffer", entry.name),
        }
    }

    fn declared_entry(&self, handle: ResourceHandle) -> &'a crate::frame_graph::resource::ResourceEntry {
        let node = handle.node_index();
        debug_assert!(
            self.graph.passes[self.pass].reads_node(node as u32)
                || self.graph.passes[self.pass].writes_node(node as u32),
            "pass '{}' did not declare resource node {}",
            self.graph.passes[self.pass].name,
            node,
        );
        let entry = self.graph.nodes[node].entry as usize;
        &self.graph.entries[entry]
    }
}
