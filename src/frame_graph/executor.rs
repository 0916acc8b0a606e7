//! Frame graph execution.
//!
//! Walks surviving passes in declaration order. Before each pass, resources
//! whose first use is that pass are instantiated and the pass's render
//! target is bound; after the callback, resources whose last use is that
//! pass are released and the command stream is flushed.

use crate::backend::types::{TargetFlags, TextureDescriptor, TextureUsage, MAX_COLOR_ATTACHMENTS};
use crate::backend::{
    BackendResult, ConcreteAttachments, RenderBackend, TargetHandle, TextureHandle,
};
use crate::frame_graph::pass::PassResources;
use crate::frame_graph::resource::ResourcePayload;
use crate::frame_graph::FrameGraph;

/// Per-frame free list of concrete textures.
///
/// Released textures are parked here keyed by descriptor; a later
/// acquisition with an equal descriptor reuses the parked object instead of
/// creating a new one. Whatever is still parked when the frame ends is
/// destroyed.
#[derive(Default)]
struct TexturePool {
    free: Vec<(TextureDescriptor, TextureHandle)>,
}

impl TexturePool {
    fn acquire(
        &mut self,
        backend: &mut dyn RenderBackend,
        name: &str,
        desc: &TextureDescriptor,
    ) -> BackendResult<TextureHandle> {
        if let Some(pos) = self.free.iter().position(|(parked, _)| parked == desc) {
            let (_, handle) = self.free.swap_remove(pos);
            log::trace!("texture '{name}' reuses a pooled allocation");
            Ok(handle)
        } else {
            backend.create_texture(name, desc)
        }
    }

    fn release(&mut self, desc: TextureDescriptor, handle: TextureHandle) {
        self.free.push((desc, handle));
    }

    fn flush(&mut self, backend: &mut dyn RenderBackend) {
        for (_, handle) in self.free.drain(..) {
            backend.destroy_texture(handle);
        }
    }
}

impl FrameGraph {
    /// Execute all surviving passes in declaration order, then reset the
    /// graph for the next frame.
    ///
    /// On a backend failure the error is surfaced after every
    /// already-instantiated resource has been destroyed; the graph is left
    /// compiled so it can still be inspected or exported.
    pub fn execute(&mut self, backend: &mut dyn RenderBackend) -> BackendResult<()> {
        assert!(self.compiled, "execute() called before compile()");

        let mut pool = TexturePool::default();
        let result = self.run_passes(backend, &mut pool);
        self.release_remaining(backend, &mut pool);
        pool.flush(backend);
        if result.is_ok() {
            self.reset();
        }
        result
    }

    fn run_passes(
        &mut self,
        backend: &mut dyn RenderBackend,
        pool: &mut TexturePool,
    ) -> BackendResult<()> {
        for index in 0..self.passes.len() {
            if self.passes[index].culled {
                continue;
            }

            self.instantiate_for(index, backend, pool)?;

            let mut discard_end = TargetFlags::empty();
            let mut bound = false;
            if let Some(&target) = self.passes[index].targets.first() {
                let target = target as usize;
                let handle = self.realize_target(target, backend)?;
                backend.begin_render_pass(
                    handle,
                    self.targets[target].clear,
                    self.targets[target].discard_start,
                );
                discard_end = self.targets[target].discard_end;
                bound = true;
            }

            if let Some(execute) = self.passes[index].executor.take() {
                let resources = PassResources::new(self, index);
                execute(&resources, backend);
            }

            if bound {
                backend.end_render_pass(discard_end);
            }

            self.release_for(index, backend, pool);
            backend.flush();
        }
        Ok(())
    }

    /// Instantiate every entry whose first use is the pass at `index`.
    fn instantiate_for(
        &mut self,
        index: usize,
        backend: &mut dyn RenderBackend,
        pool: &mut TexturePool,
    ) -> BackendResult<()> {
        for e in 0..self.entries.len() {
            if self.entries[e].imported || self.entries[e].first_use != Some(index as u32) {
                continue;
            }
            let name = self.entries[e].name.clone();
            let sampled = self.entries[e].sampled;
            match &mut self.entries[e].payload {
                ResourcePayload::Texture { desc, concrete } => {
                    if concrete.is_some() {
                        continue;
                    }
                    if !sampled {
                        // Attachment-only consumers let us drop the sampled
                        // usage before creation.
                        desc.usage.remove(TextureUsage::TEXTURE_BINDING);
                    }
                    let handle = pool.acquire(backend, &name, desc)?;
                    *concrete = Some(handle);
                    log::trace!("instantiated texture '{name}' before pass {index}");
                }
                ResourcePayload::Buffer { desc, concrete } => {
                    if concrete.is_some() {
                        continue;
                    }
                    let handle = backend.create_buffer(&name, desc)?;
                    *concrete = Some(handle);
                    log::trace!("instantiated buffer '{name}' before pass {index}");
                }
                ResourcePayload::Target { .. } => {}
            }
        }
        Ok(())
    }

    /// Release every entry whose last use is the pass at `index`.
    fn release_for(
        &mut self,
        index: usize,
        backend: &mut dyn RenderBackend,
        pool: &mut TexturePool,
    ) {
        for e in 0..self.entries.len() {
            if self.entries[e].imported || self.entries[e].last_use != Some(index as u32) {
                continue;
            }
            match &mut self.entries[e].payload {
                ResourcePayload::Texture { desc, concrete } => {
                    if let Some(handle) = concrete.take() {
                        pool.release(desc.clone(), handle);
                    }
                }
                ResourcePayload::Buffer { concrete, .. } => {
                    if let Some(handle) = concrete.take() {
                        backend.destroy_buffer(handle);
                    }
                }
                ResourcePayload::Target { .. } => {}
            }
        }
    }

    /// Destroy whatever is still instantiated, including concrete targets.
    fn release_remaining(&mut self, backend: &mut dyn RenderBackend, pool: &mut TexturePool) {
        for e in 0..self.entries.len() {
            if self.entries[e].imported {
                continue;
            }
            match &mut self.entries[e].payload {
                ResourcePayload::Texture { desc, concrete } => {
                    if let Some(handle) = concrete.take() {
                        pool.release(desc.clone(), handle);
                    }
                }
                ResourcePayload::Buffer { concrete, .. } => {
                    if let Some(handle) = concrete.take() {
                        backend.destroy_buffer(handle);
                    }
                }
                ResourcePayload::Target { .. } => {}
            }
        }
        for slot in &mut self.target_cache {
            if let Some(handle) = slot.concrete.take() {
                backend.destroy_render_target(handle);
            }
            slot.bound_attachments = None;
        }
    }

    /// Get (creating or reusing) the concrete target for a virtual target.
    fn realize_target(
        &mut self,
        target: usize,
        backend: &mut dyn RenderBackend,
    ) -> BackendResult<TargetHandle> {
        if let Some(entry) = self.targets[target].imported_entry {
            match &self.entries[entry as usize].payload {
                ResourcePayload::Target { concrete, .. } => return Ok(*concrete),
                _ => panic!(
                    "imported target '{}' has no concrete backend target",
                    self.entries[entry as usize].name
                ),
            }
        }

        let slot = match self.targets[target].cache_slot {
            Some(slot) => slot as usize,
            None => panic!(
                "render target '{}' was not assigned a concrete slot",
                self.targets[target].name
            ),
        };

        let attachments = self.resolve_attachments(target);
        let cached = &mut self.target_cache[slot];
        if let (Some(handle), Some(bound)) = (cached.concrete, cached.bound_attachments) {
            if bound == attachments {
                return Ok(handle);
            }
            // The slot was handed over to attachments the pool did not end
            // up unifying; rebind by recreating.
            backend.destroy_render_target(handle);
            cached.concrete = None;
        }

        let name = cached.name.clone();
        let info = cached.key.info;
        let handle = backend.create_render_target(&name, &info, &attachments)?;
        let cached = &mut self.target_cache[slot];
        cached.concrete = Some(handle);
        cached.bound_attachments = Some(attachments);
        Ok(handle)
    }

    /// Map a virtual target's resolved entries to their concrete textures.
    fn resolve_attachments(&self, target: usize) -> ConcreteAttachments {
        let entries = &self.targets[target].resolved_entries;
        let mut attachments = ConcreteAttachments::default();
        for (i, entry) in entries.iter().enumerate() {
            let Some(entry) = entry else { continue };
            let entry = *entry as usize;
            let concrete = match &self.entries[entry].payload {
                ResourcePayload::Texture {
                    concrete: Some(concrete),
                    ..
                } => *concrete,
                _ => panic!(
                    "attachment '{}' is not instantiated",
                    self.entries[entry].name
                ),
            };
            if i < MAX_COLOR_ATTACHMENTS {
                attachments.color[i] = Some(concrete);
            } else if i == MAX_COLOR_ATTACHMENTS {
                attachments.depth = Some(concrete);
            } else {
                attachments.stencil = Some(concrete);
            }
        }
        attachments
    }
}
