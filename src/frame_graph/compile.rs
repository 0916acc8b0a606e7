//! Frame graph compilation.
//!
//! Runs after declaration and before execution: resolves recorded moves,
//! computes reference counts, culls unreferenced passes and resources,
//! assigns resource lifetimes, pools concrete render targets and computes
//! per-attachment discard hints.

use crate::backend::types::{RenderTargetInfo, TargetFlags, TextureDescriptor};
use crate::frame_graph::resource::ResourcePayload;
use crate::frame_graph::target::{TargetCacheEntry, TargetKey, ATTACHMENT_SLOTS};
use crate::frame_graph::FrameGraph;

impl FrameGraph {
    /// Compile the graph.
    ///
    /// Derived state is recomputed from the declaration record each time, so
    /// calling this twice without an intervening [`reset`](Self::reset) is
    /// identical to calling it once. Must run before
    /// [`execute`](Self::execute).
    pub fn compile(&mut self) {
        self.reset_derived();
        self.resolve_aliases();
        self.init_ref_counts();
        self.cull();
        self.report_unreachable();
        self.assign_lifetimes();
        self.resolve_targets();
        self.compute_discards();
        self.compiled = true;

        log::trace!(
            "compiled frame graph: {} passes ({} culled), {} resources, {} concrete targets",
            self.passes.len(),
            self.passes.iter().filter(|p| p.culled).count(),
            self.entries.len(),
            self.target_cache.len(),
        );
    }

    /// Clear everything a previous compile may have derived.
    fn reset_derived(&mut self) {
        for node in &mut self.nodes {
            node.read_count = 0;
        }
        for pass in &mut self.passes {
            pass.ref_count = 0;
            pass.culled = false;
        }
        for entry in &mut self.entries {
            entry.ref_count = 0;
            entry.first_use = None;
            entry.last_use = None;
            entry.sampled = false;
            entry.presented = false;
        }
        for target in &mut self.targets {
            target.cache_slot = None;
            target.imported_entry = None;
            target.resolved_entries = [None; ATTACHMENT_SLOTS];
            target.discard_start = TargetFlags::empty();
            target.discard_end = TargetFlags::empty();
        }
        self.target_cache.clear();
    }

    /// Resolve recorded moves.
    ///
    /// For each alias, every node viewing the `to` entry is redirected onto
    /// the `from` entry, and writes recorded to those views before the move
    /// are disconnected. Reads of `to` itself are forwarded to `from`'s node
    /// so the producers of `from` keep their references.
    fn resolve_aliases(&mut self) {
        for i in 0..self.aliases.len() {
            let alias = self.aliases[i];
            let from_node = alias.from.node_index();
            let to_node = alias.to.node_index();
            let from_entry = self.nodes[from_node].entry;
            let to_entry = self.nodes[to_node].entry;

            if to_entry != from_entry {
                let mut redirected = Vec::new();
                for (n, node) in self.nodes.iter_mut().enumerate() {
                    if node.entry == to_entry {
                        node.entry = from_entry;
                        if (n as u32) < alias.watermark {
                            node.writer = None;
                            redirected.push(n);
                        }
                    }
                }
                for pass in &mut self.passes {
                    for write in &mut pass.writes {
                        if redirected.contains(&write.handle.node_index()) {
                            write.disconnected = true;
                        }
                    }
                }
            }

            self.nodes[to_node].alias = Some(from_node as u32);
        }
    }

    /// Initial reference counts: passes count their surviving writes plus a
    /// side-effect pin; nodes count their declared readers; presented
    /// resources count as read once more.
    fn init_ref_counts(&mut self) {
        for p in 0..self.passes.len() {
            let writes = self.passes[p]
                .writes
                .iter()
                .filter(|w| !w.disconnected)
                .count() as u32;
            self.passes[p].ref_count = writes + u32::from(self.passes[p].has_side_effect);

            for r in 0..self.passes[p].reads.len() {
                let read = self.passes[p].reads[r];
                let node = self.resolve_node(read.handle.node_index());
                self.nodes[node].read_count += 1;
                if !read.attachment_only {
                    let entry = self.nodes[node].entry as usize;
                    self.entries[entry].sampled = true;
                }
            }
        }

        for i in 0..self.presented.len() {
            let node = self.resolve_node(self.presented[i].node_index());
            self.nodes[node].read_count += 1;
            let entry = self.nodes[node].entry as usize;
            self.entries[entry].presented = true;
        }
    }

    /// Cull passes whose outputs nobody consumes, propagating through both
    /// passes and resource nodes.
    fn cull(&mut self) {
        let mut stack = Vec::with_capacity(self.nodes.len());
        for n in 0..self.nodes.len() {
            if self.nodes[n].read_count == 0 {
                stack.push(n);
            }
        }

        // Passes with no references at all cannot be retired through their
        // written nodes; cull them directly.
        for p in 0..self.passes.len() {
            if self.passes[p].ref_count == 0 && !self.passes[p].has_side_effect {
                self.cull_pass(p, &mut stack);
            }
        }

        while let Some(node) = stack.pop() {
            let Some(writer) = self.nodes[node].writer else {
                continue;
            };
            let pass = writer.index();
            if self.passes[pass].culled {
                continue;
            }
            debug_assert!(self.passes[pass].ref_count > 0);
            self.passes[pass].ref_count = self.passes[pass].ref_count.saturating_sub(1);
            if self.passes[pass].ref_count == 0 && !self.passes[pass].has_side_effect {
                self.cull_pass(pass, &mut stack);
            }
        }
    }

    /// Mark `pass` culled and release its read references.
    fn cull_pass(&mut self, pass: usize, stack: &mut Vec<usize>) {
        self.passes[pass].culled = true;
        for r in 0..self.passes[pass].reads.len() {
            let read = self.passes[pass].reads[r];
            let node = self.resolve_node(read.handle.node_index());
            debug_assert!(self.nodes[node].read_count > 0);
            self.nodes[node].read_count = self.nodes[node].read_count.saturating_sub(1);
            if self.nodes[node].read_count == 0 {
                stack.push(node);
            }
        }
    }

    /// Report surviving passes with no path to a frame output.
    ///
    /// Cull propagation cannot retire passes that keep each other alive in a
    /// dependency cycle; such declarations are user errors. They are
    /// reported and conservatively kept.
    fn report_unreachable(&self) {
        let mut reachable = vec![false; self.passes.len()];
        let mut frontier = Vec::new();

        for p in 0..self.passes.len() {
            if !self.passes[p].culled && self.passes[p].has_side_effect {
                reachable[p] = true;
                frontier.push(p);
            }
        }
        for handle in &self.presented {
            let node = self.resolve_node(handle.node_index());
            if let Some(writer) = self.nodes[node].writer {
                let p = writer.index();
                if !self.passes[p].culled && !reachable[p] {
                    reachable[p] = true;
                    frontier.push(p);
                }
            }
        }

        while let Some(p) = frontier.pop() {
            for read in &self.passes[p].reads {
                let node = self.resolve_node(read.handle.node_index());
                if let Some(writer) = self.nodes[node].writer {
                    let w = writer.index();
                    if !self.passes[w].culled && !reachable[w] {
                        reachable[w] = true;
                        frontier.push(w);
                    }
                }
            }
        }

        for p in 0..self.passes.len() {
            if !self.passes[p].culled && !reachable[p] {
                log::warn!(
                    "pass '{}' keeps {} reference(s) but has no path to a frame output; \
                     possible dependency cycle",
                    self.passes[p].name,
                    self.passes[p].ref_count,
                );
            }
        }
    }

    /// Walk surviving passes in declaration order and fit each entry's
    /// `[first_use, last_use]` interval to them.
    fn assign_lifetimes(&mut self) {
        for p in 0..self.passes.len() {
            if self.passes[p].culled {
                continue;
            }
            let index = p as u32;
            for r in 0..self.passes[p].reads.len() {
                let read = self.passes[p].reads[r];
                let node = self.resolve_node(read.handle.node_index());
                let entry = self.nodes[node].entry as usize;
                self.entries[entry].extend_lifetime(index);
                self.entries[entry].ref_count += 1;
            }
            for w in 0..self.passes[p].writes.len() {
                let write = self.passes[p].writes[w];
                if write.disconnected {
                    continue;
                }
                let entry = self.nodes[write.handle.node_index()].entry as usize;
                self.entries[entry].extend_lifetime(index);
            }
        }
    }

    /// Assign each surviving virtual target a concrete cache slot.
    ///
    /// Targets with the same resolved attachments share a slot outright;
    /// a slot whose owners' interval has expired is handed over to a target
    /// of the same structural shape with a disjoint lifetime.
    fn resolve_targets(&mut self) {
        for t in 0..self.targets.len() {
            let owner = self.targets[t].pass.index();
            if self.passes[owner].culled {
                continue;
            }

            let slots = self.targets[t].desc.attachments.slots();
            let mut imported_entry = None;
            let mut bound = 0;
            for (_, texture) in slots {
                if let Some(texture) = texture {
                    bound += 1;
                    let entry = self.nodes[texture.raw().node_index()].entry as usize;
                    if matches!(self.entries[entry].payload, ResourcePayload::Target { .. }) {
                        imported_entry = Some(entry as u32);
                    }
                }
            }

            if let Some(entry) = imported_entry {
                if bound > 1 {
                    log::warn!(
                        "render target '{}': extra attachments alongside an imported target \
                         are ignored",
                        self.targets[t].name
                    );
                }
                self.targets[t].imported_entry = Some(entry);
                continue;
            }

            let key = self.target_key(t);
            self.targets[t].resolved_entries = key.entries;
            let first = owner as u32;
            let last = owner as u32;

            let slot = if let Some(s) = self
                .target_cache
                .iter()
                .position(|c| c.matches_identity(&key))
            {
                let cached = &mut self.target_cache[s];
                cached.first_use = cached.first_use.min(first);
                cached.last_use = cached.last_use.max(last);
                cached.users.push(t as u32);
                s
            } else if let Some(s) = self
                .target_cache
                .iter()
                .position(|c| c.matches_shape(&key) && c.last_use < first)
            {
                let cached = &mut self.target_cache[s];
                cached.key = key;
                cached.last_use = last;
                cached.users.push(t as u32);
                s
            } else {
                self.target_cache.push(TargetCacheEntry {
                    name: self.targets[t].name.clone(),
                    key,
                    first_use: first,
                    last_use: last,
                    users: vec![t as u32],
                    concrete: None,
                    bound_attachments: None,
                });
                self.target_cache.len() - 1
            };
            self.targets[t].cache_slot = Some(slot as u32);
        }
    }

    fn target_key(&self, t: usize) -> TargetKey {
        let target = &self.targets[t];
        let mut entries = [None; ATTACHMENT_SLOTS];
        let mut specs: [Option<TextureDescriptor>; ATTACHMENT_SLOTS] = Default::default();
        let mut width = 0;
        let mut height = 0;
        let mut samples = u32::from(target.desc.samples);

        for (i, (_, texture)) in target.desc.attachments.slots().iter().enumerate() {
            let Some(texture) = texture else { continue };
            let entry = self.nodes[texture.raw().node_index()].entry as usize;
            entries[i] = Some(entry as u32);
            if let ResourcePayload::Texture { desc, .. } = &self.entries[entry].payload {
                specs[i] = Some(desc.clone());
                width = desc.width;
                height = desc.height;
                samples = samples.max(desc.sample_count);
            }
        }

        TargetKey {
            entries,
            specs,
            info: RenderTargetInfo {
                width,
                height,
                samples: samples as u8,
            },
        }
    }

    /// Compute per-attachment discard hints for surviving targets.
    ///
    /// An attachment whose contents are undefined or replaced on entry to
    /// the pass is discarded at the start; one with no later reader is
    /// discarded at the end. Imported targets carry caller-supplied flags.
    fn compute_discards(&mut self) {
        for t in 0..self.targets.len() {
            let owner = self.targets[t].pass.index();
            if self.passes[owner].culled {
                continue;
            }

            if let Some(entry) = self.targets[t].imported_entry {
                let entry = entry as usize;
                self.targets[t].discard_start = self.entries[entry].discard_start;
                self.targets[t].discard_end = self.entries[entry].discard_end;
                continue;
            }

            let pass_index = owner as u32;
            let mut start = TargetFlags::empty();
            let mut end = TargetFlags::empty();

            for (flag, texture) in self.targets[t].desc.attachments.slots() {
                let Some(texture) = texture else { continue };
                let entry = self.nodes[texture.raw().node_index()].entry as usize;
                if self.entries[entry].imported {
                    continue;
                }
                let cleared = self.targets[t].clear.contains(flag);
                if cleared || self.entries[entry].first_use == Some(pass_index) {
                    start |= flag;
                }
                if !self.entries[entry].presented && self.entries[entry].last_use == Some(pass_index)
                {
                    end |= flag;
                }
            }

            self.targets[t].discard_start = start;
            self.targets[t].discard_end = end;
        }
    }
}
