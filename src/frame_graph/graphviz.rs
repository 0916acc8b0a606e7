//! Graphviz export of the frame graph for debugging.

use std::fmt;

use crate::frame_graph::FrameGraph;

impl FrameGraph {
    /// Write the graph in graphviz dot format.
    ///
    /// Passes are boxes (dashed once culled), resource entries are ellipses
    /// (dashed once compiled away). Read edges run entry to pass, write
    /// edges pass to entry, and recorded moves appear as dashed
    /// entry-to-entry edges. Labels carry the name, reference count and
    /// assigned lifetime.
    pub fn export_graphviz<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "digraph framegraph {{")?;
        writeln!(out, "    rankdir = LR")?;
        writeln!(out, "    node [fontname=\"helvetica\", fontsize=10]")?;

        for (i, pass) in self.passes.iter().enumerate() {
            let style = if pass.culled { "dashed" } else { "solid" };
            writeln!(
                out,
                "    \"P{i}\" [label=\"{}\\nrefs: {}, seq: {i}\", shape=box, style={style}]",
                pass.name, pass.ref_count,
            )?;
        }

        for (e, entry) in self.entries.iter().enumerate() {
            let style = if self.compiled && entry.first_use.is_none() {
                "dashed"
            } else {
                "solid"
            };
            let imported = if entry.imported { ", imported" } else { "" };
            let lifetime = match (entry.first_use, entry.last_use) {
                (Some(first), Some(last)) => format!("first: {first}, last: {last}"),
                _ => "first: -, last: -".to_string(),
            };
            writeln!(
                out,
                "    \"R{e}\" [label=\"{}\\nrefs: {}, {lifetime}{imported}\", \
                 shape=ellipse, style={style}]",
                entry.name, entry.ref_count,
            )?;
        }

        let mut edges: Vec<(String, String)> = Vec::new();
        for (i, pass) in self.passes.iter().enumerate() {
            for read in &pass.reads {
                let entry = self.nodes[self.resolve_node(read.handle.node_index())].entry;
                edges.push((format!("R{entry}"), format!("P{i}")));
            }
            for write in &pass.writes {
                if write.disconnected {
                    continue;
                }
                let entry = self.nodes[write.handle.node_index()].entry;
                edges.push((format!("P{i}"), format!("R{entry}")));
            }
        }
        edges.sort();
        edges.dedup();
        for (from, to) in &edges {
            writeln!(out, "    \"{from}\" -> \"{to}\"")?;
        }

        for alias in &self.aliases {
            writeln!(
                out,
                "    \"R{}\" -> \"R{}\" [style=dashed]",
                alias.to_entry, alias.from_entry,
            )?;
        }

        writeln!(out, "}}")
    }
}
