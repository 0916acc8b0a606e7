//! Versioned handles onto virtual resources.
//!
//! A handle names a resource node together with the node's version at the
//! time the handle was produced. Writing through a handle re-versions the
//! resource and invalidates every previously issued handle, so stale access
//! is caught in O(1) without back-references.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::frame_graph::resource::ResourceKind;

/// Untyped handle to a versioned resource node.
///
/// Only valid within the [`FrameGraph`](crate::frame_graph::FrameGraph) that
/// issued it, and only until the resource is re-versioned by a write or a
/// move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    node: u32,
    version: u32,
}

impl ResourceHandle {
    pub(crate) fn new(node: u32, version: u32) -> Self {
        Self { node, version }
    }

    pub(crate) fn node_index(self) -> usize {
        self.node as usize
    }

    /// The version of the resource this handle was issued for.
    pub fn version(self) -> u32 {
        self.version
    }
}

/// Typed handle carrying the resource kind at compile time.
///
/// A thin wrapper over [`ResourceHandle`]; the phantom kind keeps texture and
/// buffer handles from being mixed up at pass boundaries.
pub struct TypedHandle<K: ResourceKind> {
    raw: ResourceHandle,
    _kind: PhantomData<K>,
}

/// Handle to a virtual texture.
pub type TextureId = TypedHandle<crate::frame_graph::resource::Texture>;

/// Handle to a virtual buffer.
pub type BufferId = TypedHandle<crate::frame_graph::resource::Buffer>;

impl<K: ResourceKind> TypedHandle<K> {
    pub(crate) fn from_raw(raw: ResourceHandle) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    /// The underlying untyped handle.
    pub fn raw(self) -> ResourceHandle {
        self.raw
    }
}

impl<K: ResourceKind> From<TypedHandle<K>> for ResourceHandle {
    fn from(handle: TypedHandle<K>) -> Self {
        handle.raw
    }
}

// Manual impls: deriving would put bounds on `K`, which is only a marker.

impl<K: ResourceKind> Clone for TypedHandle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ResourceKind> Copy for TypedHandle<K> {}

impl<K: ResourceKind> PartialEq for TypedHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: ResourceKind> Eq for TypedHandle<K> {}

impl<K: ResourceKind> Hash for TypedHandle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: ResourceKind> fmt::Debug for TypedHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}.v{})", K::NAME, self.raw.node, self.raw.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_graph::resource::Texture;

    #[test]
    fn test_handle_version() {
        let h = ResourceHandle::new(3, 1);
        assert_eq!(h.node_index(), 3);
        assert_eq!(h.version(), 1);
    }

    #[test]
    fn test_typed_handle_round_trip() {
        let raw = ResourceHandle::new(7, 0);
        let typed = TypedHandle::<Texture>::from_raw(raw);
        assert_eq!(typed.raw(), raw);
        assert_eq!(ResourceHandle::from(typed), raw);
        assert_eq!(typed, TypedHandle::<Texture>::from_raw(raw));
    }
}
