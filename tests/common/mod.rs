//! Shared test doubles for frame graph integration tests.

use std::collections::HashSet;

use framegraph::{
    BackendError, BackendResult, BufferDescriptor, BufferHandle, ConcreteAttachments,
    RenderBackend, RenderTargetInfo, TargetFlags, TargetHandle, TextureDescriptor, TextureHandle,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    CreateTexture(String, TextureHandle),
    DestroyTexture(TextureHandle),
    CreateBuffer(String, BufferHandle),
    DestroyBuffer(BufferHandle),
    CreateTarget(String, TargetHandle),
    DestroyTarget(TargetHandle),
    BeginPass(TargetHandle, TargetFlags, TargetFlags),
    EndPass(TargetFlags),
    Flush,
}

/// A backend that records every call and tracks live objects.
#[derive(Default)]
pub struct RecordingBackend {
    next_id: u64,
    pub events: Vec<BackendEvent>,
    pub live_textures: HashSet<TextureHandle>,
    pub live_buffers: HashSet<BufferHandle>,
    pub live_targets: HashSet<TargetHandle>,
    /// When set, creating a texture with this name fails.
    pub fail_texture: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Number of `CreateTexture` calls recorded.
    pub fn texture_creations(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BackendEvent::CreateTexture(..)))
            .count()
    }

    /// Number of `DestroyTexture` calls recorded.
    pub fn texture_destructions(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BackendEvent::DestroyTexture(..)))
            .count()
    }

    /// Number of `CreateTarget` calls recorded.
    pub fn target_creations(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BackendEvent::CreateTarget(..)))
            .count()
    }

    /// The concrete handle created for the texture named `name`, if any.
    pub fn created_texture(&self, name: &str) -> Option<TextureHandle> {
        self.events.iter().find_map(|e| match e {
            BackendEvent::CreateTexture(n, handle) if n == name => Some(*handle),
            _ => None,
        })
    }

    /// Whether anything created is still alive.
    pub fn has_leaks(&self) -> bool {
        !self.live_textures.is_empty()
            || !self.live_buffers.is_empty()
            || !self.live_targets.is_empty()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_texture(
        &mut self,
        name: &str,
        _desc: &TextureDescriptor,
    ) -> BackendResult<TextureHandle> {
        if self.fail_texture.as_deref() == Some(name) {
            return Err(BackendError::TextureCreationFailed(format!(
                "injected failure for '{name}'"
            )));
        }
        let handle = TextureHandle::from_raw(self.next());
        self.live_textures.insert(handle);
        self.events
            .push(BackendEvent::CreateTexture(name.to_string(), handle));
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        assert!(
            self.live_textures.remove(&texture),
            "destroying unknown texture {texture:?}"
        );
        self.events.push(BackendEvent::DestroyTexture(texture));
    }

    fn create_buffer(
        &mut self,
        name: &str,
        _desc: &BufferDescriptor,
    ) -> BackendResult<BufferHandle> {
        let handle = BufferHandle::from_raw(self.next());
        self.live_buffers.insert(handle);
        self.events
            .push(BackendEvent::CreateBuffer(name.to_string(), handle));
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        assert!(
            self.live_buffers.remove(&buffer),
            "destroying unknown buffer {buffer:?}"
        );
        self.events.push(BackendEvent::DestroyBuffer(buffer));
    }

    fn create_render_target(
        &mut self,
        name: &str,
        _info: &RenderTargetInfo,
        attachments: &ConcreteAttachments,
    ) -> BackendResult<TargetHandle> {
        for texture in attachments.color.iter().flatten() {
            assert!(
                self.live_textures.contains(texture),
                "target '{name}' binds a dead texture {texture:?}"
            );
        }
        let handle = TargetHandle::from_raw(self.next());
        self.live_targets.insert(handle);
        self.events
            .push(BackendEvent::CreateTarget(name.to_string(), handle));
        Ok(handle)
    }

    fn destroy_render_target(&mut self, target: TargetHandle) {
        assert!(
            self.live_targets.remove(&target),
            "destroying unknown target {target:?}"
        );
        self.events.push(BackendEvent::DestroyTarget(target));
    }

    fn begin_render_pass(
        &mut self,
        target: TargetHandle,
        clear: TargetFlags,
        discard_start: TargetFlags,
    ) {
        self.events
            .push(BackendEvent::BeginPass(target, clear, discard_start));
    }

    fn end_render_pass(&mut self, discard_end: TargetFlags) {
        self.events.push(BackendEvent::EndPass(discard_end));
    }

    fn flush(&mut self) {
        self.events.push(BackendEvent::Flush);
    }
}
