//! Shared descriptor and flag types consumed by the frame graph.

use bitflags::bitflags;

/// Maximum number of color attachments on a render target.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;

/// Texture format enumeration.
///
/// A reduced set covering the formats render passes actually attach or sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 16-bit float red channel.
    R16Float,
    /// 32-bit float red channel.
    R32Float,
    /// 8-bit RGBA, unsigned normalized (default).
    #[default]
    Rgba8Unorm,
    /// 8-bit BGRA, unsigned normalized. Common swapchain format.
    Bgra8Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 10-bit RGB with 2-bit alpha, unsigned normalized.
    Rgb10A2Unorm,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 8-bit stencil.
    Stencil8,
}

impl TextureFormat {
    /// Returns true if the format has a depth component.
    pub fn has_depth(&self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24PlusStencil8)
    }

    /// Returns true if the format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Stencil8)
    }

    /// Returns true if the format is a pure color format.
    pub fn is_color(&self) -> bool {
        !self.has_depth() && !self.has_stencil()
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 0;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 1;
        /// Buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be bound as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 4;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 5;
    }
}

bitflags! {
    /// Attachment-slot flags of a render target.
    ///
    /// Used both as clear masks (which attachments a pass clears on bind) and
    /// as discard masks (which attachments need not be loaded or stored at a
    /// render pass boundary).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TargetFlags: u32 {
        /// First color attachment.
        const COLOR0 = 1 << 0;
        /// Second color attachment.
        const COLOR1 = 1 << 1;
        /// Third color attachment.
        const COLOR2 = 1 << 2;
        /// Fourth color attachment.
        const COLOR3 = 1 << 3;
        /// Depth attachment.
        const DEPTH = 1 << 4;
        /// Stencil attachment.
        const STENCIL = 1 << 5;
        /// All color attachments.
        const COLOR = Self::COLOR0.bits()
            | Self::COLOR1.bits()
            | Self::COLOR2.bits()
            | Self::COLOR3.bits();
        /// Every attachment slot.
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

impl TargetFlags {
    /// Returns the flag for the color attachment at `index`.
    pub fn color_slot(index: usize) -> Self {
        assert!(index < MAX_COLOR_ATTACHMENTS, "invalid color slot {index}");
        Self::from_bits_truncate(1 << index)
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth or array layer count.
    pub depth: u32,
    /// Mip level count.
    pub mip_levels: u32,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            depth: 1,
            mip_levels: 1,
            sample_count: 1,
            format,
            usage,
        }
    }

    /// Set the sample count.
    pub fn with_samples(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self { size, usage }
    }
}

/// Dimensions and sampling of a concrete render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Sample count.
    pub samples: u8,
}

impl RenderTargetInfo {
    /// Create target info for a single-sampled target.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: 1,
        }
    }
}
