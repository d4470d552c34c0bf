//! Texture handles and the render-target association used for journal
//! dependency tracking.
//!
//! Pixel storage lives in the backend; this registry only records size and
//! which framebuffer (if any) currently renders into a texture.

use slotmap::{new_key_type, SlotMap};

use crate::framebuffer::FramebufferId;

new_key_type! {
    pub struct TextureId;
}

/// Registry-side texture metadata.
#[derive(Debug, Clone)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    /// Framebuffer drawing into this texture, if it is a render target.
    pub render_target: Option<FramebufferId>,
}

/// Texture registry owned by the context.
#[derive(Debug, Default)]
pub struct Textures {
    items: SlotMap<TextureId, TextureInfo>,
}

impl Textures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, width: u32, height: u32) -> TextureId {
        self.items.insert(TextureInfo { width, height, render_target: None })
    }

    pub fn remove(&mut self, id: TextureId) -> Option<TextureInfo> {
        self.items.remove(id)
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureInfo> {
        self.items.get(id)
    }

    pub fn set_render_target(&mut self, id: TextureId, fb: Option<FramebufferId>) {
        if let Some(info) = self.items.get_mut(id) {
            info.render_target = fb;
        }
    }

    /// Framebuffer currently rendering into `id`.
    pub fn render_target_of(&self, id: TextureId) -> Option<FramebufferId> {
        self.items.get(id).and_then(|t| t.render_target)
    }

    pub fn ids(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.items.keys()
    }
}
