//! Opaque device resource handles

use std::fmt;

/// Identifies a vertex buffer owned by a [`GraphicsDevice`](crate::GraphicsDevice).
///
/// Handles are plain ids: the device owns the resource, the holder only
/// refers to it and must hand it back through `release_buffer`.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BufferHandle(pub u64);

/// Identifies a texture owned by a [`GraphicsDevice`](crate::GraphicsDevice).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TextureHandle(pub u64);

impl BufferHandle {
    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl TextureHandle {
    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferHandle({})", self.0)
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureHandle({})", self.0)
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture#{}", self.0)
    }
}

/// Monotonic id source for device implementations. Ids start at 1 and are
/// never reused, so a released handle can't alias a newer resource.
#[derive(Debug)]
pub struct HandleAllocator {
    next: u64,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_buffer(&mut self) -> BufferHandle {
        BufferHandle(self.bump())
    }

    pub fn next_texture(&mut self) -> TextureHandle {
        TextureHandle(self.bump())
    }

    fn bump(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let mut alloc = HandleAllocator::new();
        let b = alloc.next_buffer();
        let t = alloc.next_texture();
        let b2 = alloc.next_buffer();
        assert_ne!(b.raw(), t.raw());
        assert!(b2.raw() > b.raw());
    }

    #[test]
    fn test_display_names_kind() {
        let mut alloc = HandleAllocator::new();
        let t = alloc.next_texture();
        assert_eq!(t.to_string(), format!("texture#{}", t.raw()));
    }
}
