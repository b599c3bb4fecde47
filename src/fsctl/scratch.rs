use crate::error::{Error, Result};

const MIB: usize = 1024 * 1024;

/// Header bytes that precede the packed bits of a volume bitmap response
pub const BITMAP_HEADER_SIZE: usize = 16;

/// Scratch capacity for a bitmap response.
///
/// 64 MiB of bits covers 536,870,912 clusters, i.e. a 2048 GiB volume with
/// 4 KiB clusters, plus the response header.
pub const DEFAULT_BITMAP_BUFFER_SIZE: usize = 64 * MIB + BITMAP_HEADER_SIZE;

/// Scratch capacity for a retrieval pointers response (~4M extents)
pub const DEFAULT_EXTENT_BUFFER_SIZE: usize = 64 * MIB;

/// Upper bounds for the buffers the OS writes control responses into.
///
/// A response that does not fit fails with the OS "more data" code rather
/// than being silently cut short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchLimits {
    pub bitmap_buffer_size: usize,
    pub extent_buffer_size: usize,
}

impl Default for ScratchLimits {
    fn default() -> Self {
        Self {
            bitmap_buffer_size: DEFAULT_BITMAP_BUFFER_SIZE,
            extent_buffer_size: DEFAULT_EXTENT_BUFFER_SIZE,
        }
    }
}

impl ScratchLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bitmap_buffer_size(mut self, bytes: usize) -> Self {
        self.bitmap_buffer_size = bytes;
        self
    }

    pub fn extent_buffer_size(mut self, bytes: usize) -> Self {
        self.extent_buffer_size = bytes;
        self
    }

    /// Size the bitmap buffer for a volume of `clusters` clusters
    pub fn for_cluster_count(self, clusters: u64) -> Self {
        let bytes = clusters.div_ceil(8) as usize + BITMAP_HEADER_SIZE;
        self.bitmap_buffer_size(bytes)
    }
}

/// Zero-filled region the OS writes one control response into.
///
/// Owned by the call that allocates it and freed when that call returns.
pub struct ScratchBuffer {
    data: Vec<u8>,
}

impl std::fmt::Debug for ScratchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("capacity", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl ScratchBuffer {
    /// Allocate `size` zeroed bytes, reporting allocation failure as an error
    pub fn zeroed(size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| Error::ScratchAllocation { bytes: size })?;
        data.resize(size, 0);
        Ok(Self { data })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The first `len` bytes, i.e. what the OS reported writing
    pub fn filled(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.data.len())]
    }
}
