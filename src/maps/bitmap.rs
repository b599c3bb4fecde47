use crate::device::DeviceControl;
use crate::error::{Error, Result};
use crate::fsctl::{
    ByteCursor, ScratchBuffer, ScratchLimits, FSCTL_GET_VOLUME_BITMAP, STARTING_CLUSTER_INPUT,
};

/// A contiguous run of clusters on a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterRun {
    /// First logical cluster of the run
    pub start: u64,
    /// Number of clusters in the run
    pub len: u64,
}

/// One occupancy flag per cluster of a volume, indexed from LCN 0.
///
/// Bits are packed LSB-first, the way the OS returns them: cluster `i` is
/// bit `i % 8` of byte `i / 8`. Pad bits past `len` are always clear.
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterOccupancyMap {
    bits: Vec<u8>,
    len: usize,
}

impl std::fmt::Debug for ClusterOccupancyMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterOccupancyMap")
            .field("clusters", &self.len)
            .field("used", &self.used_count())
            .finish()
    }
}

impl ClusterOccupancyMap {
    /// Build a map of `len` clusters from packed bits.
    ///
    /// Extra bytes are dropped and pad bits in the last byte are cleared.
    /// Missing bytes read as free clusters.
    pub fn from_bytes(mut bits: Vec<u8>, len: usize) -> Self {
        bits.resize(len.div_ceil(8), 0);
        let tail = len % 8;
        if tail != 0 {
            if let Some(last) = bits.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
        Self { bits, len }
    }

    /// Number of clusters covered
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Occupancy of cluster `index`, or `None` past the end of the volume
    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| self.bits[index / 8] & (1 << (index % 8)) != 0)
    }

    /// Whether cluster `index` is allocated; out-of-range clusters are not
    pub fn is_used(&self, index: usize) -> bool {
        self.get(index).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.bits[i / 8] & (1 << (i % 8)) != 0)
    }

    pub fn used_count(&self) -> u64 {
        self.bits.iter().map(|b| b.count_ones() as u64).sum()
    }

    pub fn free_count(&self) -> u64 {
        self.len as u64 - self.used_count()
    }

    /// Maximal runs of free clusters in ascending LCN order
    pub fn free_runs(&self) -> FreeRuns<'_> {
        FreeRuns { map: self, pos: 0 }
    }

    pub fn largest_free_run(&self) -> Option<ClusterRun> {
        self.free_runs().fold(None, |best: Option<ClusterRun>, run| match best {
            Some(b) if b.len >= run.len => Some(b),
            _ => Some(run),
        })
    }

    /// Packed occupancy bits, `ceil(len / 8)` bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Skip forward over whole bytes of allocated clusters
    fn next_free_from(&self, mut pos: usize) -> usize {
        while pos < self.len {
            if pos % 8 == 0 && self.bits[pos / 8] == 0xFF {
                pos += 8;
            } else if self.is_used(pos) {
                pos += 1;
            } else {
                return pos;
            }
        }
        self.len
    }

    fn next_used_from(&self, mut pos: usize) -> usize {
        while pos < self.len {
            if pos % 8 == 0 && self.bits[pos / 8] == 0 {
                pos += 8;
            } else if !self.is_used(pos) {
                pos += 1;
            } else {
                return pos;
            }
        }
        self.len
    }
}

/// Iterator returned by [`ClusterOccupancyMap::free_runs`]
#[derive(Debug)]
pub struct FreeRuns<'a> {
    map: &'a ClusterOccupancyMap,
    pos: usize,
}

impl Iterator for FreeRuns<'_> {
    type Item = ClusterRun;

    fn next(&mut self) -> Option<ClusterRun> {
        let start = self.map.next_free_from(self.pos);
        if start >= self.map.len {
            self.pos = self.map.len;
            return None;
        }
        // Whole-byte skipping can overshoot len; the pad bits are clear.
        let end = self.map.next_used_from(start).min(self.map.len);
        self.pos = end;
        Some(ClusterRun {
            start: start as u64,
            len: (end - start) as u64,
        })
    }
}

/// Decode a volume bitmap response: an 8-byte starting LCN that must be 0,
/// an 8-byte bitmap size in bits, then the packed bits.
pub fn decode_volume_bitmap(response: &[u8]) -> Result<ClusterOccupancyMap> {
    let mut cursor = ByteCursor::new(response);

    let starting_lcn = cursor.read_i64()?;
    if starting_lcn != 0 {
        return Err(Error::InvariantViolation {
            field: "starting LCN",
            value: starting_lcn,
        });
    }

    let bitmap_bits = cursor.read_i64()?;
    let len = usize::try_from(bitmap_bits)
        .map_err(|_| Error::BitmapTooLarge { bits: bitmap_bits })?;
    let payload = cursor.take(len.div_ceil(8))?;

    Ok(ClusterOccupancyMap::from_bytes(payload.to_vec(), len))
}

/// Read the cluster occupancy bitmap of an open volume
pub fn get_volume_map<D: DeviceControl + ?Sized>(volume: &D) -> Result<ClusterOccupancyMap> {
    get_volume_map_with_limits(volume, &ScratchLimits::default())
}

/// Read the cluster occupancy bitmap with an explicit scratch buffer size
pub fn get_volume_map_with_limits<D: DeviceControl + ?Sized>(
    volume: &D,
    limits: &ScratchLimits,
) -> Result<ClusterOccupancyMap> {
    let mut scratch = ScratchBuffer::zeroed(limits.bitmap_buffer_size)?;
    let returned = volume.control(
        FSCTL_GET_VOLUME_BITMAP,
        &STARTING_CLUSTER_INPUT,
        scratch.as_mut_slice(),
    )?;
    log::debug!(
        "Volume bitmap request returned {} of {} bytes",
        returned,
        scratch.capacity()
    );

    let map = decode_volume_bitmap(scratch.filled(returned))?;
    log::debug!(
        "Decoded volume bitmap: {} clusters, {} in use",
        map.len(),
        map.used_count()
    );
    Ok(map)
}
