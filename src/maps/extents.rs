use crate::device::DeviceControl;
use crate::error::{Error, Result};
use crate::fsctl::{
    ByteCursor, ScratchBuffer, ScratchLimits, FSCTL_GET_RETRIEVAL_POINTERS,
    STARTING_CLUSTER_INPUT,
};

/// Extent count (4 bytes), alignment padding (4 bytes), starting VCN (8 bytes)
pub const RETRIEVAL_HEADER_SIZE: usize = 16;

/// One (next VCN, LCN) pair
pub const EXTENT_PAIR_SIZE: usize = 16;

/// LCN the OS reports for runs with no clusters behind them (sparse or
/// compressed-away ranges)
pub const SPARSE_LCN: i64 = -1;

/// One extent pair exactly as the OS reports it.
///
/// `next_vcn` is the *end* boundary of the extent (exclusive), not its
/// start. The extent starts at the previous entry's `next_vcn`, or at the
/// map's starting VCN for the first entry. Use [`FileExtentMap::extents`]
/// for the derived (start, length, lcn) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMapEntry {
    pub next_vcn: i64,
    pub lcn: i64,
}

impl std::fmt::Display for FileMapEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "next VCN = {}, LCN = {}", self.next_vcn, self.lcn)
    }
}

/// A contiguous run of a file's virtual clusters and where it lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start_vcn: i64,
    pub length: u64,
    /// First logical cluster, or [`SPARSE_LCN`]
    pub lcn: i64,
}

impl Extent {
    pub fn is_sparse(&self) -> bool {
        self.lcn == SPARSE_LCN
    }

    /// First VCN past this extent
    pub fn end_vcn(&self) -> i64 {
        self.start_vcn.saturating_add_unsigned(self.length)
    }
}

/// Ordered extent pairs of one file, starting at VCN 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExtentMap {
    starting_vcn: i64,
    entries: Vec<FileMapEntry>,
}

impl FileExtentMap {
    pub fn new(entries: Vec<FileMapEntry>) -> Self {
        Self {
            starting_vcn: 0,
            entries,
        }
    }

    pub fn starting_vcn(&self) -> i64 {
        self.starting_vcn
    }

    /// Raw boundary pairs in the order the OS returned them
    pub fn entries(&self) -> &[FileMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Extents with explicit start and length, derived from the boundaries
    pub fn extents(&self) -> impl Iterator<Item = Extent> + '_ {
        let mut start = self.starting_vcn;
        self.entries.iter().map(move |entry| {
            let extent = Extent {
                start_vcn: start,
                length: entry.next_vcn.saturating_sub(start).max(0) as u64,
                lcn: entry.lcn,
            };
            start = entry.next_vcn;
            extent
        })
    }

    /// Virtual clusters covered by the map, sparse runs included
    pub fn total_clusters(&self) -> u64 {
        self.entries
            .last()
            .map(|last| last.next_vcn.saturating_sub(self.starting_vcn).max(0) as u64)
            .unwrap_or(0)
    }

    /// Number of physically separate runs.
    ///
    /// Sparse extents are skipped and neighbours whose clusters are adjacent
    /// on the volume count as one run.
    pub fn fragment_count(&self) -> usize {
        let mut count = 0;
        let mut next_lcn: Option<i64> = None;
        for extent in self.extents().filter(|e| !e.is_sparse()) {
            if next_lcn != Some(extent.lcn) {
                count += 1;
            }
            // A run reaching past the last representable LCN cannot continue
            next_lcn = extent.lcn.checked_add_unsigned(extent.length);
        }
        count
    }

    pub fn is_fragmented(&self) -> bool {
        self.fragment_count() > 1
    }
}

/// Decode a retrieval pointers response.
///
/// Exactly `extent count` pairs are read after the header. Whatever follows
/// them is ignored, so an over-allocated buffer never adds entries.
pub fn decode_retrieval_pointers(response: &[u8]) -> Result<FileExtentMap> {
    let mut cursor = ByteCursor::new(response);

    let extent_count = cursor.read_u32()? as usize;
    cursor.skip(4)?;
    let starting_vcn = cursor.read_i64()?;
    if starting_vcn != 0 {
        return Err(Error::InvariantViolation {
            field: "starting VCN",
            value: starting_vcn,
        });
    }

    let mut entries = Vec::with_capacity(extent_count.min(cursor.remaining() / EXTENT_PAIR_SIZE));
    for _ in 0..extent_count {
        let next_vcn = cursor.read_i64()?;
        let lcn = cursor.read_i64()?;
        entries.push(FileMapEntry { next_vcn, lcn });
    }

    Ok(FileExtentMap {
        starting_vcn,
        entries,
    })
}

/// Read the extent map of an open file
pub fn get_file_map<D: DeviceControl + ?Sized>(file: &D) -> Result<FileExtentMap> {
    get_file_map_with_limits(file, &ScratchLimits::default())
}

/// Read the extent map with an explicit scratch buffer size
pub fn get_file_map_with_limits<D: DeviceControl + ?Sized>(
    file: &D,
    limits: &ScratchLimits,
) -> Result<FileExtentMap> {
    let mut scratch = ScratchBuffer::zeroed(limits.extent_buffer_size)?;
    let returned = file.control(
        FSCTL_GET_RETRIEVAL_POINTERS,
        &STARTING_CLUSTER_INPUT,
        scratch.as_mut_slice(),
    )?;
    log::debug!(
        "Retrieval pointers request returned {} of {} bytes",
        returned,
        scratch.capacity()
    );

    let map = decode_retrieval_pointers(scratch.filled(returned))?;
    log::debug!(
        "Decoded {} extents covering {} clusters",
        map.len(),
        map.total_clusters()
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointers_response(count: u32, starting_vcn: i64, pairs: &[(i64, i64)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&count.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&starting_vcn.to_le_bytes());
        for (next_vcn, lcn) in pairs {
            data.extend_from_slice(&next_vcn.to_le_bytes());
            data.extend_from_slice(&lcn.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_decode_two_extents() {
        let response = pointers_response(2, 0, &[(100, 5000), (250, 9000)]);
        let map = decode_retrieval_pointers(&response).unwrap();

        assert_eq!(
            map.entries(),
            &[
                FileMapEntry {
                    next_vcn: 100,
                    lcn: 5000
                },
                FileMapEntry {
                    next_vcn: 250,
                    lcn: 9000
                },
            ]
        );

        let extents: Vec<Extent> = map.extents().collect();
        assert_eq!(
            extents,
            vec![
                Extent {
                    start_vcn: 0,
                    length: 100,
                    lcn: 5000
                },
                Extent {
                    start_vcn: 100,
                    length: 150,
                    lcn: 9000
                },
            ]
        );
        assert_eq!(extents[1].end_vcn(), 250);
        assert_eq!(map.total_clusters(), 250);
        assert_eq!(map.fragment_count(), 2);
        assert!(map.is_fragmented());
    }

    #[test]
    fn test_decode_ignores_trailing_garbage() {
        let mut response = pointers_response(1, 0, &[(8, 123)]);
        // A stale pair from an earlier, longer response
        response.extend_from_slice(&16i64.to_le_bytes());
        response.extend_from_slice(&456i64.to_le_bytes());
        response.extend_from_slice(&[0xCD; 37]);

        let map = decode_retrieval_pointers(&response).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.entries()[0], FileMapEntry { next_vcn: 8, lcn: 123 });
    }

    #[test]
    fn test_decode_nonzero_starting_vcn() {
        let response = pointers_response(1, 64, &[(128, 10)]);
        match decode_retrieval_pointers(&response) {
            Err(Error::InvariantViolation { field, value }) => {
                assert_eq!(field, "starting VCN");
                assert_eq!(value, 64);
            }
            other => panic!("expected InvariantViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_count_exceeds_payload() {
        let response = pointers_response(3, 0, &[(1, 1), (2, 2)]);
        assert!(matches!(
            decode_retrieval_pointers(&response),
            Err(Error::Truncated { offset: 48, .. })
        ));
    }

    #[test]
    fn test_decode_empty_map() {
        let map = decode_retrieval_pointers(&pointers_response(0, 0, &[])).unwrap();
        assert!(map.is_empty());
        assert_eq!(map.total_clusters(), 0);
        assert_eq!(map.fragment_count(), 0);
    }

    #[test]
    fn test_decode_short_header() {
        assert!(matches!(
            decode_retrieval_pointers(&[1, 0, 0, 0, 0, 0]),
            Err(Error::Truncated { offset: 4, .. })
        ));
    }

    #[test]
    fn test_sparse_and_contiguous_extents() {
        let map = FileExtentMap::new(vec![
            FileMapEntry {
                next_vcn: 10,
                lcn: 1000,
            },
            FileMapEntry {
                next_vcn: 20,
                lcn: SPARSE_LCN,
            },
            // Picks up right where the first run ended on the volume
            FileMapEntry {
                next_vcn: 30,
                lcn: 1010,
            },
        ]);

        let extents: Vec<Extent> = map.extents().collect();
        assert!(extents[1].is_sparse());
        assert_eq!(extents[1].length, 10);
        assert_eq!(map.fragment_count(), 1);
        assert!(!map.is_fragmented());
    }

    #[test]
    fn test_extreme_lcn_does_not_overflow() {
        let response = pointers_response(2, 0, &[(10, i64::MAX - 5), (20, i64::MAX - 5)]);
        let map = decode_retrieval_pointers(&response).unwrap();

        assert_eq!(map.fragment_count(), 2);
        let extents: Vec<Extent> = map.extents().collect();
        assert_eq!(extents[0].end_vcn(), 10);

        let far = Extent {
            start_vcn: i64::MAX - 1,
            length: 10,
            lcn: 0,
        };
        assert_eq!(far.end_vcn(), i64::MAX);
    }

    #[test]
    fn test_entry_display() {
        let entry = FileMapEntry {
            next_vcn: 100,
            lcn: 5000,
        };
        assert_eq!(entry.to_string(), "next VCN = 100, LCN = 5000");
    }
}
