pub mod codes;
pub mod cursor;
pub mod scratch;

pub use codes::{
    ctl_code, FSCTL_GET_RETRIEVAL_POINTERS, FSCTL_GET_VOLUME_BITMAP, FSCTL_MOVE_FILE,
};
pub use cursor::ByteCursor;
pub use scratch::{ScratchBuffer, ScratchLimits, BITMAP_HEADER_SIZE};

/// Fixed 8-byte input shared by the bitmap and retrieval pointer requests:
/// the starting cluster number, always 0.
pub const STARTING_CLUSTER_INPUT: [u8; 8] = 0i64.to_le_bytes();
