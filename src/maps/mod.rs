pub mod bitmap;
pub mod extents;

pub use bitmap::{
    decode_volume_bitmap, get_volume_map, get_volume_map_with_limits, ClusterOccupancyMap,
    ClusterRun, FreeRuns,
};
pub use extents::{
    decode_retrieval_pointers, get_file_map, get_file_map_with_limits, Extent, FileExtentMap,
    FileMapEntry, SPARSE_LCN,
};
