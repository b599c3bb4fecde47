pub mod device;
pub mod error;
pub mod fsctl;
pub mod maps;
pub mod relocator;
pub mod system;

pub use device::{DeviceControl, DeviceSession, SessionKind};
pub use error::{Error, Result};
pub use fsctl::ScratchLimits;
pub use maps::{
    get_file_map, get_file_map_with_limits, get_volume_map, get_volume_map_with_limits,
    ClusterOccupancyMap, ClusterRun, Extent, FileExtentMap, FileMapEntry,
};
pub use relocator::{move_clusters, RelocationRequest};
pub use system::check_elevated;

/// Open `volume` (e.g. `"C:"`), read its cluster bitmap and release it
pub fn volume_map(volume: &str, limits: &ScratchLimits) -> Result<ClusterOccupancyMap> {
    let session = DeviceSession::open_volume(volume)?;
    get_volume_map_with_limits(&session, limits)
}

/// Open the file at `path`, read its extent map and release it
pub fn file_map(path: &str, limits: &ScratchLimits) -> Result<FileExtentMap> {
    let session = DeviceSession::open_file(path)?;
    get_file_map_with_limits(&session, limits)
}

/// Open `volume` and the file at `path`, move `count` clusters of the file
/// from `vcn` to `lcn`, and release both sessions
pub fn move_file(volume: &str, path: &str, vcn: i64, lcn: i64, count: u32) -> Result<()> {
    let volume = DeviceSession::open_volume(volume)?;
    let file = DeviceSession::open_file(path)?;
    move_clusters(&volume, &file, vcn, lcn, count)
}
