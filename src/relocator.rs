use byteorder::{ByteOrder, LittleEndian};

use crate::device::DeviceControl;
use crate::error::Result;
use crate::fsctl::FSCTL_MOVE_FILE;

/// Size of the move-file record: handle slot, starting VCN, starting LCN,
/// cluster count and tail padding to 8-byte alignment
pub const MOVE_REQUEST_SIZE: usize = 32;

/// One cluster move: `cluster_count` clusters of a file starting at
/// `starting_vcn` are to be placed at `starting_lcn` on the volume.
///
/// Built, sent once and discarded. Whether the destination is free is left
/// to the OS to enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationRequest {
    /// Raw handle of the file session the clusters belong to
    pub file_handle: u64,
    pub starting_vcn: i64,
    pub starting_lcn: i64,
    pub cluster_count: u32,
}

impl RelocationRequest {
    pub fn new<F: DeviceControl + ?Sized>(
        file: &F,
        starting_vcn: i64,
        starting_lcn: i64,
        cluster_count: u32,
    ) -> Result<Self> {
        Ok(Self {
            file_handle: file.raw_handle()?,
            starting_vcn,
            starting_lcn,
            cluster_count,
        })
    }

    /// Serialize to the fixed move-file layout
    pub fn to_bytes(&self) -> [u8; MOVE_REQUEST_SIZE] {
        let mut data = [0u8; MOVE_REQUEST_SIZE];
        LittleEndian::write_u64(&mut data[0..8], self.file_handle);
        LittleEndian::write_i64(&mut data[8..16], self.starting_vcn);
        LittleEndian::write_i64(&mut data[16..24], self.starting_lcn);
        LittleEndian::write_u32(&mut data[24..28], self.cluster_count);
        data
    }
}

/// Send a prepared move request to a volume
pub fn send_relocation<V: DeviceControl + ?Sized>(
    volume: &V,
    request: &RelocationRequest,
) -> Result<()> {
    log::info!(
        "Moving {} clusters at VCN {} to LCN {}",
        request.cluster_count,
        request.starting_vcn,
        request.starting_lcn
    );
    volume.control(FSCTL_MOVE_FILE, &request.to_bytes(), &mut [])?;
    Ok(())
}

/// Relocate `count` clusters of `file`, starting at virtual cluster
/// `starting_vcn`, to logical cluster `starting_lcn` of `volume`.
///
/// Produces nothing beyond success; re-read the file's extent map to
/// observe the new layout.
pub fn move_clusters<V, F>(
    volume: &V,
    file: &F,
    starting_vcn: i64,
    starting_lcn: i64,
    count: u32,
) -> Result<()>
where
    V: DeviceControl + ?Sized,
    F: DeviceControl + ?Sized,
{
    let request = RelocationRequest::new(file, starting_vcn, starting_lcn, count)?;
    send_relocation(volume, &request)
}
