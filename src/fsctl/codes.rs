// ===== Control Code Packing =====

/// Device type for file system control requests
pub const FILE_DEVICE_FILE_SYSTEM: u32 = 0x0000_0009;

/// Transfer method: the OS copies the input/output through a system buffer
pub const METHOD_BUFFERED: u32 = 0;

/// Transfer method: the driver accesses the caller's buffers directly
pub const METHOD_NEITHER: u32 = 3;

pub const FILE_ANY_ACCESS: u32 = 0;
pub const FILE_SPECIAL_ACCESS: u32 = FILE_ANY_ACCESS;

/// Pack a device type, function number, transfer method and access level
/// into a 32-bit control code.
///
/// Layout: `device_type << 16 | access << 14 | function << 2 | method`.
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Request the cluster occupancy bitmap of a volume
pub const FSCTL_GET_VOLUME_BITMAP: u32 =
    ctl_code(FILE_DEVICE_FILE_SYSTEM, 27, METHOD_NEITHER, FILE_ANY_ACCESS);

/// Request the VCN to LCN extent pairs of a file
pub const FSCTL_GET_RETRIEVAL_POINTERS: u32 =
    ctl_code(FILE_DEVICE_FILE_SYSTEM, 28, METHOD_NEITHER, FILE_ANY_ACCESS);

/// Relocate a run of a file's clusters
pub const FSCTL_MOVE_FILE: u32 =
    ctl_code(FILE_DEVICE_FILE_SYSTEM, 29, METHOD_BUFFERED, FILE_SPECIAL_ACCESS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_winioctl() {
        assert_eq!(FSCTL_GET_VOLUME_BITMAP, 0x0009_006F);
        assert_eq!(FSCTL_GET_RETRIEVAL_POINTERS, 0x0009_0073);
        assert_eq!(FSCTL_MOVE_FILE, 0x0009_0074);
    }

    #[test]
    fn test_ctl_code_fields() {
        // FSCTL_LOCK_VOLUME: function 6, buffered, any access
        assert_eq!(ctl_code(FILE_DEVICE_FILE_SYSTEM, 6, METHOD_BUFFERED, 0), 0x0009_0018);
        // Access bits land above the function number
        assert_eq!(ctl_code(0, 0, 0, 3), 0xC000);
    }
}
