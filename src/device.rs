use crate::error::{Error, Result};

/// A handle that accepts file system control requests.
///
/// [`DeviceSession`] implements this against the host OS. The readers and
/// the relocator only depend on this trait.
pub trait DeviceControl {
    /// Handle value as it is embedded in request records that refer to this
    /// session (the move-file request names the file by handle)
    fn raw_handle(&self) -> Result<u64>;

    /// Issue control request `code` with `input`, letting the OS write its
    /// response into `output`. Returns the number of bytes the OS reports
    /// having written.
    fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize>;
}

impl<T: DeviceControl + ?Sized> DeviceControl for &T {
    fn raw_handle(&self) -> Result<u64> {
        (**self).raw_handle()
    }

    fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        (**self).control(code, input, output)
    }
}

/// What a session was opened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A whole volume, opened for shared read/write
    Volume,
    /// A file's metadata (attributes), not its data stream
    File,
}

/// Exclusively owned open handle to a volume or a file.
///
/// The handle is closed by [`DeviceSession::release`] or when the session
/// is dropped, whichever comes first. Releasing twice is a no-op.
pub struct DeviceSession {
    handle: Option<sys::Handle>,
    path: String,
    kind: SessionKind,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("open", &self.is_open())
            .finish()
    }
}

impl DeviceSession {
    fn open_impl(path: String, kind: SessionKind) -> Result<Self> {
        let handle = sys::open(&path, kind)?;
        log::debug!("Opened {:?} session on {}", kind, path);
        Ok(Self {
            handle: Some(handle),
            path,
            kind,
        })
    }

    /// Open a volume by device name, e.g. `"C:"`
    pub fn open_volume(name: &str) -> Result<Self> {
        let path = volume_device_path(name)?;
        Self::open_impl(path, SessionKind::Volume)
    }

    /// Open a file's metadata for attribute-level read/write access
    pub fn open_file(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidName(path.to_string()));
        }
        Self::open_impl(path.to_string(), SessionKind::File)
    }

    /// Close the underlying handle. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            sys::close(handle);
            log::debug!("Released {:?} session on {}", self.kind, self.path);
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// The OS path this session was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl DeviceControl for DeviceSession {
    fn raw_handle(&self) -> Result<u64> {
        self.handle
            .as_ref()
            .map(sys::raw_value)
            .ok_or(Error::SessionReleased)
    }

    fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let handle = self.handle.as_ref().ok_or(Error::SessionReleased)?;
        sys::control(handle, code, input, output)
    }
}

/// Build the device path for a volume name: `"C:"` and `"C:\"` both become
/// `\\.\C:`. Names that already carry a device prefix are kept as given.
pub fn volume_device_path(name: &str) -> Result<String> {
    if name.starts_with(r"\\.\") || name.starts_with(r"\\?\") {
        return Ok(name.trim_end_matches('\\').to_string());
    }
    let trimmed = name.trim_end_matches('\\');
    if trimmed.is_empty() || trimmed.contains('\\') {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(format!(r"\\.\{}", trimmed))
}

#[cfg(windows)]
mod sys {
    use std::ffi::c_void;

    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_MODE, FILE_SHARE_READ,
        FILE_SHARE_WRITE, OPEN_EXISTING,
    };
    use windows::Win32::System::IO::DeviceIoControl;

    use super::SessionKind;
    use crate::error::{Error, Result};

    pub type Handle = HANDLE;

    // Access rights
    const GENERIC_READ_ACCESS: u32 = 0x8000_0000;
    const GENERIC_WRITE_ACCESS: u32 = 0x4000_0000;
    const FILE_READ_ATTRIBUTES_ACCESS: u32 = 0x0080;
    const FILE_WRITE_ATTRIBUTES_ACCESS: u32 = 0x0100;

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Recover the Win32 error code from a `FACILITY_WIN32` HRESULT
    fn os_error(err: windows::core::Error) -> Error {
        let hr = err.code().0 as u32;
        let code = if hr & 0xFFFF_0000 == 0x8007_0000 {
            hr & 0xFFFF
        } else {
            hr
        };
        Error::Os { code }
    }

    pub fn open(path: &str, kind: SessionKind) -> Result<Handle> {
        let (access, share): (u32, FILE_SHARE_MODE) = match kind {
            SessionKind::Volume => (GENERIC_READ_ACCESS | GENERIC_WRITE_ACCESS, FILE_SHARE_WRITE),
            SessionKind::File => (
                FILE_READ_ATTRIBUTES_ACCESS | FILE_WRITE_ATTRIBUTES_ACCESS,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
            ),
        };
        let wide = to_wide(path);
        unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                access,
                share,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                None,
            )
        }
        .map_err(os_error)
    }

    pub fn close(handle: Handle) {
        if !handle.is_invalid() {
            unsafe {
                let _ = CloseHandle(handle);
            }
        }
    }

    pub fn raw_value(handle: &Handle) -> u64 {
        handle.0 as usize as u64
    }

    pub fn control(handle: &Handle, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let input_ptr = (!input.is_empty()).then(|| input.as_ptr() as *const c_void);
        let output_len = output.len() as u32;
        let output_ptr = (!output.is_empty()).then(|| output.as_mut_ptr() as *mut c_void);
        let mut returned = 0u32;
        unsafe {
            DeviceIoControl(
                *handle,
                code,
                input_ptr,
                input.len() as u32,
                output_ptr,
                output_len,
                Some(&mut returned as *mut u32),
                None,
            )
        }
        .map_err(os_error)?;
        Ok(returned as usize)
    }
}

#[cfg(not(windows))]
mod sys {
    use std::convert::Infallible;

    use super::SessionKind;
    use crate::error::{Error, Result};

    /// No handle can exist on hosts without file system control requests
    pub type Handle = Infallible;

    pub fn open(_path: &str, _kind: SessionKind) -> Result<Handle> {
        Err(Error::Unsupported)
    }

    pub fn close(handle: Handle) {
        match handle {}
    }

    pub fn raw_value(handle: &Handle) -> u64 {
        match *handle {}
    }

    pub fn control(handle: &Handle, _code: u32, _input: &[u8], _output: &mut [u8]) -> Result<usize> {
        match *handle {}
    }
}
