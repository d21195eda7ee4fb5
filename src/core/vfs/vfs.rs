//! SQLite VFS registration
//!
//! Implements the sqlite3_vfs interface on top of [`Zip2FileSystem`].
//! Only the main database file can be opened; it is served through an
//! [`ArchiveFile`](crate::channel::ArchiveFile). Everything that would
//! create or remove files is refused.

use crate::error::{Result, Zip2Error};
use crate::provider::Zip2FileSystem;
use libsqlite3_sys as ffi;
use parking_lot::Mutex;
use rand::RngCore;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Name of the VFS as registered with SQLite
pub const VFS_NAME: &str = "zip2";

const MAX_PATHNAME: c_int = 1024;

// Serializes register/unregister; SQLite's own list is not ours to race on
static REGISTRATION: Mutex<()> = Mutex::new(());

/// State behind the VFS `pAppData` pointer
pub struct ZipVfs {
    fs: Zip2FileSystem,
    name: CString,
}

impl ZipVfs {
    pub fn new(fs: Zip2FileSystem) -> Result<Self> {
        let name = CString::new(VFS_NAME)
            .map_err(|e| Zip2Error::Config(format!("Invalid VFS name: {}", e)))?;
        Ok(Self { fs, name })
    }

    pub fn file_system(&self) -> &Zip2FileSystem {
        &self.fs
    }
}

/// Register the `zip2` VFS with SQLite, replacing an earlier registration
///
/// The VFS is not made the default; connections select it by name.
pub fn register_vfs(fs: Zip2FileSystem) -> Result<()> {
    let _guard = REGISTRATION.lock();
    unregister_locked()?;

    let app_data = Box::into_raw(Box::new(ZipVfs::new(fs)?));
    // SAFETY: app_data was just leaked from a Box and stays alive until unregistration
    let z_name = unsafe { (*app_data).name.as_ptr() };

    let sqlite_vfs = Box::new(ffi::sqlite3_vfs {
        iVersion: 2,
        szOsFile: std::mem::size_of::<super::file::ZipVfsFile>() as c_int,
        mxPathname: MAX_PATHNAME,
        pNext: ptr::null_mut(),
        zName: z_name,
        pAppData: app_data as *mut c_void,
        xOpen: Some(vfs_open),
        xDelete: Some(vfs_delete),
        xAccess: Some(vfs_access),
        xFullPathname: Some(vfs_full_pathname),
        xDlOpen: None,
        xDlError: None,
        xDlSym: None,
        xDlClose: None,
        xRandomness: Some(vfs_randomness),
        xSleep: Some(vfs_sleep),
        xCurrentTime: Some(vfs_current_time),
        xGetLastError: Some(vfs_get_last_error),
        xCurrentTimeInt64: Some(vfs_current_time_int64),
        xSetSystemCall: None,
        xGetSystemCall: None,
        xNextSystemCall: None,
    });
    let vfs_ptr = Box::into_raw(sqlite_vfs);

    unsafe {
        let rc = ffi::sqlite3_vfs_register(vfs_ptr, 0);
        if rc != ffi::SQLITE_OK {
            drop(Box::from_raw(vfs_ptr));
            drop(Box::from_raw(app_data));
            return Err(Zip2Error::VfsRegistrationFailed(rc));
        }
    }

    info!("Registered SQLite VFS '{}'", VFS_NAME);
    Ok(())
}

/// Unregister the VFS; a no-op when it is not registered
///
/// No connection opened through the VFS may outlive this call.
pub fn unregister_vfs() -> Result<()> {
    let _guard = REGISTRATION.lock();
    unregister_locked()
}

fn unregister_locked() -> Result<()> {
    let name = CString::new(VFS_NAME)
        .map_err(|e| Zip2Error::Config(format!("Invalid VFS name: {}", e)))?;

    unsafe {
        let vfs_ptr = ffi::sqlite3_vfs_find(name.as_ptr());
        if vfs_ptr.is_null() {
            return Ok(());
        }

        let rc = ffi::sqlite3_vfs_unregister(vfs_ptr);
        if rc != ffi::SQLITE_OK {
            return Err(Zip2Error::VfsRegistrationFailed(rc));
        }

        let app_data = (*vfs_ptr).pAppData;
        if !app_data.is_null() {
            drop(Box::from_raw(app_data as *mut ZipVfs));
        }
        drop(Box::from_raw(vfs_ptr));
    }

    info!("Unregistered SQLite VFS '{}'", VFS_NAME);
    Ok(())
}

/// Resolve the `ZipVfs` behind a VFS pointer
///
/// # Safety
///
/// `vfs` must be a VFS created by [`register_vfs`] and still registered.
pub(super) unsafe fn app_data<'a>(vfs: *mut ffi::sqlite3_vfs) -> Option<&'a ZipVfs> {
    if vfs.is_null() {
        return None;
    }
    ((*vfs).pAppData as *const ZipVfs).as_ref()
}

unsafe fn path_arg<'a>(z_name: *const c_char) -> Option<&'a str> {
    if z_name.is_null() {
        return None;
    }
    CStr::from_ptr(z_name).to_str().ok()
}

// VFS callback functions

unsafe extern "C" fn vfs_open(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    file: *mut ffi::sqlite3_file,
    flags: c_int,
    p_out_flags: *mut c_int,
) -> c_int {
    super::file::file_open(vfs, z_name, file, flags, p_out_flags)
}

unsafe extern "C" fn vfs_delete(
    _vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    _sync_dir: c_int,
) -> c_int {
    debug!("Refusing to delete {:?}", path_arg(z_name));
    ffi::SQLITE_IOERR_DELETE
}

unsafe extern "C" fn vfs_access(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    flags: c_int,
    p_res_out: *mut c_int,
) -> c_int {
    let vfs_impl = match app_data(vfs) {
        Some(v) => v,
        None => return ffi::SQLITE_ERROR,
    };
    let path = match path_arg(z_name) {
        Some(p) => p,
        None => return ffi::SQLITE_ERROR,
    };

    let result = if flags == ffi::SQLITE_ACCESS_READWRITE {
        false
    } else {
        vfs_impl.fs.exists(&vfs_impl.fs.get_path(path))
    };

    *p_res_out = c_int::from(result);
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_full_pathname(
    _vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    n_out: c_int,
    z_out: *mut c_char,
) -> c_int {
    // Composite paths are used verbatim
    let name = CStr::from_ptr(z_name).to_bytes_with_nul();
    if name.len() > n_out as usize {
        return ffi::SQLITE_CANTOPEN;
    }
    ptr::copy_nonoverlapping(name.as_ptr() as *const c_char, z_out, name.len());
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_randomness(
    _vfs: *mut ffi::sqlite3_vfs,
    n_byte: c_int,
    z_out: *mut c_char,
) -> c_int {
    if n_byte <= 0 || z_out.is_null() {
        return 0;
    }
    let out = std::slice::from_raw_parts_mut(z_out as *mut u8, n_byte as usize);
    rand::thread_rng().fill_bytes(out);
    n_byte
}

unsafe extern "C" fn vfs_sleep(_vfs: *mut ffi::sqlite3_vfs, microseconds: c_int) -> c_int {
    std::thread::sleep(std::time::Duration::from_micros(microseconds.max(0) as u64));
    microseconds
}

unsafe extern "C" fn vfs_current_time(_vfs: *mut ffi::sqlite3_vfs, p_time_out: *mut f64) -> c_int {
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();

    // Julian day number (days since noon UTC on November 24, 4714 BC)
    *p_time_out = 2440587.5 + (duration.as_secs_f64() / 86400.0);
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_current_time_int64(
    _vfs: *mut ffi::sqlite3_vfs,
    p_time_out: *mut ffi::sqlite3_int64,
) -> c_int {
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();

    // Julian day in milliseconds
    *p_time_out = 210866760000000i64 + (duration.as_millis() as i64);
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_get_last_error(
    _vfs: *mut ffi::sqlite3_vfs,
    _n_byte: c_int,
    _z_err_msg: *mut c_char,
) -> c_int {
    0
}
