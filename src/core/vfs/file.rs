//! sqlite3_file implementation backed by `ArchiveFile`

use super::vfs::app_data;
use crate::channel::ArchiveFile;
use crate::provider::OpenMode;
use libsqlite3_sys as ffi;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use tracing::{debug, warn};

const SECTOR_SIZE: c_int = 4096;

/// Open file as laid out in the memory SQLite hands to `xOpen`
///
/// `base` must stay the first field so SQLite can treat a pointer to this
/// struct as a `sqlite3_file`.
#[repr(C)]
pub struct ZipVfsFile {
    base: ffi::sqlite3_file,
    channel: Option<Box<ArchiveFile>>,
}

static IO_METHODS: ffi::sqlite3_io_methods = ffi::sqlite3_io_methods {
    iVersion: 1,
    xClose: Some(file_close),
    xRead: Some(file_read),
    xWrite: Some(file_write),
    xTruncate: Some(file_truncate),
    xSync: Some(file_sync),
    xFileSize: Some(file_size),
    xLock: Some(file_lock),
    xUnlock: Some(file_unlock),
    xCheckReservedLock: Some(file_check_reserved_lock),
    xFileControl: Some(file_control),
    xSectorSize: Some(file_sector_size),
    xDeviceCharacteristics: Some(file_device_characteristics),
    xShmMap: None,
    xShmLock: None,
    xShmBarrier: None,
    xShmUnmap: None,
    xFetch: None,
    xUnfetch: None,
};

pub(super) unsafe fn file_open(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    file: *mut ffi::sqlite3_file,
    flags: c_int,
    p_out_flags: *mut c_int,
) -> c_int {
    // SQLite only calls xClose when pMethods is set
    (*file).pMethods = ptr::null();

    let vfs_impl = match app_data(vfs) {
        Some(v) => v,
        None => return ffi::SQLITE_ERROR,
    };

    if z_name.is_null() {
        debug!("Refusing to open an anonymous temp file");
        return ffi::SQLITE_CANTOPEN;
    }
    let name = match CStr::from_ptr(z_name).to_str() {
        Ok(name) => name,
        Err(_) => return ffi::SQLITE_CANTOPEN,
    };
    if flags & ffi::SQLITE_OPEN_MAIN_DB == 0 {
        debug!("Refusing to open {} (flags {:#x}): only main databases are served", name, flags);
        return ffi::SQLITE_CANTOPEN;
    }

    let fs = vfs_impl.file_system();
    let channel = match fs.open(&fs.get_path(name), OpenMode::Read) {
        Ok(channel) => channel,
        Err(e) => {
            warn!("Failed to open {} through the VFS: {}", name, e);
            return ffi::SQLITE_CANTOPEN;
        }
    };

    ptr::write(
        file as *mut ZipVfsFile,
        ZipVfsFile {
            base: ffi::sqlite3_file {
                pMethods: &IO_METHODS,
            },
            channel: Some(Box::new(channel)),
        },
    );

    if !p_out_flags.is_null() {
        *p_out_flags = (flags & !(ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE))
            | ffi::SQLITE_OPEN_READONLY;
    }
    ffi::SQLITE_OK
}

unsafe fn channel<'a>(file: *mut ffi::sqlite3_file) -> Option<&'a mut ArchiveFile> {
    (*(file as *mut ZipVfsFile)).channel.as_deref_mut()
}

unsafe extern "C" fn file_close(file: *mut ffi::sqlite3_file) -> c_int {
    let zip_file = &mut *(file as *mut ZipVfsFile);
    if let Some(channel) = zip_file.channel.take() {
        (*channel).close();
    }
    ffi::SQLITE_OK
}

unsafe extern "C" fn file_read(
    file: *mut ffi::sqlite3_file,
    buf: *mut c_void,
    amount: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    let channel = match channel(file) {
        Some(c) => c,
        None => return ffi::SQLITE_IOERR_READ,
    };
    if amount < 0 || offset < 0 {
        return ffi::SQLITE_IOERR_READ;
    }

    let out = std::slice::from_raw_parts_mut(buf as *mut u8, amount as usize);
    channel.set_position(offset as u64);

    let mut filled = 0;
    while filled < out.len() {
        match channel.read(&mut out[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => {
                warn!("Read of {} at {} failed: {}", channel.full_path(), offset, e);
                return ffi::SQLITE_IOERR_READ;
            }
        }
    }

    if filled < out.len() {
        // SQLite expects the unread tail zeroed on a short read
        out[filled..].fill(0);
        return ffi::SQLITE_IOERR_SHORT_READ;
    }
    ffi::SQLITE_OK
}

unsafe extern "C" fn file_write(
    _file: *mut ffi::sqlite3_file,
    _buf: *const c_void,
    _amount: c_int,
    _offset: ffi::sqlite3_int64,
) -> c_int {
    ffi::SQLITE_READONLY
}

unsafe extern "C" fn file_truncate(_file: *mut ffi::sqlite3_file, _size: ffi::sqlite3_int64) -> c_int {
    ffi::SQLITE_READONLY
}

unsafe extern "C" fn file_sync(_file: *mut ffi::sqlite3_file, _flags: c_int) -> c_int {
    ffi::SQLITE_OK
}

unsafe extern "C" fn file_size(file: *mut ffi::sqlite3_file, p_size: *mut ffi::sqlite3_int64) -> c_int {
    match channel(file) {
        Some(channel) => {
            *p_size = channel.size() as ffi::sqlite3_int64;
            ffi::SQLITE_OK
        }
        None => ffi::SQLITE_IOERR_FSTAT,
    }
}

// Archive entries never change, so every lock is granted
unsafe extern "C" fn file_lock(_file: *mut ffi::sqlite3_file, _lock: c_int) -> c_int {
    ffi::SQLITE_OK
}

unsafe extern "C" fn file_unlock(_file: *mut ffi::sqlite3_file, _lock: c_int) -> c_int {
    ffi::SQLITE_OK
}

unsafe extern "C" fn file_check_reserved_lock(
    _file: *mut ffi::sqlite3_file,
    p_res_out: *mut c_int,
) -> c_int {
    *p_res_out = 0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn file_control(_file: *mut ffi::sqlite3_file, _op: c_int, _arg: *mut c_void) -> c_int {
    ffi::SQLITE_NOTFOUND
}

unsafe extern "C" fn file_sector_size(_file: *mut ffi::sqlite3_file) -> c_int {
    SECTOR_SIZE
}

unsafe extern "C" fn file_device_characteristics(_file: *mut ffi::sqlite3_file) -> c_int {
    ffi::SQLITE_IOCAP_IMMUTABLE
}
