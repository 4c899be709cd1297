// SPDX-License-Identifier: GPL-3.0-only

//! POSIX shared memory regions for published frames
//!
//! Each region is a `shm_open` object laid out as a fixed header followed by
//! the frame data:
//!
//! ```text
//! +------------------+----------------------+---------------------+-----------+------------+
//! | data size (u32)  | pthread_mutex_t      | pthread_cond_t      | timeval   | data ...   |
//! +------------------+----------------------+---------------------+-----------+------------+
//! ```
//!
//! The mutex and condition variable are initialised process-shared, so
//! readers in other processes lock the same mutex, wait on the condition
//! for a notification and read data and timestamp while holding the lock.

use crate::backends::camera::types::TimeStamp;
use crate::errors::SharedMemoryError;
use std::ffi::CString;
use std::io;
use std::mem::{MaybeUninit, size_of};
use std::ptr::{self, NonNull};
use tracing::{debug, error, info, warn};

/// Exclusive-write, notify-all buffer shared with frame consumers
pub trait SharedFrameBuffer: Send + Sync {
    fn name(&self) -> &str;

    /// Data capacity in bytes
    fn size(&self) -> usize;

    /// Lock, stamp with `timestamp`, let `write` fill the data, unlock
    fn write_locked(&self, timestamp: TimeStamp, write: &mut dyn FnMut(&mut [u8]));

    /// Wake every consumer waiting for a new frame
    fn notify_all(&self);
}

#[repr(C)]
struct RegionHeader {
    size: u32,
    mutex: libc::pthread_mutex_t,
    condition: libc::pthread_cond_t,
    timestamp: libc::timeval,
}

const HEADER_LEN: usize = size_of::<RegionHeader>();

/// A mapped, process-shared memory region owned by this process
///
/// The region is unmapped and unlinked when dropped.
#[derive(Debug)]
pub struct SharedMemory {
    name: String,
    size: usize,
    mapping: NonNull<u8>,
    mapping_len: usize,
}

// The header's mutex serialises every access to the data
unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

/// Prefix the name with `/` as `shm_open` requires
pub fn normalize_name(name: &str) -> Result<String, SharedMemoryError> {
    let trimmed = name.strip_prefix('/').unwrap_or(name);
    if trimmed.is_empty() || trimmed.contains('/') || trimmed.contains('\0') {
        return Err(SharedMemoryError::InvalidName(name.to_string()));
    }
    Ok(format!("/{trimmed}"))
}

fn os_error(name: &str, operation: &'static str, source: io::Error) -> SharedMemoryError {
    SharedMemoryError::Os {
        name: name.to_string(),
        operation,
        source,
    }
}

impl SharedMemory {
    /// Create a region holding `size` data bytes
    ///
    /// A leftover region with the same name is removed first.
    pub fn create(name: &str, size: usize) -> Result<Self, SharedMemoryError> {
        let name = normalize_name(name)?;
        if size == 0 || size > u32::MAX as usize {
            return Err(SharedMemoryError::InvalidSize { name, size });
        }
        let c_name =
            CString::new(name.clone()).map_err(|_| SharedMemoryError::InvalidName(name.clone()))?;
        let mapping_len = HEADER_LEN + size;

        let fd = open_exclusive(&name, &c_name)?;

        if unsafe { libc::ftruncate(fd, mapping_len as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(os_error(&name, "ftruncate", err));
        }

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapping_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        let mmap_err = io::Error::last_os_error();
        // The mapping keeps the object alive without the descriptor
        unsafe { libc::close(fd) };

        if ptr == libc::MAP_FAILED {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(os_error(&name, "mmap", mmap_err));
        }
        let Some(mapping) = NonNull::new(ptr.cast::<u8>()) else {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(os_error(&name, "mmap", mmap_err));
        };

        let region = Self {
            name,
            size,
            mapping,
            mapping_len,
        };
        // From here on Drop cleans up
        region.init_header()?;

        info!(name = %region.name, size, "Created shared memory");
        Ok(region)
    }

    fn header(&self) -> *mut RegionHeader {
        self.mapping.as_ptr().cast::<RegionHeader>()
    }

    fn init_header(&self) -> Result<(), SharedMemoryError> {
        let header = self.header();
        unsafe {
            ptr::addr_of_mut!((*header).size).write(self.size as u32);
            ptr::addr_of_mut!((*header).timestamp).write(libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            });

            let mut mutex_attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
            check_pthread(
                &self.name,
                "pthread_mutexattr_init",
                libc::pthread_mutexattr_init(mutex_attr.as_mut_ptr()),
            )?;
            // Error checking turns a relock from the owning thread into EDEADLK
            let mut rc = libc::pthread_mutexattr_setpshared(
                mutex_attr.as_mut_ptr(),
                libc::PTHREAD_PROCESS_SHARED,
            );
            if rc == 0 {
                rc = libc::pthread_mutexattr_settype(
                    mutex_attr.as_mut_ptr(),
                    libc::PTHREAD_MUTEX_ERRORCHECK,
                );
            }
            if rc == 0 {
                rc = libc::pthread_mutex_init(
                    ptr::addr_of_mut!((*header).mutex),
                    mutex_attr.as_ptr(),
                );
            }
            libc::pthread_mutexattr_destroy(mutex_attr.as_mut_ptr());
            check_pthread(&self.name, "pthread_mutex_init", rc)?;

            let mut cond_attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
            check_pthread(
                &self.name,
                "pthread_condattr_init",
                libc::pthread_condattr_init(cond_attr.as_mut_ptr()),
            )?;
            let mut rc = libc::pthread_condattr_setpshared(
                cond_attr.as_mut_ptr(),
                libc::PTHREAD_PROCESS_SHARED,
            );
            if rc == 0 {
                rc = libc::pthread_cond_init(
                    ptr::addr_of_mut!((*header).condition),
                    cond_attr.as_ptr(),
                );
            }
            libc::pthread_condattr_destroy(cond_attr.as_mut_ptr());
            check_pthread(&self.name, "pthread_cond_init", rc)?;
        }
        Ok(())
    }

    /// Name as passed to `shm_open`, including the leading `/`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Acquire the region's mutex
    ///
    /// No guard is returned when the lock was not taken, so nothing is
    /// unlocked on its behalf.
    pub fn lock(&self) -> Result<RegionGuard<'_>, SharedMemoryError> {
        let rc = unsafe { libc::pthread_mutex_lock(ptr::addr_of_mut!((*self.header()).mutex)) };
        check_pthread(&self.name, "pthread_mutex_lock", rc)?;
        Ok(RegionGuard { region: self })
    }

    pub fn notify_all(&self) {
        unsafe {
            libc::pthread_cond_broadcast(ptr::addr_of_mut!((*self.header()).condition));
        }
    }
}

impl SharedFrameBuffer for SharedMemory {
    fn name(&self) -> &str {
        SharedMemory::name(self)
    }

    fn size(&self) -> usize {
        SharedMemory::size(self)
    }

    fn write_locked(&self, timestamp: TimeStamp, write: &mut dyn FnMut(&mut [u8])) {
        match self.lock() {
            Ok(mut guard) => {
                guard.set_timestamp(timestamp);
                write(guard.data_mut());
            }
            Err(e) => error!(error = %e, "Skipping frame for unlockable shared memory"),
        }
    }

    fn notify_all(&self) {
        SharedMemory::notify_all(self)
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.mapping.as_ptr().cast(), self.mapping_len);
        }
        match CString::new(self.name.clone()) {
            Ok(c_name) => {
                if unsafe { libc::shm_unlink(c_name.as_ptr()) } != 0 {
                    warn!(
                        name = %self.name,
                        error = %io::Error::last_os_error(),
                        "Failed to unlink shared memory"
                    );
                } else {
                    debug!(name = %self.name, "Released shared memory");
                }
            }
            Err(_) => warn!(name = %self.name, "Cannot unlink shared memory with invalid name"),
        }
    }
}

/// Held lock on a [`SharedMemory`] region, released on drop
pub struct RegionGuard<'a> {
    region: &'a SharedMemory,
}

impl RegionGuard<'_> {
    pub fn data(&self) -> &[u8] {
        let data = unsafe { self.region.mapping.as_ptr().add(HEADER_LEN) };
        unsafe { std::slice::from_raw_parts(data, self.region.size) }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        let data = unsafe { self.region.mapping.as_ptr().add(HEADER_LEN) };
        unsafe { std::slice::from_raw_parts_mut(data, self.region.size) }
    }

    pub fn timestamp(&self) -> TimeStamp {
        let tv = unsafe { ptr::addr_of!((*self.region.header()).timestamp).read() };
        TimeStamp::new(tv.tv_sec as i32, tv.tv_usec as i32)
    }

    pub fn set_timestamp(&mut self, ts: TimeStamp) {
        unsafe {
            ptr::addr_of_mut!((*self.region.header()).timestamp).write(libc::timeval {
                tv_sec: ts.seconds as libc::time_t,
                tv_usec: ts.microseconds as libc::suseconds_t,
            });
        }
    }
}

impl Drop for RegionGuard<'_> {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_mutex_unlock(ptr::addr_of_mut!((*self.region.header()).mutex));
        }
    }
}

fn check_pthread(
    name: &str,
    operation: &'static str,
    rc: libc::c_int,
) -> Result<(), SharedMemoryError> {
    if rc == 0 {
        Ok(())
    } else {
        Err(os_error(name, operation, io::Error::from_raw_os_error(rc)))
    }
}

fn open_exclusive(name: &str, c_name: &CString) -> Result<libc::c_int, SharedMemoryError> {
    let open = || unsafe {
        libc::shm_open(
            c_name.as_ptr(),
            libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
            0o600 as libc::mode_t,
        )
    };

    let fd = open();
    if fd >= 0 {
        return Ok(fd);
    }

    let err = io::Error::last_os_error();
    if err.kind() != io::ErrorKind::AlreadyExists {
        return Err(os_error(name, "shm_open", err));
    }

    warn!(name = %name, "Removing stale shared memory");
    unsafe { libc::shm_unlink(c_name.as_ptr()) };
    let fd = open();
    if fd < 0 {
        return Err(os_error(name, "shm_open", io::Error::last_os_error()));
    }
    Ok(fd)
}
