//! Linux-specific shared memory operations

use crate::error::ShmResult;
use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Create a shared-memory backing file and map it read-write.
///
/// Fails if the file already exists; callers translate that into their own
/// already-exists error. Pages are pre-faulted so the first wait/post on the
/// segment does not take a page fault.
pub fn create_segment_mmap(path: &Path, size: usize) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600) // Owner read/write only
        .open(path)?;

    file.set_len(size as u64)?;

    let mmap = unsafe { MmapOptions::new().populate().map_mut(&file)? };

    Ok(mmap)
}

/// Map an existing shared-memory backing file read-write.
///
/// The mapping is read-write even for wait-only handles: consuming a futex
/// wake atomically rewrites the word, so a PROT_READ mapping would fault.
/// Access direction is enforced at the handle-type level instead.
pub fn attach_segment_mmap(path: &Path) -> ShmResult<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;

    let mmap = unsafe { MmapOptions::new().populate().map_mut(&file)? };

    Ok(mmap)
}

/// Check if a process is alive using a null-signal probe.
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::Error::ESRCH) => false, // No such process
        Err(nix::Error::EPERM) => true,  // Process exists but no permission to signal
        Err(_) => false,
    }
}

/// Get current process ID
pub fn current_pid() -> u32 {
    getpid().as_raw() as u32
}
