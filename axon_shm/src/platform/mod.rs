//! Platform-specific memory mapping and process helpers

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::{attach_segment_mmap, create_segment_mmap, current_pid, is_process_alive};

#[cfg(not(target_os = "linux"))]
compile_error!("axon_shm requires Linux (futex syscall, /dev/shm backing files)");
