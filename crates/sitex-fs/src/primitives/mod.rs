pub mod access;
pub mod atomic_write;

pub use access::{is_executable, is_readable, is_writable};
pub use atomic_write::{AtomicWriteOptions, atomic_write};
