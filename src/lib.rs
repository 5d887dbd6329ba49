/// Use mimalloc as the global allocator for the binary.
/// Faster than glibc malloc for the small transient allocations the
/// codec makes per chunk, with better thread-local caching.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod ascii85;
pub mod common;
