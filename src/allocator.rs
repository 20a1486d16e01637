//! Global memory allocator configuration.
//!
//! `mimalloc` replaces the system allocator to reduce fragmentation across
//! the large, short-lived chunk buffers the pipeline allocates per window.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
