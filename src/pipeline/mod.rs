//! Local building blocks of a conversion job.
//!
//! ## Data Flow
//!
//! ```text
//! workspace ──▶ toolchain ──▶ invoke
//! (in/, out/)   (classpath)   (subprocess)
//! ```
//!
//! 1. [`workspace`] allocates the per-job input and output directories;
//!    both are deleted when dropped
//! 2. [`toolchain`] assembles the conversion engine's classpath from the
//!    installation root; blocking, so it runs in `spawn_blocking`
//! 3. [`invoke`] builds the command line and waits for the engine to exit
//!
//! Remote I/O is not part of the pipeline; see [`crate::transfer`].

pub mod invoke;
pub mod toolchain;
pub mod workspace;
