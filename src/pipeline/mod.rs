//! Pipeline stages for relinking and exporting Xournal++ notebooks.
//!
//! Each submodule implements exactly one step. The batch drivers in
//! [`crate::batch`] and [`crate::stream`] wire them together.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌────────── FileIndex (once per run) ──────────┐
//!            │                                              ▼
//! discover ──┴──▶ reference ──▶ matcher ──▶ repair ──▶ render
//! (walkdir)      (regex)       (scoring)   (gzip I/O)  (subprocess)
//! ```
//!
//! 1. [`discover`]  enumerate documents and snapshot candidate files
//! 2. [`reference`] find the first embedded `filename="…"` and splice a new value in
//! 3. [`matcher`]   pick the candidate sharing the longest trailing directory run
//! 4. [`repair`]    read, decide and atomically rewrite one document; blocking,
//!    so the drivers run it under `spawn_blocking`
//! 5. [`render`]    run the external renderer with a timeout and publish its
//!    output atomically

pub mod discover;
pub mod matcher;
pub mod reference;
pub mod render;
pub mod repair;
