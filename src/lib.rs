//! Purpose: Library crate for decoding bracket-path form parameters into nested trees.
//! Exports: `api` (public decode surface) and `core` (extraction, grammar, assembly, errors).
//! Role: Shared by the `formnest` CLI, its HTTP server, and embedding applications.
//! Invariants: Decoding is pure and synchronous; no I/O or global state in `core`.
//! Invariants: Prefer `api` re-exports over reaching into `core` module paths.
pub mod api;
pub mod core;
