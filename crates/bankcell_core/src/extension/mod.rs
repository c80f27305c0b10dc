//! External plugin support.
//!
//! Plugins live in `plugins/<dir>/` with a `plugin.json` manifest naming a
//! per-platform entry executable. The kernel runs one entry per request
//! against one resolved cell and collects its `output.json`.

pub mod kernel;
pub mod manifest;
