//! Packaging pipeline for bundleguard.
//!
//! A run mints a token bound to a machine, patches a private copy of the
//! bundle with it, and ships the result as a ZIP archive with a launcher
//! and two plaintext documents describing the key.

mod archive;
mod config;
mod context;
mod copy;
mod docs;
mod error;
mod launcher;
mod pipeline;

pub use archive::archive_dir;
pub use config::{default_path, PackConfig};
pub use context::RunContext;
pub use copy::copy_tree;
pub use docs::{render_key_sheet, render_readme, KEY_FILE, README_FILE};
pub use error::{PackError, PackResult};
pub use launcher::{launcher_name, render_launcher};
pub use pipeline::{PackOutcome, PackRequest, Packager, Stage};
