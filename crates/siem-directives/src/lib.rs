//! Peripheral collaborators for the correlation core: a TOML directive
//! loader and a minimal rule matcher. Neither knows what a backlog is.

mod loader;
mod matcher;

pub use loader::{load_dir, DirectiveError};
pub use matcher::SimpleMatcher;
