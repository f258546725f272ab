//! Generic utility primitives with zero domain knowledge.
//!
//! - `artifact` - Local file resolution (literal paths and globs)
//! - `base_path` - Remote path joining utilities
//! - `shell` - Shell escaping and quoting

pub mod artifact;
pub mod base_path;
pub mod shell;
