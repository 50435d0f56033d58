//! Execution layer: the code path between fork and exec
//!
//! - **descriptors**: closing the inherited descriptor table in the child
//! - **path**: `PATH` search-list resolution
//! - **exec**: `execvpe`-equivalent with shebang-less script fallback
//! - **child**: the child-side bootstrap that never returns

pub(crate) mod child;
pub mod descriptors;
pub mod exec;
pub mod path;

pub use exec::{execvpe, execvpe_with_path};
pub use path::{effective_path, DEFAULT_PATH};
