//! Concrete tool implementations.
//!
//! spec.md excludes "a web-search provider zoo" from scope, but a complete
//! runtime needs at least one tool at each risk tier to exercise the
//! gateway/policy contract end to end. These are grounded in the original
//! implementation's `tools/local/*.py` and registered once at startup by
//! the CLI wiring (`src/bin/cli.rs`), per spec.md §4.3. `tasks` additionally
//! gives the scheduler (src/scheduler) a real entry point, per
//! `tools/registry.py`'s `register_local_tools`.

pub mod fs;
pub mod notes;
pub mod tasks;
pub mod web_search;

pub use fs::{FsReadTool, FsWriteTool};
pub use notes::{NotesAppendTool, NotesSearchTool};
pub use tasks::TaskCreateTool;
pub use web_search::{SearchProvider, WebSearchTool};
