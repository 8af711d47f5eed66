pub mod config;
pub mod error;
pub mod fragment;
pub mod node;
pub mod parametrize;
pub mod provider;
pub mod snippet;
pub mod status;
pub mod store;
pub mod tree;

// Re-export main types and functions
pub use error::{FragmentError, Result};
pub use fragment::{Fragment, FragmentEdit, TagSet};
pub use node::{ContextValue, Node};
pub use parametrize::{parametrize, parametrize_with_datatypes, Position, Selection};
pub use provider::{AddOutcome, DeleteOutcome, FragmentProvider};
pub use status::{Status, StatusLevel};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use tree::{project, ProjectedTree};
