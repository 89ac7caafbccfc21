pub mod call_tree;

pub use call_tree::{CallTree, RootPolicy};
