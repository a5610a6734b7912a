mod btree_index;
mod btree_iterator;
mod btree_node;
mod manager;

pub use btree_index::IndexHandle;
pub use btree_iterator::{CompOp, IndexScan};
pub use btree_node::SplitResult;
pub use manager::IndexManager;
