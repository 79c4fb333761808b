//! Tree Views
//!
//! - `TreeState` - expand/collapse/select/filter state shared by all trees
//! - `CardTree` - card hierarchy kept in sync with the graph model (also
//!   used for the permission tree)
//! - `NodeTree` - the node hierarchy
//! - `BranchList` - branch library filtered against the selected node

pub mod branch_list;
pub mod card_tree;
pub mod node_tree;
pub mod state;

pub use branch_list::BranchList;
pub use card_tree::{CardEntry, CardRow, CardTree, SyncOutcome};
pub use node_tree::{NodeRow, NodeTree};
pub use state::{SelectionMode, TreeItemState, TreeState};
