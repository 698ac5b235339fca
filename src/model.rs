/*!
# Query Model

The compiled form of queries: path steps, constraints, functions and
predicates, merged into a deduplicated [`Forest`].
*/

pub mod function;
pub mod node;
pub mod path;
pub mod step;

pub use function::Function;
pub use node::{Forest, ForestError, Node, NodeId, NodeKind, Predicate};
pub use path::{Link, StructuralPath};
pub use step::{Axis, CompareOp, Comparison, ExpandedName, NodeTest, Position, Step};
