pub mod codec;
pub mod delta;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;

// Re-export commonly used types
pub use codec::{shorten, widen, ExecutionCountCodec, HexPrefixCodec};
pub use delta::{CellAnnotations, DownstreamUpdate, GraphDelta};
pub use edge::{LinkKind, LinkLabel, Uplink};
pub use error::CoreError;
pub use graph::{DependencyGraph, EdgeView, GraphSnapshot, NodeView};
pub use id::{CellId, ShortCellId, SHORT_ID_LEN};
pub use node::{CellNode, CellState};
