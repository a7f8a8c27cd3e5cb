//! Sharpitect Core — declaration graph model, path helper, dependency index

pub mod cancel;
pub mod deps;
pub mod error;
pub mod graph;
pub mod model;
pub mod paths;

#[cfg(test)]
mod tests;

pub use cancel::CancelFlag;
pub use deps::DependencyTracker;
pub use error::{Result, SharpitectError};
pub use graph::Graph;
pub use model::{
    ArchLevel, CommentMarker, DeclarationNode, EdgeKind, NodeKind, RelationshipEdge,
};
