//! Sharpitect Store — SQLite graph persistence and the navigation query layer

pub mod navigation;
pub mod repository;


pub use navigation::{
    CodeSnippet, Direction, GraphStats, InheritanceDirection, MatchMode, NavigationService,
    Relationship, SearchOutcome, TraversalHit, TreeEntry, UsageKind, DEFAULT_LIMIT,
};
pub use repository::GraphRepository;
