pub mod access;
pub mod ancestry;
pub mod category;
pub mod domain;
pub mod error;
pub mod export;
pub mod memory;
pub mod ordering;
pub mod ports;
pub mod service;
pub mod tree;
pub mod validation;

pub use access::Actor;
pub use domain::{
    AuthSession, Category, CategoryNode, ExportArtifact, Material, MaterialSegments, NewSegment,
    NewUser, Paged, ReorderOutcome, Segment, SegmentFilter, SegmentOrder, SegmentPatch,
    SegmentWithAncestry, User, UserCredentials, UserPatch, LEVEL_COUNT, MAX_CATEGORY_DEPTH,
};
pub use error::{CoreError, CoreResult};
pub use memory::MemoryStore;
pub use ports::{DatabaseService, PortError, PortResult};
pub use service::Catalog;
