//! Copy-on-write 2-D R-Tree over `(lat, lng)` points (component C4).

mod geo;
mod meta;
mod node;
mod tree;

pub use geo::{BBox, haversine_km};
pub use meta::RTreeMeta;
pub use node::RNode;
pub use tree::{PointHit, RTree, RadiusHit};
