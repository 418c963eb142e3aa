//! archcanvas: the diagram graph model behind a system-design practice
//! editor — typed nodes, ER relationship edges with crow's-foot cardinality
//! notation, deterministic edge geometry, and the save/load payload shapes
//! the surrounding application persists.
//!
//! The crate is deliberately split along the same seams as the editor UI:
//! rendering components ([`render`]) treat the node/edge collections as
//! read-only input and request structural changes through [`events`]; the
//! single owner of a [`Diagram`] applies them.

pub mod cardinality;
pub mod cli;
pub mod context;
pub mod error;
pub mod events;
pub mod geometry;
pub mod model;
pub mod payload;
pub mod property;
pub mod render;
pub mod sanitize;
#[cfg(feature = "server")]
pub mod serve;
pub mod utils;

pub use cardinality::{Cardinality, MarkerKind};
pub use context::{CanvasContext, ComponentSummary, ConnectionSummary};
pub use error::{DiagramError, ImportError};
pub use events::{CanvasEvent, EventSink, RecordingSink};
pub use geometry::{EdgeEndpoints, EdgeParams, Point, Position, compute_edge_params, is_bidirectional};
pub use model::{AttributeRow, Diagram, DiagramMetadata, Edge, NodeData, NodeType, ScalarValue};
pub use payload::{DiagramOwner, Permission, SaveDiagramPayload, SavedDiagram, import_diagram};
pub use property::{CustomProperty, PropertyEditor, PropertyType};
