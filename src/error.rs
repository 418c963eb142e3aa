use thiserror::Error;

/// Errors surfaced by the diagram library itself. The CLI and server wrap
/// these in `anyhow` at the boundary.
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("unknown edge '{0}'")]
    UnknownEdge(String),

    #[error("svg formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("failed to render diagram: {0}")]
    Render(String),
}

/// Import is all-or-nothing: any of these means no `Diagram` was produced.
/// Dangling edges are an explicit failure rather than a silent drop so that
/// a foreign or corrupt file never yields a partially-constructed graph.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unrecognized diagram format; expected JSON or XML interchange")]
    UnrecognizedFormat,

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML payload: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("edge '{edge_id}' references missing node '{node_id}'")]
    DanglingEdge { edge_id: String, node_id: String },
}
