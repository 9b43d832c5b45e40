//! Analysis collaborator interface
//!
//! Workers depend only on [`Analyzer`] and [`Document`]. A document exposes one
//! [`Revision`] per incremental version of the file, each a graph of typed nodes, plus
//! per-object access to script code and decoded stream payloads. The crate ships
//! [`PdfAnalyzer`], a lightweight scanner for PDF object graphs; anything else that
//! can produce this shape plugs into the pipeline unchanged.

pub mod artifacts;
pub mod fingerprint;
pub mod pdf;
pub mod tree;

pub use artifacts::{extract_embedded_binaries, extract_scripts};
pub use fingerprint::{content_id, tree_fingerprint};
pub use pdf::PdfAnalyzer;
pub use tree::render_tree;

use crate::error::AnalysisError;
use std::collections::BTreeMap;
use std::path::Path;

/// Object identifier within a document
pub type ObjectId = u32;

/// Type and outgoing references of one node in the object graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub kind: String,
    pub children: Vec<ObjectId>,
}

impl NodeInfo {
    pub fn new(kind: impl Into<String>, children: Vec<ObjectId>) -> Self {
        Self {
            kind: kind.into(),
            children,
        }
    }
}

/// Object graph of one document version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Revision {
    pub root: Option<ObjectId>,
    /// Ordered by identifier so rendering is deterministic
    pub nodes: BTreeMap<ObjectId, NodeInfo>,
}

/// Payload-bearing view of a single object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocObject {
    pub id: ObjectId,
    pub script: Option<String>,
    /// Decoded stream bytes; `None` for non-streams and undecodable filters
    pub stream: Option<Vec<u8>>,
}

impl DocObject {
    pub fn contains_script(&self) -> bool {
        self.script.is_some()
    }

    pub fn script_code(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn decoded_stream(&self) -> Option<&[u8]> {
        self.stream.as_deref()
    }
}

/// A parsed file
pub trait Document {
    /// One entry per version, oldest first
    fn revisions(&self) -> &[Revision];

    /// Objects of `version` carrying script code, in document order
    fn script_objects(&self, version: usize) -> Vec<ObjectId>;

    /// Stream objects of `version`, in document order
    fn stream_objects(&self, version: usize) -> Vec<ObjectId>;

    fn object(&self, version: usize, id: ObjectId) -> Option<&DocObject>;
}

/// Parses one input file into a [`Document`]. Must be shareable across workers.
pub trait Analyzer: Send + Sync {
    type Document: Document;

    fn parse(&self, path: &Path) -> Result<Self::Document, AnalysisError>;
}
