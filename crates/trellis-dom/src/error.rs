use thiserror::Error;

use crate::NodeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0:?} is not a text node")]
    NotAText(NodeId),
    #[error("node {0:?} cannot have children")]
    NotAContainer(NodeId),
    #[error("node {0:?} cannot be inserted into a tree")]
    NotInsertable(NodeId),
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("element {0:?} already has a shadow root")]
    ShadowRootExists(NodeId),
}

/// Failure of a render step. The patcher keeps its previous tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
