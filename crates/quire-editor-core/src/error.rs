//! Error taxonomy for the editor.

use std::time::Duration;

use miette::Diagnostic;

use crate::dom::{DocumentId, NodeId};

/// Main error type for editor operations.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum EditorError {
    /// Required DOM target missing or not mounted. Fatal to one session only.
    #[error("configuration error: {0}")]
    #[diagnostic(code(quire::configuration))]
    Configuration(#[from] ConfigurationError),

    /// Editor assets did not load within the allotted time.
    #[error("can't load assets of the wysiwyg editor ({bundle}) after {after:?}")]
    #[diagnostic(
        code(quire::asset_timeout),
        help("the editor is unusable without its assets; check the asset bundle")
    )]
    AssetLoadTimeout { bundle: String, after: Duration },

    /// No valid insertion point outside protected content.
    #[error("no editable position available around {node}")]
    #[diagnostic(code(quire::correction_impossible))]
    CorrectionImpossible { node: NodeId },

    /// A single region failed to persist.
    #[error("failed to save {record}: {message}")]
    #[diagnostic(code(quire::persistence))]
    Persistence { record: String, message: String },

    /// The iframe never called back.
    #[error("iframe handshake {callback} did not complete")]
    #[diagnostic(code(quire::handshake))]
    Handshake { callback: String },

    /// Selections cannot span two browsing contexts.
    #[error("range endpoints belong to different documents")]
    #[diagnostic(code(quire::cross_frame_range))]
    CrossFrameRange,

    #[error(transparent)]
    #[diagnostic(code(quire::options))]
    InvalidOptions(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("target {0} must be present in the document")]
    #[diagnostic(code(quire::configuration::not_mounted))]
    NotMounted(NodeId),

    #[error("target {0} does not exist")]
    #[diagnostic(code(quire::configuration::missing))]
    MissingTarget(NodeId),

    #[error("session is bound to {expected}, got {actual}")]
    #[diagnostic(code(quire::configuration::wrong_document))]
    WrongDocument {
        expected: DocumentId,
        actual: DocumentId,
    },

    #[error("session is not attached")]
    #[diagnostic(code(quire::configuration::detached))]
    NotAttached,
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
