//! The RPC collaborator that makes editor content durable.
//!
//! Implement [`Persistence`] (the `Send` variant) for a transport; the
//! coordinator and the iframe bridge only ever talk to this trait.

use std::collections::BTreeMap;
use std::fmt;

use miette::Diagnostic;
use quire_editor_core::{Document, NodeId};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Error returned by a persistence call.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The server refused the call; `message` is meant for the user.
    #[error("{message}")]
    #[diagnostic(code(quire::persistence::rejected))]
    Rejected { message: String },

    #[error("transport failure: {0}")]
    #[diagnostic(code(quire::persistence::transport))]
    Transport(String),
}

impl PersistenceError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Rejected { message } => message.clone(),
            Self::Transport(detail) => detail.clone(),
        }
    }
}

/// Which record an editable region belongs to, read from its `data-oe-*`
/// attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub model: Option<SmolStr>,
    pub id: Option<u64>,
    pub field: Option<SmolStr>,
    pub xpath: Option<String>,
    /// Set when the region is a translation term rather than view content.
    pub translation_id: Option<u64>,
}

impl RecordRef {
    pub fn from_node(doc: &Document, node: NodeId) -> Self {
        let text = |name: &str| doc.attr(node, name).filter(|v| !v.is_empty());
        let number = |name: &str| text(name).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            model: text("data-oe-model").map(SmolStr::new),
            id: number("data-oe-id"),
            field: text("data-oe-field").map(SmolStr::new),
            xpath: text("data-oe-xpath").map(str::to_string),
            translation_id: number("data-oe-translation-id").filter(|id| *id != 0),
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.translation_id {
            return write!(f, "translation#{id}");
        }
        write!(f, "{}", self.model.as_deref().unwrap_or("ir.ui.view"))?;
        if let Some(id) = self.id {
            write!(f, "#{id}")?;
        }
        if let Some(field) = &self.field {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}

/// Context sent along with every call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<SmolStr>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SaveContext {
    pub fn with_lang(mut self, lang: impl Into<SmolStr>) -> Self {
        self.lang = Some(lang.into());
        self
    }
}

/// Values for a new attachment record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMetadata {
    pub res_model: Option<SmolStr>,
    pub res_id: Option<u64>,
    pub name: String,
    pub datas_fname: String,
    /// Base64 payload.
    pub datas: String,
    pub mimetype: SmolStr,
    /// Original url, kept so the uncropped image stays reachable.
    pub url: Option<String>,
}

#[trait_variant::make(Persistence: Send)]
pub trait LocalPersistence {
    /// Store the outer html of a view region at `record.xpath`.
    async fn save_view(
        &self,
        record: &RecordRef,
        html: &str,
        context: &SaveContext,
    ) -> Result<(), PersistenceError>;

    /// Store the inner html of a translated term.
    async fn save_translation(
        &self,
        translation_id: u64,
        html: &str,
        context: &SaveContext,
    ) -> Result<(), PersistenceError>;

    async fn attachment_create(&self, metadata: &AttachmentMetadata) -> Result<u64, PersistenceError>;

    async fn attachment_write(&self, id: u64, datas: &str) -> Result<(), PersistenceError>;

    /// One token per id, in order.
    async fn generate_access_token(&self, ids: &[u64]) -> Result<Vec<String>, PersistenceError>;

    /// Render an asset bundle to html.
    async fn render_assets(&self, bundle: &str, context: &SaveContext) -> Result<String, PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_attributes() {
        let doc = Document::from_body_html(
            r#"<div data-oe-model="ir.ui.view" data-oe-id="42" data-oe-field="arch" data-oe-xpath="/t[1]/div[2]" data-oe-translation-id="0">x</div>"#,
        );
        let node = doc.first_child(doc.body()).unwrap();
        let record = RecordRef::from_node(&doc, node);
        assert_eq!(record.model.as_deref(), Some("ir.ui.view"));
        assert_eq!(record.id, Some(42));
        assert_eq!(record.xpath.as_deref(), Some("/t[1]/div[2]"));
        assert_eq!(record.translation_id, None);
        assert_eq!(record.to_string(), "ir.ui.view#42.arch");
    }

    #[test]
    fn test_translation_record_display() {
        let doc = Document::from_body_html(r#"<span data-oe-translation-id="7">t</span>"#);
        let node = doc.first_child(doc.body()).unwrap();
        let record = RecordRef::from_node(&doc, node);
        assert_eq!(record.translation_id, Some(7));
        assert_eq!(record.to_string(), "translation#7");
    }

    #[test]
    fn test_context_serializes_flat() {
        let mut context = SaveContext::default().with_lang("fr_BE");
        context
            .extra
            .insert("website_id".to_string(), serde_json::json!(1));
        let json = serde_json::to_string(&context).unwrap();
        assert_eq!(json, r#"{"lang":"fr_BE","website_id":1}"#);
        let back: SaveContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, context);
    }

    #[test]
    fn test_error_message() {
        let err = PersistenceError::rejected("Access denied");
        assert_eq!(err.message(), "Access denied");
        assert_eq!(err.to_string(), "Access denied");
    }
}
