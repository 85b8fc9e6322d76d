//! In-memory persistence for integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use quire_editor_zones::{AttachmentMetadata, Persistence, PersistenceError, RecordRef, SaveContext};
use tokio::sync::Barrier;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SaveView { record: RecordRef, html: String, lang: Option<String> },
    SaveTranslation { id: u64, html: String, lang: Option<String> },
    Create(AttachmentMetadata),
    Write { id: u64, datas: String },
    Token(Vec<u64>),
    Render(String),
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    calls: Mutex<Vec<Call>>,
    /// Records (by id) whose saves are rejected.
    reject_records: BTreeSet<u64>,
    reject_translations: BTreeSet<u64>,
    reject_attachments: bool,
    /// Makes every save wait until this many saves are in flight.
    rendezvous: Option<Barrier>,
    next_attachment: AtomicU64,
    renders: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_attachment: AtomicU64::new(100),
            ..Self::default()
        }
    }

    pub fn rejecting(records: &[u64]) -> Self {
        Self {
            reject_records: records.iter().copied().collect(),
            ..Self::new()
        }
    }

    pub fn rejecting_translations(mut self, ids: &[u64]) -> Self {
        self.reject_translations = ids.iter().copied().collect();
        self
    }

    pub fn rejecting_attachments(mut self) -> Self {
        self.reject_attachments = true;
        self
    }

    pub fn with_rendezvous(mut self, saves: usize) -> Self {
        self.rendezvous = Some(Barrier::new(saves));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SaveView { .. } | Call::SaveTranslation { .. }))
            .collect()
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn meet(&self) {
        if let Some(barrier) = &self.rendezvous {
            barrier.wait().await;
        }
    }
}

impl Persistence for MemoryStore {
    async fn save_view(
        &self,
        record: &RecordRef,
        html: &str,
        context: &SaveContext,
    ) -> Result<(), PersistenceError> {
        self.meet().await;
        self.record(Call::SaveView {
            record: record.clone(),
            html: html.to_string(),
            lang: context.lang.as_ref().map(|l| l.to_string()),
        });
        match record.id {
            Some(id) if self.reject_records.contains(&id) => {
                Err(PersistenceError::rejected(format!("record {id} is locked")))
            }
            _ => Ok(()),
        }
    }

    async fn save_translation(
        &self,
        translation_id: u64,
        html: &str,
        context: &SaveContext,
    ) -> Result<(), PersistenceError> {
        self.meet().await;
        self.record(Call::SaveTranslation {
            id: translation_id,
            html: html.to_string(),
            lang: context.lang.as_ref().map(|l| l.to_string()),
        });
        if self.reject_translations.contains(&translation_id) {
            return Err(PersistenceError::rejected("Translation is not valid"));
        }
        Ok(())
    }

    async fn attachment_create(&self, metadata: &AttachmentMetadata) -> Result<u64, PersistenceError> {
        self.record(Call::Create(metadata.clone()));
        if self.reject_attachments {
            return Err(PersistenceError::Transport("connection reset".to_string()));
        }
        Ok(self.next_attachment.fetch_add(1, Ordering::SeqCst))
    }

    async fn attachment_write(&self, id: u64, datas: &str) -> Result<(), PersistenceError> {
        self.record(Call::Write {
            id,
            datas: datas.to_string(),
        });
        if self.reject_attachments {
            return Err(PersistenceError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    async fn generate_access_token(&self, ids: &[u64]) -> Result<Vec<String>, PersistenceError> {
        self.record(Call::Token(ids.to_vec()));
        Ok(ids.iter().map(|id| format!("tok{id}")).collect())
    }

    async fn render_assets(&self, bundle: &str, _context: &SaveContext) -> Result<String, PersistenceError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.record(Call::Render(bundle.to_string()));
        Ok(r#"<link rel="stylesheet" href="/web_editor/iframe.css"><script src="/ignored.js"></script>"#.to_string())
    }
}
