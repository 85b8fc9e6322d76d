//! Page-level editing across many `.o_editable` regions.
//!
//! Every region root gets its own [`EditingSession`] and is tagged with
//! [`REGION_ATTR`]; events are routed to the owning session by walking up
//! to the nearest tagged ancestor. Saving flushes pending image crops, then
//! persists every dirty region concurrently. One region failing never rolls
//! back or blocks the others.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use futures_util::future::join_all;
use quire_editor_core::classify::{EDITABLE_CLASS, EditableClassRule, ReadonlyAttr};
use quire_editor_core::engine::EDITABLE_CLASS as ENGINE_EDITABLE_CLASS;
use quire_editor_core::error::ConfigurationError;
use quire_editor_core::media::{
    CROP_ID_ATTR, CROP_MIMETYPE_ATTR, CROP_ORIGINAL_SRC_ATTR, CROP_RES_ID_ATTR,
    CROP_RES_MODEL_ATTR, CROPPED_CLASS,
};
use quire_editor_core::session::SESSION_ATTR;
use quire_editor_core::{
    Document, DocumentId, EditingSession, EditorError, EditorOptions, Key, KeyEvent, KeyOutcome,
    NodeId, Pointer, Result, SelectionRange,
};
use regex::Regex;
use smol_str::SmolStr;
use tracing::{debug, error, trace, warn};

use crate::persistence::{AttachmentMetadata, Persistence, PersistenceError, RecordRef, SaveContext};

/// Attribute tagging a region root with its [`RegionId`].
pub const REGION_ATTR: &str = "data-quire-region";

/// Class flagging a region changed since the last save.
pub const DIRTY_CLASS: &str = "o_dirty";

/// Returned by [`MultiZoneCoordinator::before_unload`].
pub const UNLOAD_WARNING: &str = "This document is not saved!";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\n\r]+").unwrap());

fn collapse_whitespace(html: &str) -> String {
    WHITESPACE.replace_all(html, " ").into_owned()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region-{}", self.0)
    }
}

/// Notifications for the host page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZoneEvent {
    Saved(RecordRef),
    Canceled { record: RecordRef, message: String },
}

/// Messages that need the user's attention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserNotice {
    /// Blocking alert carrying the server's message.
    Alert(String),
}

/// Per-region outcome of [`MultiZoneCoordinator::save`].
#[derive(Debug, Default)]
pub struct SaveReport {
    pub saved: Vec<RegionId>,
    pub failed: Vec<(RegionId, EditorError)>,
}

impl SaveReport {
    /// Whether anything needed saving.
    pub fn was_dirty(&self) -> bool {
        !self.saved.is_empty() || !self.failed.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Region {
    root: NodeId,
    record: RecordRef,
    session: EditingSession,
    /// `contenteditable` before the engine bound the root.
    contenteditable: Option<String>,
    /// Whitespace-collapsed content at the last save, in translation mode.
    translated: Option<String>,
}

struct CropJob {
    region: RegionId,
    img: NodeId,
    crop_id: Option<u64>,
    metadata: AttachmentMetadata,
}

enum SaveJob {
    View { html: String },
    Translation { id: u64, html: String },
}

pub struct MultiZoneCoordinator<P> {
    persistence: P,
    options: EditorOptions,
    context: SaveContext,
    lang: Option<SmolStr>,
    document: Option<DocumentId>,
    regions: BTreeMap<RegionId, Region>,
    next_region: u32,
    focused: Option<RegionId>,
    events: Vec<ZoneEvent>,
    notices: Vec<UserNotice>,
}

impl<P> fmt::Debug for MultiZoneCoordinator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiZoneCoordinator")
            .field("document", &self.document)
            .field("lang", &self.lang)
            .field("regions", &self.regions.keys().collect::<Vec<_>>())
            .field("focused", &self.focused)
            .finish_non_exhaustive()
    }
}

impl<P: Persistence> MultiZoneCoordinator<P> {
    pub fn new(persistence: P, options: EditorOptions) -> Self {
        Self {
            persistence,
            options,
            context: SaveContext::default(),
            lang: None,
            document: None,
            regions: BTreeMap::new(),
            next_region: 1,
            focused: None,
            events: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: SaveContext) -> Self {
        self.context = context;
        self
    }

    /// Translation editing in `lang`: text formatting only, readonly nodes
    /// protected, translated terms saved on their own.
    pub fn with_translation(mut self, lang: impl Into<SmolStr>) -> Self {
        let lang = lang.into();
        let translate = EditorOptions::translate();
        self.options.toolbar = translate.toolbar;
        for plugin in translate.disabled_plugins {
            if !self.options.is_plugin_disabled(&plugin) {
                self.options.disabled_plugins.push(plugin);
            }
        }
        self.context.lang = Some(lang.clone());
        self.lang = Some(lang);
        self
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn is_translating(&self) -> bool {
        self.lang.is_some()
    }

    // === Lifecycle ===

    /// Discover the regions of `doc` and attach a session to each. Returns
    /// how many regions were attached.
    pub fn start(&mut self, doc: &mut Document) -> Result<usize> {
        if self.document.is_some() {
            self.destroy(doc);
        }
        let roots = doc.find_all(doc.body(), |d, n| {
            d.has_class(n, EDITABLE_CLASS)
                && !d.ancestors(n).skip(1).any(|a| d.has_class(a, EDITABLE_CLASS))
        });

        for root in roots {
            let id = RegionId(self.next_region);
            self.next_region += 1;
            let mut session = EditingSession::new(self.options.clone())
                .with_rule("editable_class", EditableClassRule);
            if self.is_translating() {
                session = session.with_rule("readonly", ReadonlyAttr);
            }
            let contenteditable = doc.attr(root, "contenteditable").map(str::to_string);
            if let Err(err) = session.attach(doc, root) {
                error!(target: "quire::zones", region = %id, %root, "region skipped: {err}");
                continue;
            }
            doc.set_attr(root, REGION_ATTR, id.0.to_string());
            let record = RecordRef::from_node(doc, root);
            let translated = self
                .is_translating()
                .then(|| collapse_whitespace(&doc.inner_html(root)));
            trace!(target: "quire::zones", region = %id, %record, "region attached");
            self.regions.insert(
                id,
                Region {
                    root,
                    record,
                    session,
                    contenteditable,
                    translated,
                },
            );
        }

        self.document = Some(doc.id());
        debug!(target: "quire::zones", regions = self.regions.len(), translating = self.is_translating(), "started");
        Ok(self.regions.len())
    }

    /// Detach every session and untag the regions. Safe to call repeatedly.
    pub fn destroy(&mut self, doc: &mut Document) {
        if self.document.is_some_and(|d| d != doc.id()) {
            warn!(target: "quire::zones", "destroy called with a foreign document");
            return;
        }
        for (id, mut region) in std::mem::take(&mut self.regions) {
            region.session.destroy(doc);
            doc.remove_attr(region.root, REGION_ATTR);
            doc.remove_class(region.root, DIRTY_CLASS);
            trace!(target: "quire::zones", region = %id, "region detached");
        }
        self.focused = None;
        if self.document.take().is_some() {
            debug!(target: "quire::zones", "destroyed");
        }
    }

    // === Registry ===

    pub fn region_ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.keys().copied()
    }

    pub fn region_root(&self, id: RegionId) -> Option<NodeId> {
        self.regions.get(&id).map(|r| r.root)
    }

    pub fn record(&self, id: RegionId) -> Option<&RecordRef> {
        self.regions.get(&id).map(|r| &r.record)
    }

    pub fn session(&self, id: RegionId) -> Option<&EditingSession> {
        self.regions.get(&id).map(|r| &r.session)
    }

    pub fn session_mut(&mut self, id: RegionId) -> Option<&mut EditingSession> {
        self.regions.get_mut(&id).map(|r| &mut r.session)
    }

    /// The region owning `node`, if any.
    pub fn region_of(&self, doc: &Document, node: NodeId) -> Option<RegionId> {
        if self.document != Some(doc.id()) || !doc.contains_id(node) {
            return None;
        }
        doc.ancestors(node)
            .find_map(|n| doc.attr(n, REGION_ATTR))
            .and_then(|v| v.parse().ok())
            .map(RegionId)
            .filter(|id| self.regions.contains_key(id))
    }

    /// Region that last received input.
    pub fn focused_region(&self) -> Option<RegionId> {
        self.focused
    }

    fn route(&mut self, doc: &Document, node: NodeId) -> Option<RegionId> {
        let id = self.region_of(doc, node)?;
        self.focused = Some(id);
        Some(id)
    }

    fn check_document(&self, doc: &Document) -> Result<()> {
        match self.document {
            None => Err(ConfigurationError::NotAttached.into()),
            Some(expected) if expected != doc.id() => Err(ConfigurationError::WrongDocument {
                expected,
                actual: doc.id(),
            }
            .into()),
            Some(_) => Ok(()),
        }
    }

    // === Input routing ===

    /// Key pressed with the caret in `node`.
    pub fn handle_keydown(&mut self, doc: &mut Document, node: NodeId, event: &KeyEvent) -> Result<KeyOutcome> {
        self.check_document(doc)?;
        let Some(id) = self.route(doc, node) else {
            // outside every region nothing is editable
            let edits = event.is_printable() || matches!(event.key, Key::Backspace | Key::Delete);
            return Ok(if edits {
                KeyOutcome::Prevented
            } else {
                KeyOutcome::Proceed
            });
        };
        let region = self.region_mut(id)?;
        let outcome = region.session.handle_keydown_at(doc, node, event)?;
        if let KeyOutcome::MediaRemoved(_) = outcome {
            self.mark_changed(doc, id);
        }
        Ok(outcome)
    }

    /// Key released in `node`. Backspace and Delete empty an editable left
    /// with nothing but blank paragraphs.
    pub fn handle_keyup(&mut self, doc: &mut Document, node: NodeId, event: &KeyEvent) -> Result<()> {
        self.check_document(doc)?;
        let Some(id) = self.route(doc, node) else {
            return Ok(());
        };
        let region = self.region_mut(id)?;
        region.session.handle_keyup(doc, event)?;
        if !matches!(event.key, Key::Backspace | Key::Delete) {
            return Ok(());
        }
        let Some(editable) = doc.ancestors(node).find(|n| doc.has_class(*n, EDITABLE_CLASS)) else {
            return Ok(());
        };
        let only_paragraphs = doc
            .descendants(editable)
            .skip(1)
            .filter(|n| doc.is_element(*n))
            .all(|n| doc.is_tag(n, "p") || doc.is_tag(n, "br"));
        let blank = doc.text_content(editable).trim().is_empty();
        if only_paragraphs && blank && doc.has_children(editable) {
            doc.remove_children(editable);
            trace!(target: "quire::zones", region = %id, %editable, "emptied blank editable");
            self.notify_change(doc, Some(editable))?;
        }
        Ok(())
    }

    pub fn handle_mouseup(&mut self, doc: &mut Document, target: NodeId, pointer: Option<Pointer>) -> Result<()> {
        self.check_document(doc)?;
        let Some(id) = self.route(doc, target) else {
            return Ok(());
        };
        self.region_mut(id)?
            .session
            .handle_mouseup(doc, target, pointer)
    }

    pub fn handle_range(&mut self, doc: &mut Document, range: SelectionRange) -> Result<()> {
        self.check_document(doc)?;
        let Some(id) = self.route(doc, range.sc) else {
            return Ok(());
        };
        self.region_mut(id)?.session.handle_range(doc, range)
    }

    /// Run deferred key work in the focused region.
    pub fn tick(&mut self, doc: &mut Document) -> Result<()> {
        self.check_document(doc)?;
        let Some(id) = self.focused else {
            return Ok(());
        };
        self.region_mut(id)?.session.tick(doc)
    }

    /// Content changed in the region of `node`, or the focused region.
    pub fn notify_change(&mut self, doc: &mut Document, node: Option<NodeId>) -> Result<()> {
        self.check_document(doc)?;
        let id = match node {
            Some(node) => self.route(doc, node),
            None => self.focused,
        };
        let Some(id) = id else {
            return Ok(());
        };
        let translating = self.is_translating();
        let region = self.region_mut(id)?;
        if translating {
            // paragraphs only come from pasting
            let root = region.root;
            for p in doc.find_all(root, |d, n| n != root && d.is_tag(n, "p")) {
                doc.unwrap_node(p);
            }
        }
        region.session.on_change(doc)?;
        self.mark_changed(doc, id);
        Ok(())
    }

    fn region_mut(&mut self, id: RegionId) -> Result<&mut Region> {
        self.regions
            .get_mut(&id)
            .ok_or_else(|| ConfigurationError::NotAttached.into())
    }

    fn mark_changed(&mut self, doc: &mut Document, id: RegionId) {
        let Some(region) = self.regions.get(&id) else {
            return;
        };
        let dirty = match &region.translated {
            Some(baseline) => collapse_whitespace(&doc.inner_html(region.root)) != *baseline,
            None => true,
        };
        doc.toggle_class(region.root, DIRTY_CLASS, dirty);
    }

    // === Dirty tracking ===

    fn region_is_dirty(&self, doc: &Document, region: &Region) -> bool {
        match &region.translated {
            Some(baseline) => collapse_whitespace(&doc.inner_html(region.root)) != *baseline,
            None => region.session.is_dirty(doc).unwrap_or(false),
        }
    }

    pub fn is_dirty(&self, doc: &Document) -> bool {
        self.regions
            .values()
            .any(|region| self.region_is_dirty(doc, region))
    }

    pub fn dirty_regions(&self, doc: &Document) -> Vec<RegionId> {
        self.regions
            .iter()
            .filter(|(_, region)| self.region_is_dirty(doc, region))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Warning to show before leaving the page, if anything is unsaved.
    pub fn before_unload(&self, doc: &Document) -> Option<&'static str> {
        self.is_dirty(doc).then_some(UNLOAD_WARNING)
    }

    /// Outer html of a region as stored: editor classes and attributes
    /// stripped.
    pub fn cleaned_html(&self, doc: &Document, id: RegionId) -> Option<String> {
        let region = self.regions.get(&id)?;
        let mut scratch = Document::new();
        let node = scratch.import(&doc.export(region.root));
        for class in [EDITABLE_CLASS, DIRTY_CLASS, ENGINE_EDITABLE_CLASS] {
            scratch.remove_class(node, class);
        }
        scratch.remove_attr(node, REGION_ATTR);
        scratch.remove_attr(node, SESSION_ATTR);
        match &region.contenteditable {
            Some(value) => scratch.set_attr(node, "contenteditable", value.as_str()),
            None => {
                scratch.remove_attr(node, "contenteditable");
            }
        }
        Some(scratch.outer_html(node))
    }

    // === Saving ===

    /// Persist every dirty region.
    ///
    /// Pending crops are flushed first; a region whose crop could not be
    /// stored is not persisted, so stored html never points at an image
    /// that does not exist yet. Regions are then saved concurrently and
    /// reported one by one.
    pub async fn save(&mut self, doc: &mut Document) -> Result<SaveReport> {
        self.check_document(doc)?;
        let dirty = self.dirty_regions(doc);
        let mut report = SaveReport::default();
        if dirty.is_empty() {
            debug!(target: "quire::zones", "nothing to save");
            return Ok(report);
        }

        let mut crop_failures = self.flush_cropped_images(doc).await;

        let mut jobs = Vec::new();
        for id in dirty {
            if let Some(err) = crop_failures.remove(&id) {
                self.fail(&mut report, id, err);
                continue;
            }
            let Some(region) = self.regions.get(&id) else {
                continue;
            };
            let job = match (self.is_translating(), region.record.translation_id) {
                (true, Some(translation_id)) => SaveJob::Translation {
                    id: translation_id,
                    html: doc.inner_html(region.root),
                },
                _ => SaveJob::View {
                    html: self.cleaned_html(doc, id).unwrap_or_default(),
                },
            };
            jobs.push((id, region.record.clone(), job));
        }

        let persistence = &self.persistence;
        let context = &self.context;
        let results = join_all(jobs.iter().map(|(region, record, job)| async move {
            let result = match job {
                SaveJob::View { html } => persistence.save_view(record, html, context).await,
                SaveJob::Translation { id, html } => {
                    persistence.save_translation(*id, html, context).await
                }
            };
            (*region, result)
        }))
        .await;

        for (id, result) in results {
            match result {
                Ok(()) => self.saved(doc, &mut report, id)?,
                Err(err) => {
                    let record = self.record(id).cloned().unwrap_or_default();
                    if self.is_translating() && record.translation_id.is_some() {
                        self.notices.push(UserNotice::Alert(err.message()));
                    }
                    self.fail(
                        &mut report,
                        id,
                        EditorError::Persistence {
                            record: record.to_string(),
                            message: err.message(),
                        },
                    );
                }
            }
        }
        debug!(
            target: "quire::zones",
            saved = report.saved.len(),
            failed = report.failed.len(),
            "save finished"
        );
        Ok(report)
    }

    fn saved(&mut self, doc: &mut Document, report: &mut SaveReport, id: RegionId) -> Result<()> {
        let region = self.region_mut(id)?;
        region.session.save(doc)?;
        if region.translated.is_some() {
            region.translated = Some(collapse_whitespace(&doc.inner_html(region.root)));
        }
        doc.remove_class(region.root, DIRTY_CLASS);
        let record = region.record.clone();
        trace!(target: "quire::zones", region = %id, %record, "region saved");
        self.events.push(ZoneEvent::Saved(record));
        report.saved.push(id);
        Ok(())
    }

    fn fail(&mut self, report: &mut SaveReport, id: RegionId, err: EditorError) {
        let record = self.record(id).cloned().unwrap_or_default();
        warn!(target: "quire::zones", region = %id, %record, "save failed: {err}");
        let message = match &err {
            EditorError::Persistence { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.events.push(ZoneEvent::Canceled { record, message });
        report.failed.push((id, err));
    }

    /// Store every pending crop. Returns the first failure of each region.
    async fn flush_cropped_images(&mut self, doc: &mut Document) -> BTreeMap<RegionId, EditorError> {
        let mut jobs = Vec::new();
        for (id, region) in &self.regions {
            for img in doc.find_all(region.root, |d, n| d.has_class(n, CROPPED_CLASS)) {
                match crop_job(doc, *id, img) {
                    Some(job) => jobs.push(job),
                    None => {
                        warn!(target: "quire::zones", region = %id, %img, "cropped image without inline data");
                        doc.remove_class(img, CROPPED_CLASS);
                    }
                }
            }
        }
        if jobs.is_empty() {
            return BTreeMap::new();
        }

        let persistence = &self.persistence;
        let results = join_all(jobs.iter().map(|job| store_crop(persistence, job))).await;

        let mut failures = BTreeMap::new();
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(stored) => {
                    doc.remove_class(job.img, CROPPED_CLASS);
                    if let Some((attachment, src)) = stored {
                        doc.set_attr(job.img, "src", src);
                        doc.set_attr(job.img, CROP_ID_ATTR, attachment.to_string());
                    }
                    trace!(target: "quire::zones", region = %job.region, img = %job.img, "crop stored");
                }
                Err(err) => {
                    failures.entry(job.region).or_insert(EditorError::Persistence {
                        record: job.metadata.name.clone(),
                        message: err.message(),
                    });
                }
            }
        }
        failures
    }

    // === Notifications ===

    pub fn take_events(&mut self) -> Vec<ZoneEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn take_notices(&mut self) -> Vec<UserNotice> {
        std::mem::take(&mut self.notices)
    }
}

fn crop_job(doc: &Document, region: RegionId, img: NodeId) -> Option<CropJob> {
    let datas = doc.attr(img, "src")?.split_once(',')?.1.to_string();
    let original_src = doc.attr(img, CROP_ORIGINAL_SRC_ATTR).unwrap_or_default();
    let name = format!("{original_src}.crop");
    Some(CropJob {
        region,
        img,
        crop_id: doc.attr(img, CROP_ID_ATTR).and_then(|v| v.parse().ok()),
        metadata: AttachmentMetadata {
            res_model: doc.attr(img, CROP_RES_MODEL_ATTR).map(SmolStr::new),
            res_id: doc.attr(img, CROP_RES_ID_ATTR).and_then(|v| v.parse().ok()),
            datas_fname: name.clone(),
            name,
            datas,
            mimetype: SmolStr::new(doc.attr(img, CROP_MIMETYPE_ATTR).unwrap_or("image/png")),
            url: Some(original_src.to_string()).filter(|s| !s.is_empty()),
        },
    })
}

/// Update an existing crop attachment, or create one and return its id and
/// tokenized url.
async fn store_crop<P: Persistence>(
    persistence: &P,
    job: &CropJob,
) -> Result<Option<(u64, String)>, PersistenceError> {
    if let Some(id) = job.crop_id {
        persistence.attachment_write(id, &job.metadata.datas).await?;
        return Ok(None);
    }
    let id = persistence.attachment_create(&job.metadata).await?;
    let tokens = persistence.generate_access_token(&[id]).await?;
    let src = match tokens.first() {
        Some(token) => format!("/web/image/{id}?access_token={token}"),
        None => format!("/web/image/{id}"),
    };
    Ok(Some((id, src)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a \n\t b\r\nc"), "a b c");
    }

    #[test]
    fn test_crop_job_reads_attributes() {
        let doc = Document::from_body_html(
            r#"<img class="o_cropped_img_to_save" src="data:image/png;base64,AAAA" data-crop:original-src="/web/image/5" data-crop:mimetype="image/png" data-crop:res-model="ir.ui.view" data-crop:res-id="9">"#,
        );
        let img = doc.first_child(doc.body()).unwrap();
        let job = crop_job(&doc, RegionId(1), img).unwrap();
        assert_eq!(job.crop_id, None);
        assert_eq!(job.metadata.datas, "AAAA");
        assert_eq!(job.metadata.name, "/web/image/5.crop");
        assert_eq!(job.metadata.url.as_deref(), Some("/web/image/5"));
        assert_eq!(job.metadata.res_model.as_deref(), Some("ir.ui.view"));
        assert_eq!(job.metadata.res_id, Some(9));
    }

    #[test]
    fn test_crop_job_requires_inline_data() {
        let doc = Document::from_body_html(r#"<img class="o_cropped_img_to_save" src="/web/image/5">"#);
        let img = doc.first_child(doc.body()).unwrap();
        assert!(crop_job(&doc, RegionId(1), img).is_none());
    }

    #[test]
    fn test_report_flags() {
        let mut report = SaveReport::default();
        assert!(!report.was_dirty());
        assert!(report.is_complete());
        report.failed.push((RegionId(2), EditorError::CrossFrameRange));
        assert!(report.was_dirty());
        assert!(!report.is_complete());
    }
}
