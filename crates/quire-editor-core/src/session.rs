//! One editing surface: lifecycle, dirty tracking, history and event routing.
//!
//! Events flow through the session in a fixed order: the [`RangeGuard`]
//! corrects the selection first, then the [`MediaFocusController`] reacts to
//! focus changes. Notifications for the host accumulate in an internal queue
//! drained with [`EditingSession::take_events`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, trace, warn};

use crate::classify::{MediaNode, NodeClassifier, OutsideEditable, ProtectedNodeClassifier};
use crate::dom::{Document, DocumentId, NodeId};
use crate::engine::{EditingEngine, SnapshotEngine};
use crate::error::{ConfigurationError, EditorError, Result};
use crate::events::{Attachment, EditorEvent, Hint, KeyEvent, KeyOutcome, Pointer};
use crate::font::{self, FontChange};
use crate::guard::{Correction, RangeGuard};
use crate::link::{self, LinkChoice, LinkInfo};
use crate::media::{
    AltText, CROP_ID_ATTR, CropRequest, CropResult, Dialog, DialogOutcome, Geometry,
    MediaChoice, MediaFocusController, MediaKind, MediaRequest, NoLayout,
};
use crate::options::EditorOptions;
use crate::plugin::{
    FONT_PLUGIN, LINK_PLUGIN, MEDIA_PLUGIN, Plugin, PluginContext, PluginRegistry,
    UNBREAKABLE_PLUGIN,
};
use crate::range::{Placement, SelectionRange};

/// Attribute tagging a target with the session bound to it.
pub const SESSION_ATTR: &str = "data-wysiwyg-id";

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wysiwyg_{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Detached,
    Attached,
    Destroyed,
}

pub struct EditingSession {
    id: SessionId,
    options: EditorOptions,
    engine: Box<dyn EditingEngine>,
    geometry: Box<dyn Geometry + Send + Sync>,
    rules: ProtectedNodeClassifier,
    plugins: PluginRegistry,
    state: SessionState,
    target: Option<NodeId>,
    editable: Option<NodeId>,
    document: Option<DocumentId>,
    guard: Option<RangeGuard>,
    media: MediaFocusController,
    selection: Option<SelectionRange>,
    baseline: String,
    dirty: bool,
    hints: Vec<Hint>,
    attachments: Vec<Attachment>,
    events: Vec<EditorEvent>,
}

impl fmt::Debug for EditingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditingSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("target", &self.target)
            .field("editable", &self.editable)
            .field("dirty", &self.dirty)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl EditingSession {
    pub fn new(options: EditorOptions) -> Self {
        Self {
            id: SessionId::next(),
            options,
            engine: Box::new(SnapshotEngine::new()),
            geometry: Box::new(NoLayout),
            rules: ProtectedNodeClassifier::new(),
            plugins: PluginRegistry::with_builtins(),
            state: SessionState::Detached,
            target: None,
            editable: None,
            document: None,
            guard: None,
            media: MediaFocusController::new(),
            selection: None,
            baseline: String::new(),
            dirty: false,
            hints: Vec::new(),
            attachments: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_engine(mut self, engine: impl EditingEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn with_geometry(mut self, geometry: impl Geometry + Send + Sync + 'static) -> Self {
        self.geometry = Box::new(geometry);
        self
    }

    /// Add a consumer protection rule, OR-ed with the built-in ones.
    pub fn with_rule(mut self, name: &'static str, rule: impl NodeClassifier + 'static) -> Self {
        self.rules.push(name, rule);
        self
    }

    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.add(plugin);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn editable(&self) -> Option<NodeId> {
        self.editable
    }

    pub fn document(&self) -> Option<DocumentId> {
        self.document
    }

    pub fn media(&self) -> &MediaFocusController {
        &self.media
    }

    pub fn guard(&self) -> Option<&RangeGuard> {
        self.guard.as_ref()
    }

    pub fn hints(&self) -> &[Hint] {
        &self.hints
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Drain pending notifications.
    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    // === Lifecycle ===

    /// Bind the engine to `target`, which must be mounted in `doc`.
    pub fn attach(&mut self, doc: &mut Document, target: NodeId) -> Result<()> {
        if self.state == SessionState::Attached {
            self.destroy(doc);
        }
        if !doc.is_connected(target) {
            let err = ConfigurationError::NotMounted(target);
            error!(target: "quire::session", session = %self.id, %target, "{err}");
            return Err(err.into());
        }

        for name in &self.options.disabled_plugins {
            self.plugins.disable(name);
        }
        let editable = match self.engine.bind(doc, target, &self.options) {
            Ok(editable) => editable,
            Err(err) => {
                error!(target: "quire::session", session = %self.id, %target, "attach failed: {err}");
                self.engine.unbind(doc);
                return Err(err);
            }
        };

        let mut classifier = ProtectedNodeClassifier::new()
            .with("outside_editable", OutsideEditable { root: editable })
            .with("media", MediaNode);
        classifier.extend(&self.rules);
        self.guard = self
            .plugins
            .is_enabled(UNBREAKABLE_PLUGIN)
            .then(|| RangeGuard::new(editable, classifier));
        self.media = if self.plugins.is_enabled(MEDIA_PLUGIN) {
            MediaFocusController::new()
        } else {
            MediaFocusController::disabled()
        };

        doc.set_attr(target, SESSION_ATTR, self.id.to_string());
        self.target = Some(target);
        self.editable = Some(editable);
        self.document = Some(doc.id());
        self.state = SessionState::Attached;

        let mut cx = PluginContext::new(doc, editable, &mut self.events);
        self.plugins.init_all(&mut cx);

        self.baseline = self.engine.code(doc);
        self.dirty = false;
        debug!(target: "quire::session", session = %self.id, %target, %editable, "attached");
        Ok(())
    }

    /// Detach the engine and restore the target. Safe to call repeatedly.
    pub fn destroy(&mut self, doc: &mut Document) {
        if self.state == SessionState::Destroyed {
            return;
        }
        if self.document.is_some_and(|d| d != doc.id()) {
            warn!(target: "quire::session", session = %self.id, "destroy called with a foreign document");
            return;
        }
        if let Some(editable) = self.editable {
            let mut cx = PluginContext::new(doc, editable, &mut self.events);
            self.plugins.destroy_all(&mut cx);
        }
        self.media.hide_all();
        self.media.clear_target();
        self.engine.unbind(doc);
        if let Some(target) = self.target.filter(|t| doc.contains_id(*t)) {
            doc.remove_attr(target, SESSION_ATTR);
        }
        self.guard = None;
        self.selection = None;
        self.editable = None;
        self.state = SessionState::Destroyed;
        debug!(target: "quire::session", session = %self.id, "destroyed");
    }

    fn bound(&self, doc: &Document) -> Result<NodeId> {
        let (Some(editable), Some(expected)) = (self.editable, self.document) else {
            return Err(ConfigurationError::NotAttached.into());
        };
        if self.state != SessionState::Attached {
            return Err(ConfigurationError::NotAttached.into());
        }
        if expected != doc.id() {
            return Err(ConfigurationError::WrongDocument {
                expected,
                actual: doc.id(),
            }
            .into());
        }
        Ok(editable)
    }

    // === Content ===

    /// Serialized content of the editable.
    pub fn code(&self, doc: &Document) -> Result<String> {
        self.bound(doc)?;
        Ok(self.engine.code(doc))
    }

    /// Whether the content differs from the last saved state.
    pub fn is_dirty(&self, doc: &Document) -> Result<bool> {
        let changed = self.code(doc)? != self.baseline;
        if changed != self.dirty {
            warn!(
                target: "quire::session",
                session = %self.id,
                flag = self.dirty,
                changed,
                "dirty flag disagrees with content"
            );
        }
        Ok(changed)
    }

    /// Write the content back into the target. Returns whether it changed
    /// since the last save.
    pub fn save(&mut self, doc: &mut Document) -> Result<bool> {
        let dirty = self.is_dirty(doc)?;
        let html = self.engine.code(doc);
        if let (Some(target), Some(editable)) = (self.target, self.editable)
            && target != editable
        {
            doc.remove_children(target);
            if doc.is_tag(target, "textarea") {
                let text = doc.create_text(html.as_str());
                doc.append_child(target, text);
            } else {
                doc.set_inner_html(target, &html);
            }
        }
        self.baseline = html;
        self.dirty = false;
        debug!(target: "quire::session", session = %self.id, dirty, "saved");
        Ok(dirty)
    }

    /// Replace the content, as one undoable step.
    pub fn set_content(&mut self, doc: &mut Document, html: &str) -> Result<()> {
        self.bound(doc)?;
        self.engine.record_undo(doc);
        self.engine.set_code(doc, html);
        self.selection = None;
        self.on_change(doc)
    }

    /// Undo (`steps < 0`) or redo (`steps > 0`) that many steps.
    pub fn history(&mut self, doc: &mut Document, steps: i32) -> Result<()> {
        self.bound(doc)?;
        for _ in 0..steps.unsigned_abs() {
            let moved = if steps < 0 {
                self.engine.undo(doc)
            } else {
                self.engine.redo(doc)
            };
            if !moved {
                break;
            }
        }
        self.selection = None;
        Ok(())
    }

    /// Capture an undo checkpoint, e.g. before a programmatic edit.
    pub fn add_history_step(&mut self, doc: &Document) -> Result<()> {
        self.bound(doc)?;
        self.engine.record_undo(doc);
        Ok(())
    }

    pub fn is_editable_node(&self, doc: &Document, node: NodeId) -> bool {
        self.editable.is_some_and(|e| doc.contains(e, node))
    }

    pub fn is_unbreakable_node(&self, doc: &Document, node: NodeId) -> bool {
        match &self.guard {
            Some(guard) => guard.is_protected(doc, node),
            None => !self.is_editable_node(doc, node) || MediaKind::of(doc, node).is_some(),
        }
    }

    // === Notifications ===

    /// Content changed: drop hints no longer mentioned, flag dirty and emit
    /// `wysiwyg_change`.
    pub fn on_change(&mut self, doc: &mut Document) -> Result<()> {
        let editable = self.bound(doc)?;
        let html = self.engine.code(doc);
        self.hints.retain(|hint| html.contains(&format!("@{}", hint.name)));
        self.dirty = true;
        let event = EditorEvent::Change {
            html,
            hints: self.hints.clone(),
            attachments: self.attachments.clone(),
        };
        self.emit(doc, editable, event);
        Ok(())
    }

    /// Track uploaded attachments, ignoring ones already known.
    pub fn on_image_upload(&mut self, attachments: Vec<Attachment>) {
        let fresh: Vec<_> = attachments
            .into_iter()
            .filter(|a| !self.attachments.iter().any(|known| known.id == a.id))
            .collect();
        if fresh.is_empty() {
            return;
        }
        self.attachments.extend(fresh);
        self.events
            .push(EditorEvent::Attachment(self.attachments.clone()));
    }

    /// Remember a mention and return the text inserted for it.
    pub fn add_hint(&mut self, hint: Hint) -> String {
        let content = format!("@{}\u{a0}", hint.name);
        if !self.hints.iter().any(|h| h.id == hint.id) {
            self.hints.push(hint);
        }
        content
    }

    fn emit(&mut self, doc: &mut Document, editable: NodeId, event: EditorEvent) {
        self.events.push(event.clone());
        let mut cx = PluginContext::new(doc, editable, &mut self.events);
        self.plugins.dispatch(&mut cx, &event);
    }

    fn focus_changed(
        &mut self,
        doc: &mut Document,
        editable: NodeId,
        node: NodeId,
        pointer: Option<Pointer>,
    ) {
        trace!(target: "quire::session", session = %self.id, %node, "focus node");
        self.emit(doc, editable, EditorEvent::FocusNode(node));
        self.update_media(doc, editable, node, pointer);
    }

    fn update_media(&mut self, doc: &Document, editable: NodeId, node: NodeId, pointer: Option<Pointer>) {
        let update = self
            .media
            .update(doc, editable, node, pointer, self.geometry.as_ref());
        if let Some(caret) = update.and_then(|u| u.caret) {
            self.selection = Some(SelectionRange::collapsed(caret.node, caret.offset));
        }
    }

    // === Selection ===

    pub fn get_range(&self) -> Option<SelectionRange> {
        self.selection
    }

    pub fn set_range(&mut self, doc: &Document, range: SelectionRange) -> Result<()> {
        let editable = self.bound(doc)?;
        for node in [range.sc, range.ec] {
            if !doc.contains(editable, node) {
                return Err(ConfigurationError::MissingTarget(node).into());
            }
        }
        self.selection = Some(range.clamp(doc));
        Ok(())
    }

    pub fn set_range_from_node(&mut self, doc: &Document, node: NodeId, placement: Placement) -> Result<()> {
        self.set_range(doc, SelectionRange::from_node(doc, node, placement))
    }

    /// Caret at the start of `node`, then handled like a click.
    pub fn focus_in(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        self.set_range_from_node(doc, node, Placement::Begin)?;
        self.handle_mouseup(doc, node, None)
    }

    pub fn focus_in_end(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        self.set_range_from_node(doc, node, Placement::End)?;
        self.handle_mouseup(doc, node, None)
    }

    pub fn select_content(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        self.set_range_from_node(doc, node, Placement::Content)?;
        self.handle_mouseup(doc, node, None)
    }

    /// Correct the current selection, failing when no valid point exists.
    pub fn secure_selection(&mut self, doc: &Document) -> Result<SelectionRange> {
        let editable = self.bound(doc)?;
        let mut selection = self
            .selection
            .unwrap_or_else(|| SelectionRange::collapsed(editable, 0));
        if let Some(guard) = self.guard.as_mut()
            && guard.secure_range(doc, &mut selection, None) == Correction::Impossible
        {
            self.selection = Some(selection);
            return Err(EditorError::CorrectionImpossible { node: editable });
        }
        self.selection = Some(selection);
        Ok(selection)
    }

    // === Input routing ===

    /// Key pressed. Without a stored selection the caret is taken to be at
    /// the start of the editable, and is secured like any other.
    pub fn handle_keydown(&mut self, doc: &mut Document, event: &KeyEvent) -> Result<KeyOutcome> {
        let editable = self.bound(doc)?;
        let mut selection = self
            .selection
            .unwrap_or_else(|| SelectionRange::collapsed(editable, 0));
        let Some(guard) = self.guard.as_mut() else {
            return Ok(KeyOutcome::Proceed);
        };
        let outcome = guard.on_keydown(doc, &mut selection, event);
        self.selection = Some(selection);
        if let KeyOutcome::MediaRemoved(media) = outcome {
            if self.media.saved_target() == Some(media) {
                self.media.clear_target();
            }
            self.media.hide_all();
            self.on_change(doc)?;
        }
        trace!(target: "quire::session", session = %self.id, key = ?event.key, ?outcome, %editable, "keydown");
        Ok(outcome)
    }

    /// Key pressed with the caret in `node`, which seeds the selection when
    /// none is stored yet.
    pub fn handle_keydown_at(&mut self, doc: &mut Document, node: NodeId, event: &KeyEvent) -> Result<KeyOutcome> {
        if self.selection.is_none() {
            self.set_range(doc, SelectionRange::collapsed(node, 0))?;
        }
        self.handle_keydown(doc, event)
    }

    /// Key map command bound to `event`, when the plugin answering it is
    /// enabled.
    pub fn command_for(&self, event: &KeyEvent, mac: bool) -> Option<&str> {
        let map = if mac {
            &self.options.key_map.mac
        } else {
            &self.options.key_map.pc
        };
        let command = map.get(&event.shortcut())?;
        self.plugins
            .handles(command)
            .then_some(command.as_str())
    }

    pub fn handle_keyup(&mut self, doc: &mut Document, event: &KeyEvent) -> Result<()> {
        let editable = self.bound(doc)?;
        let (Some(guard), Some(mut selection)) = (self.guard.as_mut(), self.selection) else {
            return Ok(());
        };
        let focus = guard.on_keyup(doc, &mut selection, event);
        self.selection = Some(selection);
        if let Some(node) = focus {
            self.focus_changed(doc, editable, node, None);
        }
        Ok(())
    }

    /// Mouse released over `target`.
    pub fn handle_mouseup(&mut self, doc: &mut Document, target: NodeId, pointer: Option<Pointer>) -> Result<()> {
        let editable = self.bound(doc)?;
        let mut selection = self
            .selection
            .unwrap_or_else(|| SelectionRange::collapsed(target, 0));
        let focus = match self.guard.as_mut() {
            Some(guard) => guard.on_mouseup(doc, &mut selection),
            None => Some(selection.ec),
        };
        self.selection = Some(selection);
        if let Some(node) = focus {
            trace!(target: "quire::session", session = %self.id, %node, "focus node");
            self.emit(doc, editable, EditorEvent::FocusNode(node));
        }
        // clicks reach media even when the focus node did not change
        self.update_media(doc, editable, target, pointer);
        Ok(())
    }

    /// The selection was changed by the user or the engine.
    pub fn handle_range(&mut self, doc: &mut Document, range: SelectionRange) -> Result<()> {
        let editable = self.bound(doc)?;
        let mut selection = range.clamp(doc);
        let focus = match self.guard.as_mut() {
            Some(guard) => guard.on_range(doc, &mut selection),
            None => Some(selection.sc),
        };
        self.selection = Some(selection);
        if let Some(node) = focus {
            self.focus_changed(doc, editable, node, None);
        }
        Ok(())
    }

    /// Run work deferred by key handlers, after the engine applied the key.
    pub fn tick(&mut self, doc: &mut Document) -> Result<()> {
        let editable = self.bound(doc)?;
        let (Some(guard), Some(mut selection)) = (self.guard.as_mut(), self.selection) else {
            return Ok(());
        };
        let focus = guard.run_deferred(doc, &mut selection);
        self.selection = Some(selection);
        if let Some(node) = focus {
            self.focus_changed(doc, editable, node, None);
        }
        Ok(())
    }

    // === Media ===

    /// Remove the focused media element.
    pub fn remove_media(&mut self, doc: &mut Document) -> Result<Option<NodeId>> {
        self.bound(doc)?;
        self.engine.record_undo(doc);
        let removed = self.media.remove_media(doc);
        if removed.is_some() {
            self.selection = None;
            self.on_change(doc)?;
        }
        Ok(removed)
    }

    /// Open the media dialog; insert or replace media when it is saved.
    pub async fn open_media_dialog<D>(&mut self, doc: &mut Document, dialog: &mut D) -> Result<bool>
    where
        D: Dialog<MediaRequest, MediaChoice>,
    {
        let editable = self.bound(doc)?;
        let replacing = self
            .media
            .saved_target()
            .and_then(|t| MediaKind::of(doc, t));
        let request = MediaRequest {
            replacing,
            only_images: false,
            no_documents: self.options.no_attachment,
        };
        let DialogOutcome::Saved(choice) = dialog.open(request).await else {
            return Ok(false);
        };

        self.engine.record_undo(doc);
        let node = doc.import(&choice.media);
        let range = self
            .selection
            .unwrap_or_else(|| SelectionRange::from_node(doc, editable, Placement::End));
        if !self.media.insert_media(doc, range, node) {
            return Ok(false);
        }
        self.on_image_upload(choice.attachments);
        self.selection = None;
        self.on_change(doc)?;
        Ok(true)
    }

    /// Crop the focused image. The crop stays inline until the page is saved.
    pub async fn open_crop_dialog<D>(&mut self, doc: &mut Document, dialog: &mut D) -> Result<bool>
    where
        D: Dialog<CropRequest, CropResult>,
    {
        self.bound(doc)?;
        let Some(img) = self
            .media
            .saved_target()
            .filter(|t| MediaKind::of(doc, *t) == Some(MediaKind::Image))
        else {
            return Ok(false);
        };
        let request = CropRequest {
            src: doc.attr(img, "src").unwrap_or_default().to_string(),
            attachment_id: doc
                .attr(img, CROP_ID_ATTR)
                .and_then(|id| id.parse().ok()),
        };
        let DialogOutcome::Saved(crop) = dialog.open(request).await else {
            return Ok(false);
        };
        self.engine.record_undo(doc);
        crop.apply(doc, img);
        self.on_change(doc)?;
        Ok(true)
    }

    /// Edit alt text and title of the focused image.
    pub async fn open_alt_dialog<D>(&mut self, doc: &mut Document, dialog: &mut D) -> Result<bool>
    where
        D: Dialog<AltText, AltText>,
    {
        self.bound(doc)?;
        let Some(img) = self.media.saved_target() else {
            return Ok(false);
        };
        let current = AltText {
            alt: doc.attr(img, "alt").unwrap_or_default().to_string(),
            title: doc.attr(img, "title").unwrap_or_default().to_string(),
        };
        let DialogOutcome::Saved(text) = dialog.open(current).await else {
            return Ok(false);
        };
        self.engine.record_undo(doc);
        if !self.media.set_alt(doc, &text.alt, &text.title) {
            return Ok(false);
        }
        self.on_change(doc)?;
        Ok(true)
    }

    // === Links and fonts ===

    /// Open the link dialog over the secured selection, or over the focused
    /// image or icon, and write the link when the dialog is saved.
    pub async fn open_link_dialog<D>(&mut self, doc: &mut Document, dialog: &mut D) -> Result<bool>
    where
        D: Dialog<LinkInfo, LinkChoice>,
    {
        let editable = self.bound(doc)?;
        if !self.plugins.is_enabled(LINK_PLUGIN) {
            debug!(target: "quire::session", session = %self.id, "link plugin disabled");
            return Ok(false);
        }
        let media = self
            .media
            .saved_target()
            .filter(|t| matches!(MediaKind::of(doc, *t), Some(MediaKind::Image | MediaKind::Icon)));
        self.media.hide_all();
        let range = match media.and_then(|m| Some((doc.parent(m)?, doc.index_in_parent(m)?))) {
            Some((parent, index)) => SelectionRange::new(parent, index, parent, index + 1),
            None => self.secure_selection(doc)?,
        };

        let edit = link::prepare(doc, editable, range);
        let DialogOutcome::Saved(choice) = dialog.open(edit.info.clone()).await else {
            return Ok(false);
        };
        self.engine.record_undo(doc);
        let Some(anchor) = link::apply(doc, edit, &choice) else {
            return Ok(false);
        };
        self.selection = Some(SelectionRange::from_node(doc, anchor, Placement::Content));
        self.on_change(doc)?;
        Ok(true)
    }

    /// Remove the link holding the caret, keeping its content.
    pub fn unlink(&mut self, doc: &mut Document) -> Result<bool> {
        let editable = self.bound(doc)?;
        let Some(anchor) = self
            .selection
            .and_then(|s| link::anchor_of(doc, editable, s.sc))
        else {
            return Ok(false);
        };
        self.engine.record_undo(doc);
        doc.unwrap_node(anchor);
        self.on_change(doc)?;
        Ok(true)
    }

    /// Apply a color or size change to the secured selection.
    pub fn apply_font(&mut self, doc: &mut Document, change: &FontChange) -> Result<bool> {
        let editable = self.bound(doc)?;
        if !self.plugins.is_enabled(FONT_PLUGIN) {
            return Ok(false);
        }
        let icon = self
            .media
            .saved_target()
            .filter(|t| MediaKind::of(doc, *t) == Some(MediaKind::Icon))
            .and_then(|icon| Some((doc.parent(icon)?, doc.index_in_parent(icon)?)));
        let range = match icon {
            Some((parent, index)) => SelectionRange::new(parent, index, parent, index + 1),
            None => self.secure_selection(doc)?,
        };
        if range.is_collapsed() {
            return Ok(false);
        }
        self.engine.record_undo(doc);
        let Some(selected) = font::apply(doc, editable, range, change) else {
            return Ok(false);
        };
        self.selection = Some(selected);
        self.on_change(doc)?;
        Ok(true)
    }
}
