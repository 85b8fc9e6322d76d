//! Hosting an editing session inside an iframe.
//!
//! Opening a frame is a one-shot handshake: the host registers a callback
//! name in the [`HandshakeRegistry`], the frame's loader calls it once its
//! engine is ready, and [`PendingFrame::wait`] moves the target into the
//! frame document. Stylesheet heads are rendered once per bundle and kept in
//! the [`AssetCache`] until it is reset.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use quire_editor_core::dom::parse_fragment;
use quire_editor_core::error::ConfigurationError;
use quire_editor_core::{Document, EditorError, EditorOptions, NodeData, NodeId, Result};
use smol_str::SmolStr;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use crate::frames::{Frames, NodeRef, WindowId};
use crate::persistence::{Persistence, SaveContext};

/// Id of the element receiving the target inside the frame.
pub const FRAME_TARGET_ID: &str = "wysiwyg_target";

const HEAD_PREAMBLE: &str = concat!(
    r#"<meta charset="utf-8">"#,
    r#"<meta http-equiv="X-UA-Compatible" content="IE=edge,chrome=1">"#,
    r#"<meta name="viewport" content="width=device-width, initial-scale=1, user-scalable=no">"#,
);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rendered frame heads, keyed by asset bundle name.
///
/// Populated on first use of a bundle, cleared only by [`AssetCache::reset`].
#[derive(Debug, Default)]
pub struct AssetCache {
    heads: Mutex<HashMap<SmolStr, Arc<str>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bundle: &str) -> Option<Arc<str>> {
        lock(&self.heads).get(bundle).cloned()
    }

    pub fn contains(&self, bundle: &str) -> bool {
        lock(&self.heads).contains_key(bundle)
    }

    /// The head for `bundle`, rendering it through `persistence` on a miss.
    pub async fn load<P: Persistence>(
        &self,
        persistence: &P,
        bundle: &str,
        context: &SaveContext,
    ) -> Result<Arc<str>> {
        if let Some(head) = self.get(bundle) {
            return Ok(head);
        }
        let html = persistence
            .render_assets(bundle, context)
            .await
            .map_err(|err| EditorError::Persistence {
                record: bundle.to_string(),
                message: err.message(),
            })?;
        let head: Arc<str> = frame_head(&html).into();
        lock(&self.heads).insert(SmolStr::new(bundle), head.clone());
        debug!(target: "quire::iframe", bundle, "asset bundle cached");
        Ok(head)
    }

    pub fn reset(&self) {
        lock(&self.heads).clear();
    }
}

/// Meta tags followed by the `<link>` elements of a rendered bundle.
fn frame_head(rendered: &str) -> String {
    let mut scratch = Document::new();
    let links = parse_fragment(rendered)
        .iter()
        .filter(|f| matches!(&f.data, NodeData::Element { tag, .. } if tag == "link"))
        .map(|f| {
            let node = scratch.import(f);
            scratch.outer_html(node)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{HEAD_PREAMBLE}\n{links}")
}

/// Callback names awaiting a frame's ready signal.
#[derive(Debug, Default)]
pub struct HandshakeRegistry {
    callbacks: Mutex<HashMap<SmolStr, oneshot::Sender<()>>>,
}

impl HandshakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. A previous registration under the same name is
    /// dropped, failing its waiter.
    pub fn register(&self, name: &str) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        if lock(&self.callbacks).insert(SmolStr::new(name), tx).is_some() {
            warn!(target: "quire::iframe", callback = name, "handshake callback replaced");
        }
        rx
    }

    /// The frame signalled readiness. Returns false for unknown names.
    pub fn notify(&self, name: &str) -> bool {
        let Some(tx) = lock(&self.callbacks).remove(name) else {
            return false;
        };
        tx.send(()).is_ok()
    }

    pub fn remove(&self, name: &str) -> bool {
        lock(&self.callbacks).remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.callbacks).contains_key(name)
    }

    pub fn len(&self) -> usize {
        lock(&self.callbacks).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.callbacks).is_empty()
    }
}

/// Moves editing targets into and out of iframes.
#[derive(Clone, Debug)]
pub struct IframeBridge {
    assets: Arc<AssetCache>,
    handshakes: Arc<HandshakeRegistry>,
    bundle: SmolStr,
    timeout: Duration,
}

impl IframeBridge {
    pub fn new(assets: Arc<AssetCache>, handshakes: Arc<HandshakeRegistry>, options: &EditorOptions) -> Self {
        Self {
            assets,
            handshakes,
            bundle: SmolStr::new(&options.iframe_css_assets),
            timeout: options.asset_timeout,
        }
    }

    pub fn handshakes(&self) -> &Arc<HandshakeRegistry> {
        &self.handshakes
    }

    /// Callback name used for the frame of session `name`.
    pub fn callback_name(name: &str) -> String {
        format!("onLoad_{name}")
    }

    /// Insert an iframe after `target` and register its ready callback.
    ///
    /// `target` must be mounted in its window's document.
    pub async fn open<P: Persistence>(
        &self,
        frames: &mut Frames,
        target: NodeRef,
        name: &str,
        persistence: &P,
        context: &SaveContext,
    ) -> Result<PendingFrame> {
        let mounted = frames
            .document(target.window)
            .is_some_and(|doc| doc.is_connected(target.node));
        if !mounted {
            let err = ConfigurationError::NotMounted(target.node);
            error!(target: "quire::iframe", window = %target.window, node = %target.node, "{err}");
            return Err(err.into());
        }

        let head = self.assets.load(persistence, &self.bundle, context).await?;

        let doc = frames
            .document_mut(target.window)
            .ok_or(ConfigurationError::MissingTarget(target.node))?;
        let iframe = doc.create_element("iframe");
        doc.set_attr(iframe, "style", "min-height: 400px; width: 100%;");
        doc.insert_after(target.node, iframe);

        let callback = SmolStr::new(Self::callback_name(name));
        let ready = self.handshakes.register(&callback);
        debug!(target: "quire::iframe", %callback, %iframe, "iframe inserted, waiting for handshake");
        Ok(PendingFrame {
            handshakes: self.handshakes.clone(),
            callback,
            ready,
            host: target.window,
            iframe,
            target: target.node,
            head,
            bundle: self.bundle.clone(),
            timeout: self.timeout,
        })
    }

    /// Move the target back before the iframe with its original
    /// attributes, then remove the iframe and its window. Returns the
    /// target's id in the host document.
    pub fn destroy(&self, frames: &mut Frames, binding: FrameBinding) -> Result<NodeId> {
        self.handshakes.remove(&binding.callback);
        let fragment = frames
            .document(binding.window)
            .filter(|doc| doc.contains_id(binding.target))
            .map(|doc| doc.export(binding.target));
        frames.close(binding.window);

        let doc = frames
            .document_mut(binding.host)
            .ok_or(ConfigurationError::MissingTarget(binding.iframe))?;
        let Some(fragment) = fragment else {
            doc.detach(binding.iframe);
            return Err(ConfigurationError::MissingTarget(binding.target).into());
        };
        let node = doc.import(&fragment);
        let current: Vec<SmolStr> = doc.attrs(node).iter().map(|(k, _)| k.clone()).collect();
        for name in current {
            doc.remove_attr(node, &name);
        }
        for (name, value) in &binding.attrs {
            doc.set_attr(node, name, value.as_str());
        }
        if !doc.insert_before(binding.iframe, node) {
            warn!(target: "quire::iframe", iframe = %binding.iframe, "iframe detached, target appended to body");
            let body = doc.body();
            doc.append_child(body, node);
        }
        doc.detach(binding.iframe);
        debug!(target: "quire::iframe", window = %binding.window, target = %node, "iframe destroyed");
        Ok(node)
    }
}

/// An iframe waiting for its ready signal. Dropping it unregisters the
/// callback.
#[derive(Debug)]
pub struct PendingFrame {
    handshakes: Arc<HandshakeRegistry>,
    callback: SmolStr,
    ready: oneshot::Receiver<()>,
    host: WindowId,
    iframe: NodeId,
    target: NodeId,
    head: Arc<str>,
    bundle: SmolStr,
    timeout: Duration,
}

impl PendingFrame {
    pub fn callback(&self) -> &str {
        &self.callback
    }

    pub fn iframe(&self) -> NodeRef {
        NodeRef::new(self.host, self.iframe)
    }

    /// Wait for the handshake, then build the frame document and move the
    /// target into it.
    pub async fn wait(mut self, frames: &mut Frames) -> Result<FrameBinding> {
        match tokio::time::timeout(self.timeout, &mut self.ready).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                error!(target: "quire::iframe", callback = %self.callback, "handshake dropped");
                self.discard(frames);
                return Err(EditorError::Handshake {
                    callback: self.callback.to_string(),
                });
            }
            Err(_) => {
                error!(target: "quire::iframe", callback = %self.callback, after = ?self.timeout, "handshake timed out");
                self.discard(frames);
                return Err(EditorError::AssetLoadTimeout {
                    bundle: self.bundle.to_string(),
                    after: self.timeout,
                });
            }
        }

        let host = frames
            .document_mut(self.host)
            .ok_or(ConfigurationError::MissingTarget(self.target))?;
        if !host.is_connected(self.target) {
            return Err(ConfigurationError::NotMounted(self.target).into());
        }
        let attrs = host.attrs(self.target).to_vec();
        let fragment = host.export(self.target);
        host.detach(self.target);

        let mut frame = Document::new();
        let head = frame.head();
        frame.append_html(head, &self.head);
        let slot = frame.create_element("div");
        frame.set_attr(slot, "id", FRAME_TARGET_ID);
        let body = frame.body();
        frame.append_child(body, slot);
        let target = frame.import(&fragment);
        frame.append_child(slot, target);

        let window = frames.open(self.host, frame);
        trace!(target: "quire::iframe", %window, %target, "target moved into frame");
        Ok(FrameBinding {
            host: self.host,
            window,
            iframe: self.iframe,
            target,
            callback: self.callback.clone(),
            attrs,
        })
    }

    /// Abandon the frame: unregister the callback and remove the iframe.
    pub fn cancel(self, frames: &mut Frames) {
        self.discard(frames);
    }

    fn discard(&self, frames: &mut Frames) {
        self.handshakes.remove(&self.callback);
        if let Some(doc) = frames.document_mut(self.host) {
            doc.detach(self.iframe);
        }
    }
}

impl Drop for PendingFrame {
    fn drop(&mut self) {
        if self.handshakes.remove(&self.callback) {
            trace!(target: "quire::iframe", callback = %self.callback, "dangling handshake removed");
        }
    }
}

/// A target living inside an iframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBinding {
    pub host: WindowId,
    pub window: WindowId,
    /// The iframe element in the host document.
    pub iframe: NodeId,
    /// The target in the frame document.
    pub target: NodeId,
    callback: SmolStr,
    attrs: Vec<(SmolStr, String)>,
}

impl FrameBinding {
    pub fn target_ref(&self) -> NodeRef {
        NodeRef::new(self.window, self.target)
    }
}
