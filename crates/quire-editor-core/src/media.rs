//! Media elements and the focus controller that owns their popovers.
//!
//! At most one popover is visible per session. Every update hides all of
//! them first, then shows the one matching the focused element.

use std::collections::BTreeSet;
use std::future::Future;

use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::dom::{Document, Fragment, NodeId};
use crate::events::{Attachment, Pointer};
use crate::point::{Point, is_visible_point, prev_point_until};
use crate::range::SelectionRange;

pub const VIDEO_CLASS: &str = "media_iframe_video";
pub const VIDEO_OVERLAY_CLASS: &str = "css_editable_mode_display";
pub const CROPPED_CLASS: &str = "o_cropped_img_to_save";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    Image,
    Icon,
    Video,
    Document,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Image,
        MediaKind::Icon,
        MediaKind::Video,
        MediaKind::Document,
    ];

    pub fn of(doc: &Document, node: NodeId) -> Option<Self> {
        match doc.tag(node)? {
            "img" => Some(MediaKind::Image),
            "span" if doc.classes(node).any(|c| c.starts_with("fa-")) => Some(MediaKind::Icon),
            "div" if doc.has_class(node, VIDEO_CLASS) || doc.has_class(node, VIDEO_OVERLAY_CLASS) => {
                Some(MediaKind::Video)
            }
            "a" if doc.has_class(node, "o_image") => Some(MediaKind::Document),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Icon => "icon",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Layout queries the host answers (the DOM model has no layout).
pub trait Geometry {
    fn bounding_rect(&self, doc: &Document, node: NodeId) -> Rect;
    /// Rect of the element popovers are positioned in.
    fn container_rect(&self) -> Rect;
    fn font_size(&self, doc: &Document, node: NodeId) -> f64;
}

/// Geometry for headless use: every rect is empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLayout;

impl Geometry for NoLayout {
    fn bounding_rect(&self, _: &Document, _: NodeId) -> Rect {
        Rect::default()
    }

    fn container_rect(&self) -> Rect {
        Rect::default()
    }

    fn font_size(&self, _: &Document, _: NodeId) -> f64 {
        14.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Popover {
    pub kind: MediaKind,
    pub visible: bool,
    pub left: f64,
    pub top: f64,
    /// Buttons shown as active, reflecting the target's current state.
    pub active: BTreeSet<SmolStr>,
}

impl Popover {
    fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            visible: false,
            left: 0.0,
            top: 0.0,
            active: BTreeSet::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaUpdate {
    pub target: NodeId,
    pub kind: MediaKind,
    /// Visible text point right before the media, where the caret goes.
    pub caret: Option<Point>,
}

#[derive(Debug)]
pub struct MediaFocusController {
    popovers: Vec<Popover>,
    target: Option<NodeId>,
    enabled: bool,
}

impl Default for MediaFocusController {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaFocusController {
    pub fn new() -> Self {
        Self {
            popovers: MediaKind::ALL.iter().map(|&k| Popover::new(k)).collect(),
            target: None,
            enabled: true,
        }
    }

    /// Controller that never opens popovers (translation editing).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// React to focus moving to `target`.
    pub fn update(
        &mut self,
        doc: &Document,
        root: NodeId,
        target: NodeId,
        pointer: Option<Pointer>,
        geometry: &dyn Geometry,
    ) -> Option<MediaUpdate> {
        self.hide_all();
        let element = doc.element_of(target);
        let resolved = element.map(|e| {
            if doc.has_class(e, VIDEO_OVERLAY_CLASS) {
                doc.parent(e).unwrap_or(e)
            } else {
                e
            }
        });
        let Some((target, kind)) = resolved
            .filter(|_| self.enabled)
            .and_then(|e| MediaKind::of(doc, e).map(|k| (e, k)))
        else {
            self.clear_target();
            return None;
        };

        self.target = Some(target);
        let caret = prev_point_until(doc, root, Point::new(target, 0), |p| {
            doc.is_text(p.node) && is_visible_point(doc, p)
        });

        let (left, top) = position(doc, target, kind, pointer, geometry);
        let active = reflect(doc, target, kind);
        trace!(target: "quire::media", %target, kind = kind.name(), left, top, ?active, "show popover");
        if let Some(popover) = self.popover_mut(kind) {
            popover.visible = true;
            popover.left = left;
            popover.top = top;
            popover.active = active;
        }
        Some(MediaUpdate {
            target,
            kind,
            caret,
        })
    }

    pub fn hide_all(&mut self) {
        for popover in &mut self.popovers {
            popover.visible = false;
        }
    }

    pub fn popovers(&self) -> &[Popover] {
        &self.popovers
    }

    pub fn popover(&self, kind: MediaKind) -> Option<&Popover> {
        self.popovers.iter().find(|p| p.kind == kind)
    }

    fn popover_mut(&mut self, kind: MediaKind) -> Option<&mut Popover> {
        self.popovers.iter_mut().find(|p| p.kind == kind)
    }

    pub fn visible(&self) -> Option<&Popover> {
        self.popovers.iter().find(|p| p.visible)
    }

    /// Media element later insert/replace/crop operations apply to.
    pub fn saved_target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// Insert `media` (a detached node of `doc`), replacing the saved target
    /// if there is one, otherwise at the start of `range`.
    pub fn insert_media(&mut self, doc: &mut Document, range: SelectionRange, media: NodeId) -> bool {
        let inserted = match self.target.filter(|&t| doc.is_connected(t)) {
            Some(old) => {
                let ok = doc.insert_before(old, media);
                if ok {
                    doc.detach(old);
                }
                ok
            }
            None => insert_at(doc, range.start(), media),
        };
        if inserted {
            debug!(target: "quire::media", %media, "media inserted");
            self.target = Some(media);
        }
        inserted
    }

    /// Detach the saved target. Returns the removed node.
    pub fn remove_media(&mut self, doc: &mut Document) -> Option<NodeId> {
        let target = self.target.take()?;
        self.hide_all();
        if !doc.is_connected(target) {
            return None;
        }
        doc.detach(target);
        debug!(target: "quire::media", %target, "media removed");
        Some(target)
    }

    /// Set alt and title on the saved image.
    pub fn set_alt(&self, doc: &mut Document, alt: &str, title: &str) -> bool {
        match self.target {
            Some(target) if MediaKind::of(doc, target) == Some(MediaKind::Image) => {
                doc.set_attr(target, "alt", alt);
                doc.set_attr(target, "title", title);
                true
            }
            _ => false,
        }
    }
}

/// Give empty document links and icons a space so the caret can reach them.
pub fn prepare_for_editing(doc: &mut Document, root: NodeId) {
    let empty = doc.find_all(root, |doc, node| {
        !doc.has_children(node)
            && matches!(
                MediaKind::of(doc, node),
                Some(MediaKind::Icon | MediaKind::Document)
            )
    });
    for node in empty {
        let space = doc.create_text(" ");
        doc.append_child(node, space);
    }
}

fn insert_at(doc: &mut Document, at: Point, media: NodeId) -> bool {
    if doc.is_text(at.node) {
        if at.offset == 0 {
            return doc.insert_before(at.node, media);
        }
        if at.offset < doc.node_len(at.node) {
            doc.split_text(at.node, at.offset);
        }
        doc.insert_after(at.node, media)
    } else {
        doc.insert_child(at.node, at.offset, media);
        doc.parent(media) == Some(at.node)
    }
}

fn position(
    doc: &Document,
    target: NodeId,
    kind: MediaKind,
    pointer: Option<Pointer>,
    geometry: &dyn Geometry,
) -> (f64, f64) {
    let container = geometry.container_rect();
    let rect = geometry.bounding_rect(doc, target);
    let (left, top) = (rect.left - container.left, rect.top - container.top);
    match kind {
        MediaKind::Image | MediaKind::Video => match pointer {
            Some(p) => (p.x - container.left - 20.0, p.y - container.top),
            None => (left, top + rect.height),
        },
        MediaKind::Icon => (left + geometry.font_size(doc, target) - 5.0, top - 5.0),
        MediaKind::Document => (left + rect.width - 15.0, top - 15.0),
    }
}

const SHAPES: [&str; 4] = ["rounded", "rounded-circle", "shadow", "img-thumbnail"];
const PADDINGS: [&str; 4] = ["padding-small", "padding-medium", "padding-large", "padding-xl"];
const ICON_SIZES: [&str; 4] = ["fa-2x", "fa-3x", "fa-4x", "fa-5x"];

/// Read-only reflection of the target's state into active buttons.
fn reflect(doc: &Document, target: NodeId, kind: MediaKind) -> BTreeSet<SmolStr> {
    let mut active = BTreeSet::new();
    let float = doc
        .style_value(target, "float")
        .map(str::to_string)
        .or_else(|| {
            doc.classes(target).find_map(|c| match c {
                "float-left" | "pull-left" => Some("left".to_string()),
                "float-right" | "pull-right" => Some("right".to_string()),
                _ => None,
            })
        });
    active.insert(SmolStr::new_static(match float.as_deref() {
        Some("left") => "floatLeft",
        Some("right") => "floatRight",
        _ => "floatNone",
    }));
    if let Some(padding) = PADDINGS.iter().find(|p| doc.has_class(target, p)) {
        active.insert(SmolStr::new(padding));
    }

    match kind {
        MediaKind::Image | MediaKind::Video => {
            if kind == MediaKind::Image {
                for shape in SHAPES.iter().filter(|s| doc.has_class(target, s)) {
                    active.insert(SmolStr::new(shape));
                }
                if doc.has_class(target, CROPPED_CLASS) {
                    active.insert(SmolStr::new_static("cropImage"));
                }
            }
            let size = match doc.style_value(target, "width") {
                Some("100%") => "imageSize100",
                Some("50%") => "imageSize50",
                Some("25%") => "imageSize25",
                _ => "imageSizeAuto",
            };
            active.insert(SmolStr::new_static(size));
        }
        MediaKind::Icon => {
            if doc.has_class(target, "fa-spin") {
                active.insert(SmolStr::new_static("faSpin"));
            }
            let size = ICON_SIZES
                .iter()
                .copied()
                .find(|s| doc.has_class(target, s))
                .unwrap_or("fa-1x");
            active.insert(SmolStr::new(size));
        }
        MediaKind::Document => {}
    }
    active
}

/// How a modal dialog ended.
#[derive(Clone, Debug, PartialEq)]
pub enum DialogOutcome<O> {
    Saved(O),
    Closed,
}

/// A modal dialog: opened with some input, resolves once saved or closed.
pub trait Dialog<I, O> {
    fn open(&mut self, input: I) -> impl Future<Output = DialogOutcome<O>> + Send;
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaRequest {
    /// Type of the element being replaced, if any.
    pub replacing: Option<MediaKind>,
    pub only_images: bool,
    pub no_documents: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaChoice {
    pub media: Fragment,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CropRequest {
    pub src: String,
    pub attachment_id: Option<u64>,
}

/// Cropped image, held inline as a data URL until the page is saved.
#[derive(Clone, Debug, PartialEq)]
pub struct CropResult {
    pub data_url: String,
    pub mimetype: SmolStr,
    pub original_src: String,
    /// Existing crop attachment to overwrite instead of creating one.
    pub crop_id: Option<u64>,
    pub res_model: Option<SmolStr>,
    pub res_id: Option<u64>,
}

impl CropResult {
    /// Mark `img` as cropped, to be flushed to the attachment store on save.
    pub fn apply(&self, doc: &mut Document, img: NodeId) {
        doc.set_attr(img, "src", self.data_url.as_str());
        doc.add_class(img, CROPPED_CLASS);
        doc.set_attr(img, CROP_MIMETYPE_ATTR, self.mimetype.as_str());
        doc.set_attr(img, CROP_ORIGINAL_SRC_ATTR, self.original_src.as_str());
        let optional = [
            (CROP_ID_ATTR, self.crop_id.map(|id| id.to_string())),
            (CROP_RES_MODEL_ATTR, self.res_model.as_ref().map(|m| m.to_string())),
            (CROP_RES_ID_ATTR, self.res_id.map(|id| id.to_string())),
        ];
        for (name, value) in optional {
            match value {
                Some(value) => doc.set_attr(img, name, value),
                None => {
                    doc.remove_attr(img, name);
                }
            }
        }
    }
}

pub const CROP_ID_ATTR: &str = "data-crop:id";
pub const CROP_MIMETYPE_ATTR: &str = "data-crop:mimetype";
pub const CROP_ORIGINAL_SRC_ATTR: &str = "data-crop:original-src";
pub const CROP_RES_MODEL_ATTR: &str = "data-crop:res-model";
pub const CROP_RES_ID_ATTR: &str = "data-crop:res-id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AltText {
    pub alt: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Document, NodeId) {
        let doc = Document::from_body_html(concat!(
            r#"<div id="r"><p>ab<img id="img" class="rounded float-left" style="width: 50%">"#,
            r#"<span id="icon" class="fa fa-star fa-spin fa-3x"></span>"#,
            r#"<a id="doc" class="o_image" href="/doc.pdf"></a></p>"#,
            r#"<div id="video" class="media_iframe_video"><div id="overlay" class="css_editable_mode_display"></div></div>"#,
            r#"<p id="plain">x</p></div>"#
        ));
        let root = doc.find_by_id("r").unwrap();
        (doc, root)
    }

    struct Fixed;

    impl Geometry for Fixed {
        fn bounding_rect(&self, _: &Document, _: NodeId) -> Rect {
            Rect {
                left: 110.0,
                top: 220.0,
                width: 40.0,
                height: 30.0,
            }
        }

        fn container_rect(&self) -> Rect {
            Rect {
                left: 10.0,
                top: 20.0,
                width: 800.0,
                height: 600.0,
            }
        }

        fn font_size(&self, _: &Document, _: NodeId) -> f64 {
            16.0
        }
    }

    #[test]
    fn test_kinds() {
        let (doc, _) = setup();
        let id = |s| doc.find_by_id(s).unwrap();
        assert_eq!(MediaKind::of(&doc, id("img")), Some(MediaKind::Image));
        assert_eq!(MediaKind::of(&doc, id("icon")), Some(MediaKind::Icon));
        assert_eq!(MediaKind::of(&doc, id("doc")), Some(MediaKind::Document));
        assert_eq!(MediaKind::of(&doc, id("video")), Some(MediaKind::Video));
        assert_eq!(MediaKind::of(&doc, id("plain")), None);
    }

    #[test]
    fn test_at_most_one_popover() {
        let (doc, root) = setup();
        let mut controller = MediaFocusController::new();
        for name in ["img", "icon", "doc", "overlay", "plain", "img"] {
            let node = doc.find_by_id(name).unwrap();
            controller.update(&doc, root, node, None, &Fixed);
            let visible = controller.popovers().iter().filter(|p| p.visible).count();
            assert!(visible <= 1, "{name}: {visible} popovers visible");
        }
        assert_eq!(controller.visible().unwrap().kind, MediaKind::Image);
    }

    #[test]
    fn test_non_media_clears_target() {
        let (doc, root) = setup();
        let mut controller = MediaFocusController::new();
        let img = doc.find_by_id("img").unwrap();
        let update = controller.update(&doc, root, img, None, &NoLayout).unwrap();
        assert_eq!(controller.saved_target(), Some(img));
        let ab = doc.first_child(doc.parent(img).unwrap()).unwrap();
        assert_eq!(update.caret, Some(Point::new(ab, 2)));

        let plain = doc.find_by_id("plain").unwrap();
        assert!(controller.update(&doc, root, plain, None, &NoLayout).is_none());
        assert_eq!(controller.saved_target(), None);
        assert!(controller.visible().is_none());
    }

    #[test]
    fn test_video_overlay_targets_wrapper() {
        let (doc, root) = setup();
        let mut controller = MediaFocusController::new();
        let overlay = doc.find_by_id("overlay").unwrap();
        let update = controller.update(&doc, root, overlay, None, &NoLayout).unwrap();
        assert_eq!(update.target, doc.find_by_id("video").unwrap());
        assert_eq!(update.kind, MediaKind::Video);
    }

    #[test]
    fn test_positions() {
        let (doc, root) = setup();
        let mut controller = MediaFocusController::new();
        let id = |s| doc.find_by_id(s).unwrap();

        let pointer = Pointer { x: 300.0, y: 400.0 };
        controller.update(&doc, root, id("img"), Some(pointer), &Fixed);
        let p = controller.visible().unwrap();
        assert_eq!((p.left, p.top), (270.0, 380.0));

        controller.update(&doc, root, id("icon"), None, &Fixed);
        let p = controller.visible().unwrap();
        assert_eq!((p.left, p.top), (111.0, 195.0));

        controller.update(&doc, root, id("doc"), None, &Fixed);
        let p = controller.visible().unwrap();
        assert_eq!((p.left, p.top), (125.0, 185.0));
    }

    #[test]
    fn test_active_reflection() {
        let (doc, root) = setup();
        let mut controller = MediaFocusController::new();
        let id = |s| doc.find_by_id(s).unwrap();

        controller.update(&doc, root, id("img"), None, &NoLayout);
        let active: Vec<_> = controller.visible().unwrap().active.iter().cloned().collect();
        assert_eq!(active, vec!["floatLeft", "imageSize50", "rounded"]);

        controller.update(&doc, root, id("icon"), None, &NoLayout);
        let active: Vec<_> = controller.visible().unwrap().active.iter().cloned().collect();
        assert_eq!(active, vec!["fa-3x", "faSpin", "floatNone"]);
    }

    #[test]
    fn test_disabled_controller() {
        let (doc, root) = setup();
        let mut controller = MediaFocusController::disabled();
        let img = doc.find_by_id("img").unwrap();
        assert!(controller.update(&doc, root, img, None, &NoLayout).is_none());
        assert!(controller.visible().is_none());
    }

    #[test]
    fn test_insert_replace_remove() {
        let (mut doc, root) = setup();
        let mut controller = MediaFocusController::new();
        let plain = doc.find_by_id("plain").unwrap();
        let x = doc.first_child(plain).unwrap();

        let first = doc.create_element("img");
        assert!(controller.insert_media(&mut doc, SelectionRange::collapsed(x, 1), first));
        assert_eq!(doc.parent(first), Some(plain));
        assert_eq!(controller.saved_target(), Some(first));

        let second = doc.create_element("img");
        assert!(controller.insert_media(&mut doc, SelectionRange::collapsed(x, 0), second));
        assert!(!doc.is_connected(first));
        assert_eq!(doc.parent(second), Some(plain));

        assert_eq!(controller.remove_media(&mut doc), Some(second));
        assert!(!doc.is_connected(second));
        assert_eq!(doc.inner_html(root).matches("<img").count(), 1);
    }

    #[test]
    fn test_insert_splits_text() {
        let (mut doc, _) = setup();
        let mut controller = MediaFocusController::new();
        let plain = doc.find_by_id("plain").unwrap();
        doc.set_inner_html(plain, "hello");
        let text = doc.first_child(plain).unwrap();
        let img = doc.create_element("img");
        controller.insert_media(&mut doc, SelectionRange::collapsed(text, 2), img);
        assert_eq!(doc.inner_html(plain), "he<img>llo");
    }

    #[test]
    fn test_set_alt_and_prepare() {
        let (mut doc, root) = setup();
        let mut controller = MediaFocusController::new();
        let img = doc.find_by_id("img").unwrap();
        let icon = doc.find_by_id("icon").unwrap();
        controller.update(&doc, root, img, None, &NoLayout);
        assert!(controller.set_alt(&mut doc, "a star", "star"));
        assert_eq!(doc.attr(img, "alt"), Some("a star"));

        prepare_for_editing(&mut doc, root);
        assert_eq!(doc.text_content(icon), " ");
        assert_eq!(doc.text_content(doc.find_by_id("doc").unwrap()), " ");
    }
}
