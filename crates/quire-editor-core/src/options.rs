//! Editor configuration.
//!
//! Defaults match the stock editor; `multizone()` and `translate()` are the
//! variants used by page editing and translation editing.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One toolbar or popover group: a name and its buttons.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolbarGroup {
    pub name: String,
    #[serde(default)]
    pub buttons: Vec<String>,
}

impl ToolbarGroup {
    pub fn new(name: &str, buttons: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            buttons: buttons.iter().map(|b| b.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMap {
    pub pc: BTreeMap<String, String>,
    pub mac: BTreeMap<String, String>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            pc: BTreeMap::from([("CTRL+K".to_string(), "LinkPlugin.show".to_string())]),
            mac: BTreeMap::from([("CMD+K".to_string(), "LinkPlugin.show".to_string())]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    pub toolbar: Vec<ToolbarGroup>,
    pub style_tags: Vec<String>,
    pub font_sizes: Vec<String>,
    pub min_height: u32,
    /// Popover layouts keyed by target type (`image`, `video`, `icon`,
    /// `document`, `link`, `table`).
    pub popover: BTreeMap<String, Vec<ToolbarGroup>>,
    pub key_map: KeyMap,
    pub no_attachment: bool,
    pub in_iframe: bool,
    pub iframe_css_assets: String,
    #[serde(with = "duration_millis")]
    pub asset_timeout: Duration,
    pub history_depth: usize,
    /// Plugins to disable by name.
    pub disabled_plugins: Vec<String>,
    pub debug: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        let g = ToolbarGroup::new;
        let float = g("float", &["floatLeft", "floatRight", "floatNone"]);
        let media = g("media", &["mediaPlugin", "removeMedia"]);
        let popover = BTreeMap::from([
            (
                "image".to_string(),
                vec![
                    g("padding", &[]),
                    g("imagesize", &["imageSizeAuto", "imageSize100", "imageSize50", "imageSize25"]),
                    float.clone(),
                    g("imageShape", &[]),
                    g("cropImage", &[]),
                    media.clone(),
                    g("alt", &[]),
                ],
            ),
            (
                "video".to_string(),
                vec![
                    g("padding", &[]),
                    g("imagesize", &["imageSize100", "imageSize50", "imageSize25"]),
                    float.clone(),
                    media.clone(),
                ],
            ),
            (
                "icon".to_string(),
                vec![
                    g("padding", &[]),
                    g("faSize", &[]),
                    float.clone(),
                    g("faSpin", &[]),
                    media.clone(),
                ],
            ),
            ("document".to_string(), vec![float, media]),
            ("link".to_string(), vec![g("link", &["linkDialogShowPlugin", "unlink"])]),
            (
                "table".to_string(),
                vec![
                    g("add", &["addRowDown", "addRowUp", "addColLeft", "addColRight"]),
                    g("delete", &["deleteRow", "deleteCol", "deleteTable"]),
                ],
            ),
        ]);
        Self {
            toolbar: Vec::new(),
            style_tags: ["p", "pre", "small", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote"]
                .map(String::from)
                .to_vec(),
            font_sizes: [
                "Default", "8", "9", "10", "11", "12", "14", "18", "24", "36", "48", "62",
            ]
            .map(String::from)
            .to_vec(),
            min_height: 180,
            popover,
            key_map: KeyMap::default(),
            no_attachment: false,
            in_iframe: false,
            iframe_css_assets: "web_editor.wysiwyg_iframe_css_assets".to_string(),
            asset_timeout: Duration::from_secs(10),
            history_depth: 100,
            disabled_plugins: Vec::new(),
            debug: false,
        }
        .with_default_toolbar()
    }
}

impl EditorOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn with_default_toolbar(mut self) -> Self {
        let g = ToolbarGroup::new;
        let insert: &[&str] = if self.no_attachment {
            &["linkPlugin"]
        } else {
            &["linkPlugin", "mediaPlugin"]
        };
        let view: &[&str] = if self.debug {
            &["fullscreen", "codeview", "help"]
        } else {
            &["fullscreen", "help"]
        };
        self.toolbar = vec![
            g("style", &["style"]),
            g("font", &["bold", "italic", "underline", "clear"]),
            g("fontsize", &["fontsize"]),
            g("color", &["colorpicker"]),
            g("para", &["ul", "ol", "paragraph"]),
            g("table", &["table"]),
            g("insert", insert),
            g("history", &["undo", "redo"]),
            g("view", view),
        ];
        self
    }

    /// Rebuild the toolbar after toggling `no_attachment` or `debug`.
    pub fn rebuild_toolbar(self) -> Self {
        self.with_default_toolbar()
    }

    /// Page (multi-region) editing.
    pub fn multizone() -> Self {
        let mut options = Self::default();
        if let Some(view) = options.toolbar.iter_mut().find(|g| g.name == "view") {
            view.buttons = vec!["help".to_string()];
        }
        if let Some(image) = options.popover.get_mut("image")
            && let Some(crop) = image.iter_mut().find(|g| g.name == "cropImage")
        {
            *crop = ToolbarGroup::new("editImage", &["cropImage", "transform"]);
        }
        options
    }

    /// Translation editing: text formatting only, no media.
    pub fn translate() -> Self {
        let g = ToolbarGroup::new;
        let mut options = Self::multizone();
        options.toolbar = vec![
            g("font", &["bold", "italic", "underline", "clear"]),
            g("fontsize", &["fontsize"]),
            g("color", &["color"]),
            g("history", &["undo", "redo"]),
        ];
        options.disabled_plugins = [
            "linkPopover",
            "ImagePopover",
            "MediaPlugin",
            "ImagePlugin",
            "VideoPlugin",
            "IconPlugin",
            "DocumentPlugin",
            "tablePopover",
        ]
        .map(String::from)
        .to_vec();
        options
    }

    pub fn is_plugin_disabled(&self, name: &str) -> bool {
        self.disabled_plugins.iter().any(|p| p == name)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EditorOptions::default();
        assert_eq!(options.min_height, 180);
        assert_eq!(options.font_sizes.len(), 12);
        assert_eq!(options.asset_timeout, Duration::from_secs(10));
        let insert = options.toolbar.iter().find(|g| g.name == "insert").unwrap();
        assert_eq!(insert.buttons, vec!["linkPlugin", "mediaPlugin"]);
        assert_eq!(options.key_map.pc["CTRL+K"], "LinkPlugin.show");
    }

    #[test]
    fn test_no_attachment_toolbar() {
        let options = EditorOptions {
            no_attachment: true,
            ..EditorOptions::default()
        }
        .rebuild_toolbar();
        let insert = options.toolbar.iter().find(|g| g.name == "insert").unwrap();
        assert_eq!(insert.buttons, vec!["linkPlugin"]);
    }

    #[test]
    fn test_multizone_and_translate() {
        let options = EditorOptions::multizone();
        let view = options.toolbar.iter().find(|g| g.name == "view").unwrap();
        assert_eq!(view.buttons, vec!["help"]);
        assert!(options.popover["image"].iter().any(|g| g.name == "editImage"));

        let options = EditorOptions::translate();
        assert_eq!(options.toolbar.len(), 4);
        assert!(options.is_plugin_disabled("MediaPlugin"));
        assert!(!options.is_plugin_disabled("UnbreakablePlugin"));
    }

    #[test]
    fn test_from_json_partial() {
        let options =
            EditorOptions::from_json(r#"{"min_height": 300, "asset_timeout": 2500}"#).unwrap();
        assert_eq!(options.min_height, 300);
        assert_eq!(options.asset_timeout, Duration::from_millis(2500));
        assert_eq!(options.style_tags.len(), 10);

        assert!(EditorOptions::from_json("{not json").is_err());
    }
}
