//! Session plugins and their registry.
//!
//! A plugin is a value with a small capability surface. The registry keeps
//! them in insertion order; an entry without a plugin disables a built-in of
//! that name.

use std::fmt;

use smol_str::SmolStr;

use crate::dom::{Document, NodeId};
use crate::events::EditorEvent;
use crate::media;

/// What a plugin may touch while handling a call.
pub struct PluginContext<'a> {
    pub doc: &'a mut Document,
    pub editable: NodeId,
    emitted: &'a mut Vec<EditorEvent>,
}

impl<'a> PluginContext<'a> {
    pub fn new(doc: &'a mut Document, editable: NodeId, emitted: &'a mut Vec<EditorEvent>) -> Self {
        Self {
            doc,
            editable,
            emitted,
        }
    }

    pub fn emit(&mut self, event: EditorEvent) {
        self.emitted.push(event);
    }
}

pub trait Plugin: Send {
    fn name(&self) -> &'static str;

    fn init(&mut self, _cx: &mut PluginContext<'_>) {}

    fn destroy(&mut self, _cx: &mut PluginContext<'_>) {}

    /// Observe an event the session emitted.
    fn on_event(&mut self, _cx: &mut PluginContext<'_>, _event: &EditorEvent) {}

    /// Commands key map entries may bind, addressed as `Name.command`.
    fn commands(&self) -> &'static [&'static str] {
        &[]
    }
}

pub const MEDIA_PLUGIN: &str = "MediaPlugin";
pub const LINK_PLUGIN: &str = "LinkPlugin";
pub const FONT_PLUGIN: &str = "FontPlugin";
pub const UNBREAKABLE_PLUGIN: &str = "UnbreakablePlugin";

/// Makes empty icons and document links reachable by the caret.
#[derive(Debug, Default)]
pub struct MediaPlugin;

impl Plugin for MediaPlugin {
    fn name(&self) -> &'static str {
        MEDIA_PLUGIN
    }

    fn init(&mut self, cx: &mut PluginContext<'_>) {
        media::prepare_for_editing(cx.doc, cx.editable);
    }
}

/// Link dialog (`show`) and link removal (`unlink`).
#[derive(Debug, Default)]
pub struct LinkPlugin;

impl Plugin for LinkPlugin {
    fn name(&self) -> &'static str {
        LINK_PLUGIN
    }

    fn commands(&self) -> &'static [&'static str] {
        &["show", "unlink"]
    }
}

/// Text color, background color and size.
#[derive(Debug, Default)]
pub struct FontPlugin;

impl Plugin for FontPlugin {
    fn name(&self) -> &'static str {
        FONT_PLUGIN
    }

    fn commands(&self) -> &'static [&'static str] {
        &["changeForeColor", "changeBgColor", "changeFontSize"]
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    entries: Vec<(SmolStr, Option<Box<dyn Plugin>>)>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, p)| (name, p.is_some())))
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.add(MediaPlugin);
        registry.add(LinkPlugin);
        registry.add(FontPlugin);
        registry
    }

    /// Add or replace a plugin under its own name.
    pub fn add(&mut self, plugin: impl Plugin + 'static) {
        let name = SmolStr::new_static(plugin.name());
        let plugin: Box<dyn Plugin> = Box::new(plugin);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = Some(plugin),
            None => self.entries.push((name, Some(plugin))),
        }
    }

    /// Disable a plugin by name, including ones not registered yet.
    pub fn disable(&mut self, name: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = None,
            None => self.entries.push((SmolStr::new(name), None)),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .is_none_or(|(_, p)| p.is_some())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, p)| p.is_some())
            .map(|(n, _)| n.as_str())
    }

    /// Whether an enabled plugin answers `command` (`Name.command`).
    pub fn handles(&self, command: &str) -> bool {
        let Some((name, command)) = command.split_once('.') else {
            return false;
        };
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, p)| p.as_ref())
            .is_some_and(|p| p.commands().contains(&command))
    }

    fn enabled_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Plugin>> {
        self.entries.iter_mut().filter_map(|(_, p)| p.as_mut())
    }

    pub fn init_all(&mut self, cx: &mut PluginContext<'_>) {
        for plugin in self.enabled_mut() {
            plugin.init(cx);
        }
    }

    pub fn destroy_all(&mut self, cx: &mut PluginContext<'_>) {
        for plugin in self.enabled_mut() {
            plugin.destroy(cx);
        }
    }

    pub fn dispatch(&mut self, cx: &mut PluginContext<'_>, event: &EditorEvent) {
        for plugin in self.enabled_mut() {
            plugin.on_event(cx, event);
        }
    }
}
