//! Tree Item State
//!
//! UI-only state shared by every tree view: expanded, selected and filtered
//! flags per item, plus a parent id for upward walks. Items are addressed by
//! id; the entities themselves live elsewhere and are never touched by
//! anything in this module.
//!
//! ```text
//! {collapsed} --expand--> {expanded} --collapse--> {collapsed}
//! {unselected} --select--> {selected} --deselect--> {unselected}
//! ```
//!
//! Single-select trees hold at most one selected item; multi-select trees
//! hold a set.

use crate::behaviors::TreeItem;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeItemState {
    pub expanded: bool,
    pub selected: bool,
    /// Hidden by the active text filter
    pub filtered: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

#[derive(Debug, Clone, Default)]
pub struct TreeState {
    items: HashMap<String, TreeItemState>,
    parents: HashMap<String, String>,
    mode: SelectionMode,
    min_filter_length: usize,
    filter: String,
}

impl TreeState {
    pub fn new(mode: SelectionMode, min_filter_length: usize) -> Self {
        Self {
            mode,
            min_filter_length,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Track an item, keeping its flags if it is already tracked
    pub fn insert(&mut self, id: &str, parent: Option<&str>) {
        self.items.entry(id.to_string()).or_default();
        self.set_parent(id, parent);
    }

    /// Stop tracking an item; its children are re-pointed to its parent
    pub fn remove(&mut self, id: &str) -> Option<TreeItemState> {
        let state = self.items.remove(id)?;
        let parent = self.parents.remove(id);
        let children: Vec<String> = self
            .parents
            .iter()
            .filter(|(_, p)| p.as_str() == id)
            .map(|(child, _)| child.clone())
            .collect();
        for child in children {
            self.set_parent(&child, parent.as_deref());
        }
        Some(state)
    }

    /// Drop every item not accepted by `keep`
    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        let gone: Vec<String> = self
            .items
            .keys()
            .filter(|id| !keep(id.as_str()))
            .cloned()
            .collect();
        for id in gone {
            self.remove(&id);
        }
    }

    pub fn set_parent(&mut self, id: &str, parent: Option<&str>) {
        match parent {
            Some(parent) if parent != id => {
                self.parents.insert(id.to_string(), parent.to_string());
            }
            _ => {
                self.parents.remove(id);
            }
        }
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// Parent ids up to the root, nearest first
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if parent == id || ancestors.iter().any(|a| a == parent) {
                break;
            }
            ancestors.push(parent.to_string());
            current = self.parent(parent);
        }
        ancestors
    }

    pub fn state(&self, id: &str) -> TreeItemState {
        self.items.get(id).copied().unwrap_or_default()
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.state(id).expanded
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.state(id).selected
    }

    pub fn is_filtered(&self, id: &str) -> bool {
        self.state(id).filtered
    }

    // ------------------------------------------------------------------
    // Expansion
    // ------------------------------------------------------------------

    pub fn expand(&mut self, id: &str) {
        if let Some(item) = self.items.get_mut(id) {
            item.expanded = true;
        }
    }

    pub fn collapse(&mut self, id: &str) {
        if let Some(item) = self.items.get_mut(id) {
            item.expanded = false;
        }
    }

    pub fn toggle_expanded(&mut self, id: &str) {
        if let Some(item) = self.items.get_mut(id) {
            item.expanded = !item.expanded;
        }
    }

    pub fn expand_all(&mut self) {
        for item in self.items.values_mut() {
            item.expanded = true;
        }
    }

    pub fn collapse_all(&mut self) {
        self.collapse_where(|_| true);
    }

    /// Collapse every item accepted by `pred`
    pub fn collapse_where(&mut self, pred: impl Fn(&str) -> bool) {
        for (id, item) in self.items.iter_mut() {
            if pred(id.as_str()) {
                item.expanded = false;
            }
        }
    }

    /// Expand an item and every ancestor up to the root
    pub fn expand_to_root(&mut self, id: &str) {
        self.expand(id);
        for ancestor in self.ancestors(id) {
            self.expand(&ancestor);
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select an item; in single mode every other item is deselected
    pub fn select(&mut self, id: &str) -> bool {
        if !self.items.contains_key(id) {
            return false;
        }
        if self.mode == SelectionMode::Single {
            for item in self.items.values_mut() {
                item.selected = false;
            }
        }
        if let Some(item) = self.items.get_mut(id) {
            item.selected = true;
        }
        true
    }

    pub fn deselect(&mut self, id: &str) {
        if let Some(item) = self.items.get_mut(id) {
            item.selected = false;
        }
    }

    pub fn toggle_selected(&mut self, id: &str) -> bool {
        if self.is_selected(id) {
            self.deselect(id);
            false
        } else {
            self.select(id)
        }
    }

    pub fn clear_selection(&mut self) {
        for item in self.items.values_mut() {
            item.selected = false;
        }
    }

    /// Select every listed item; single-select trees ignore this
    pub fn select_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        if self.mode == SelectionMode::Single {
            return 0;
        }
        let mut count = 0;
        for id in ids {
            if let Some(item) = self.items.get_mut(id) {
                item.selected = true;
                count += 1;
            }
        }
        count
    }

    /// Selected ids, sorted
    pub fn selection(&self) -> Vec<String> {
        let mut selected: Vec<String> = self
            .items
            .iter()
            .filter(|(_, item)| item.selected)
            .map(|(id, _)| id.clone())
            .collect();
        selected.sort();
        selected
    }

    // ------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------

    pub fn filter_text(&self) -> &str {
        &self.filter
    }

    /// True when the filter text is long enough to hide items
    pub fn is_filter_active(&self) -> bool {
        self.filter.chars().count() >= self.min_filter_length.max(1)
    }

    /// Recompute `filtered` for every item from `text`
    ///
    /// Below the minimum length everything is shown. Otherwise every item is
    /// hidden, then items matching case-insensitively are shown together with
    /// their ancestors, which are also expanded.
    pub fn apply_filter<'a, T, I>(&mut self, text: &str, items: I)
    where
        T: TreeItem + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        self.filter = text.trim().to_lowercase();
        if !self.is_filter_active() {
            self.show_all();
            return;
        }
        let needle = self.filter.clone();
        let matches: Vec<String> = items
            .into_iter()
            .filter(|item| item.matches_filter(&needle))
            .map(|item| item.tree_key().to_string())
            .collect();
        self.reveal_only(&matches);
    }

    /// Hide every item except `matches` and their ancestors
    pub fn reveal_only(&mut self, matches: &[String]) {
        for item in self.items.values_mut() {
            item.filtered = true;
        }
        for id in matches {
            if let Some(item) = self.items.get_mut(id) {
                item.filtered = false;
            }
            for ancestor in self.ancestors(id) {
                if let Some(item) = self.items.get_mut(&ancestor) {
                    item.filtered = false;
                    item.expanded = true;
                }
            }
        }
    }

    pub fn clear_filter(&mut self) {
        self.filter.clear();
        self.show_all();
    }

    pub fn set_filtered(&mut self, id: &str, filtered: bool) {
        if let Some(item) = self.items.get_mut(id) {
            item.filtered = filtered;
        }
    }

    fn show_all(&mut self) {
        for item in self.items.values_mut() {
            item.filtered = false;
        }
    }
}
