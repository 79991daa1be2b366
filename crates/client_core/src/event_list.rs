//! Category filter and pagination over the loaded event collection.
//!
//! The visible subset is recomputed from `(events, filter)` on every call and
//! never cached.

use std::collections::HashSet;

use shared::domain::Event;

/// Events per page. One page is the unit of `load_more`.
pub const PAGE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    selected_category: Option<String>,
    visible_count: usize,
}

impl FilterState {
    pub fn selected_category(&self) -> Option<&str> {
        self.selected_category.as_deref()
    }

    /// Always a positive multiple of [`PAGE_SIZE`].
    pub fn visible_count(&self) -> usize {
        self.visible_count
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            selected_category: None,
            visible_count: PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventListController {
    events: Vec<Event>,
    filter: FilterState,
}

impl EventListController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the collection and resets the filter to one unfiltered page.
    pub fn load(&mut self, events: Vec<Event>) {
        self.events = events;
        self.filter = FilterState::default();
    }

    /// `None` clears the filter. Always resets to one page.
    pub fn set_category(&mut self, category: Option<String>) {
        self.filter.selected_category = category;
        self.filter.visible_count = PAGE_SIZE;
    }

    pub fn load_more(&mut self) {
        self.filter.visible_count = self.filter.visible_count.saturating_add(PAGE_SIZE);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// Distinct categories in first-occurrence order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.events
            .iter()
            .map(|event| event.category.as_str())
            .filter(|category| seen.insert(*category))
            .collect()
    }

    /// Exact, case-sensitive match; order follows the loaded collection.
    pub fn filtered(&self) -> impl Iterator<Item = &Event> + '_ {
        let selected = self.filter.selected_category.as_deref();
        self.events
            .iter()
            .filter(move |event| selected.map_or(true, |category| event.category == category))
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered().count()
    }

    pub fn visible(&self) -> Vec<&Event> {
        self.filtered().take(self.filter.visible_count).collect()
    }

    pub fn has_more(&self) -> bool {
        self.filter.visible_count < self.filtered_len()
    }
}

#[cfg(test)]
#[path = "tests/event_list_tests.rs"]
mod tests;
