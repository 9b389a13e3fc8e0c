//! Browsing Session: the current filtered list plus a cursor into it.
//!
//! The session is a plain value owned by the front-end and passed
//! explicitly, so navigation can be driven from a terminal prompt, a UI
//! event loop or a test without any ambient state.

use crate::error::CroquiError;
use crate::route::Route;

/// Cursor over a filtered route list.
///
/// Invariant: `cursor < routes.len()` whenever the list is non-empty, and
/// `cursor == 0` when it is empty.
#[derive(Debug, Clone, Default)]
pub struct BrowseSession {
    routes: Vec<Route>,
    cursor: usize,
}

impl BrowseSession {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes, cursor: 0 }
    }

    /// Swap in a newly filtered list, keeping the cursor when it still fits
    /// and resetting it to 0 otherwise.
    pub fn set_routes(&mut self, routes: Vec<Route>) {
        self.routes = routes;
        if self.cursor >= self.routes.len() {
            self.cursor = 0;
        }
    }

    /// Jump to route `index` of the current list.
    pub fn select(&mut self, index: usize) -> Result<&Route, CroquiError> {
        if index >= self.routes.len() {
            return Err(CroquiError::SelectionOutOfRange {
                index,
                len: self.routes.len(),
            });
        }
        self.cursor = index;
        Ok(&self.routes[index])
    }

    /// Move forward one route; stays put on the last one.
    pub fn next(&mut self) {
        if self.has_next() {
            self.cursor += 1;
        }
    }

    /// Move back one route; stays put on the first one.
    pub fn previous(&mut self) {
        if self.has_previous() {
            self.cursor -= 1;
        }
    }

    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.routes.len()
    }

    pub fn has_previous(&self) -> bool {
        self.cursor > 0
    }

    /// The route under the cursor, `None` for an empty selection.
    pub fn current(&self) -> Option<&Route> {
        self.routes.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
