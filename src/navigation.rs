//! Navigation capability: how the flows move the user to a screen.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::NavigationError;

/// Options for a navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
}

impl NavigateOptions {
    pub fn replace() -> Self {
        Self { replace: true }
    }
}

/// Something that can move the user to a path.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, path: &str, options: NavigateOptions) -> Result<(), NavigationError>;
}

/// A recorded navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationEntry {
    pub path: String,
    pub replace: bool,
}

/// Default number of entries a [`HistoryNavigator`] keeps.
const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Navigator that keeps a bounded in-memory history of where users were sent.
#[derive(Debug)]
pub struct HistoryNavigator {
    capacity: usize,
    history: Mutex<VecDeque<NavigationEntry>>,
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` entries, dropping the oldest first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn entries(&self) -> Vec<NavigationEntry> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn last_path(&self) -> Option<String> {
        self.history
            .lock()
            .ok()
            .and_then(|h| h.back().map(|e| e.path.clone()))
    }

    /// How many times `path` was navigated to.
    pub fn count(&self, path: &str) -> usize {
        self.history
            .lock()
            .map(|h| h.iter().filter(|e| e.path == path).count())
            .unwrap_or(0)
    }
}

/// Whether `path` stays inside the app. Browsers treat a backslash like `/` and
/// drop tabs and newlines, so `/\host` and `/<tab>/host` reach another origin.
pub fn is_in_app_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

#[async_trait]
impl Navigator for HistoryNavigator {
    async fn navigate(&self, path: &str, options: NavigateOptions) -> Result<(), NavigationError> {
        if !is_in_app_path(path) {
            return Err(NavigationError::Rejected {
                path: path.to_string(),
                reason: "only in-app paths can be navigated to".to_string(),
            });
        }
        let mut history = self.history.lock().map_err(|_| NavigationError::Rejected {
            path: path.to_string(),
            reason: "history lock poisoned".to_string(),
        })?;
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(NavigationEntry {
            path: path.to_string(),
            replace: options.replace,
        });
        tracing::debug!(path, replace = options.replace, "Navigated");
        Ok(())
    }
}
