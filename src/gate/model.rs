//! Screen catalog model.

use serde::{Deserialize, Serialize};

use crate::session::ScreenId;

/// A permission-scoped route ("pantalla").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub id: ScreenId,
    #[serde(alias = "ruta")]
    pub route: String,
    #[serde(default, alias = "permisoId", skip_serializing_if = "Option::is_none")]
    pub required_permission_id: Option<i64>,
}

impl Screen {
    pub fn new(id: ScreenId, route: impl Into<String>) -> Self {
        Self {
            id,
            route: route.into(),
            required_permission_id: None,
        }
    }

    /// The root route never gates anything by prefix.
    pub fn is_root(&self) -> bool {
        self.route.is_empty() || self.route == "/"
    }
}

/// Find the screen governing `path`: the exact route match if there is one,
/// otherwise the longest non-root route that prefixes `path`.
pub fn match_screen<'a>(screens: &'a [Screen], path: &str) -> Option<&'a Screen> {
    let path = strip_query(path);

    if let Some(exact) = screens.iter().find(|s| s.route == path) {
        return Some(exact);
    }

    screens
        .iter()
        .filter(|s| !s.is_root() && path.starts_with(s.route.as_str()))
        .max_by_key(|s| s.route.len())
}

/// Drop any `?query` or `#fragment` from a requested path.
pub fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}
