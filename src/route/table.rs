use std::collections::HashMap;

use crate::error::{NavError, Result};

use super::core::{AnyRoute, Route};

/// Identity string for a route case, following the generator's naming rule:
/// `"{initials of the enumeration name, lowercased}_{case name, lowercased}"`.
///
/// Initials are the first character plus the first letter of every camel-case
/// word, so `route_path("SettingsRoute", "Profile")` is `"sr_profile"` and
/// `route_path("URLRoute", "Open")` is `"ur_open"`.
pub fn route_path(enum_name: &str, case_name: &str) -> String {
    let chars: Vec<char> = enum_name.chars().collect();
    let mut initials = String::new();
    for (idx, ch) in chars.iter().enumerate() {
        let starts_word = if idx == 0 {
            true
        } else if ch.is_uppercase() {
            let prev_lower = !chars[idx - 1].is_uppercase();
            let next_lower = chars.get(idx + 1).is_some_and(|next| next.is_lowercase());
            prev_lower || next_lower
        } else {
            false
        };
        if starts_word {
            initials.extend(ch.to_lowercase());
        }
    }
    format!("{initials}_{}", case_name.to_lowercase())
}

/// Names a navigation stack owned by a coordinator.
///
/// Generated stack enumerations implement this; plain strings do too.
pub trait StackKey {
    fn stack_name(&self) -> &str;
}

impl StackKey for str {
    fn stack_name(&self) -> &str {
        self
    }
}

impl StackKey for String {
    fn stack_name(&self) -> &str {
        self.as_str()
    }
}

/// Validated enumeration of routes, keyed by path.
///
/// Construction rejects duplicate paths: two destinations sharing a path would
/// be indistinguishable on every stack.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, AnyRoute>,
    order: Vec<String>,
}

impl RouteTable {
    pub fn new<I>(routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = AnyRoute>,
    {
        let mut table = Self::default();
        for route in routes {
            table.insert(route)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, route: AnyRoute) -> Result<()> {
        let path = route.path();
        if self.routes.contains_key(&path) {
            return Err(NavError::DuplicateRoutePath(path));
        }
        self.order.push(path.clone());
        self.routes.insert(path, route);
        Ok(())
    }

    pub fn lookup(&self, path: &str) -> Option<&AnyRoute> {
        self.routes.get(path)
    }

    /// Resolve a logical stack back into routes. Unknown paths are skipped.
    pub fn resolve_stack(&self, paths: &[String]) -> Vec<AnyRoute> {
        paths
            .iter()
            .filter_map(|path| self.routes.get(path).cloned())
            .collect()
    }

    pub fn paths(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
