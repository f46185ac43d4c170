/// Segment-tree route table for dynamic HTTP dispatch
use crate::descriptor::RouteDescriptor;
use crate::error::RouteError;
use crate::types::RouteAction;
use compact_str::CompactString;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A route stored at a terminal node of the tree
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Descriptor as registered by the module
    pub descriptor: Arc<RouteDescriptor>,
    /// Name of the owning module
    pub module: CompactString,
    /// Names of the `:param` segments, in path order
    param_names: Vec<CompactString>,
}

/// A node in the route tree
#[derive(Debug, Default)]
pub struct RouteNode {
    /// Route terminating at this exact node
    entry: Option<RouteEntry>,
    /// Static child segments
    children: HashMap<CompactString, RouteNode>,
    /// Child matching any single segment
    param_child: Option<Box<RouteNode>>,
}

/// Result of a successful lookup
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub descriptor: Arc<RouteDescriptor>,
    pub module: CompactString,
    /// Captured path parameters, percent-decoded strings
    pub path_params: Map<String, Value>,
}

/// Route table keyed by action, then by path segments.
///
/// `/users/:id/posts` is stored as root -> "users" -> `:` -> "posts". Static
/// segments win over parameter segments, falling back when the static branch
/// dead-ends, so `/users/me` and `/users/:id` can coexist.
#[derive(Debug, Default)]
pub struct PathRouter {
    roots: HashMap<RouteAction, RouteNode>,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl PathRouter {
    /// Create an empty route table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route for a module.
    ///
    /// Re-registering a route the same module already owns replaces it and
    /// returns the previous descriptor. A route owned by another module is a
    /// conflict. Paths that differ only in parameter names are the same route.
    pub fn register_route(
        &mut self,
        module: &str,
        descriptor: RouteDescriptor,
    ) -> Result<Option<Arc<RouteDescriptor>>, RouteError> {
        descriptor.validate()?;

        let mut current = self.roots.entry(descriptor.action).or_default();
        let mut param_names = Vec::new();
        for segment in segments(&descriptor.path) {
            current = match segment.strip_prefix(':') {
                Some(name) => {
                    param_names.push(CompactString::new(name));
                    &mut **current.param_child.get_or_insert_with(Default::default)
                }
                None => current.children.entry(CompactString::new(segment)).or_default(),
            };
        }

        if let Some(existing) = &current.entry {
            if existing.module != module {
                return Err(RouteError::Conflict(format!(
                    "{} {} is already registered by module '{}'",
                    descriptor.action, descriptor.path, existing.module
                )));
            }
        }

        let previous = current.entry.replace(RouteEntry {
            descriptor: Arc::new(descriptor),
            module: CompactString::new(module),
            param_names,
        });
        Ok(previous.map(|entry| entry.descriptor))
    }

    /// Find the route serving `path` for `action`
    pub fn find_route(&self, action: RouteAction, path: &str) -> Option<RouteMatch> {
        let root = self.roots.get(&action)?;
        let parts: Vec<&str> = segments(path).collect();
        let mut captured = Vec::new();
        let entry = Self::match_node(root, &parts, &mut captured)?;

        let path_params = entry
            .param_names
            .iter()
            .zip(captured)
            .map(|(name, value)| {
                let decoded = percent_decode_str(value).decode_utf8_lossy();
                (name.to_string(), Value::String(decoded.into_owned()))
            })
            .collect();

        Some(RouteMatch {
            descriptor: entry.descriptor.clone(),
            module: entry.module.clone(),
            path_params,
        })
    }

    fn match_node<'a, 'p>(
        node: &'a RouteNode,
        parts: &[&'p str],
        captured: &mut Vec<&'p str>,
    ) -> Option<&'a RouteEntry> {
        let Some((head, rest)) = parts.split_first() else {
            return node.entry.as_ref();
        };

        if let Some(child) = node.children.get(*head) {
            if let Some(entry) = Self::match_node(child, rest, captured) {
                return Some(entry);
            }
        }

        if let Some(child) = &node.param_child {
            captured.push(*head);
            if let Some(entry) = Self::match_node(child, rest, captured) {
                return Some(entry);
            }
            captured.pop();
        }

        None
    }

    /// Remove every route owned by `module`, returning how many were removed
    pub fn remove_module(&mut self, module: &str) -> usize {
        let mut removed = 0;
        for root in self.roots.values_mut() {
            removed += Self::remove_from_node(root, module);
        }
        removed
    }

    fn remove_from_node(node: &mut RouteNode, module: &str) -> usize {
        let mut removed = 0;
        if node.entry.as_ref().is_some_and(|entry| entry.module == module) {
            node.entry = None;
            removed += 1;
        }
        for child in node.children.values_mut() {
            removed += Self::remove_from_node(child, module);
        }
        if let Some(child) = node.param_child.as_deref_mut() {
            removed += Self::remove_from_node(child, module);
        }
        removed
    }

    /// Get total number of registered routes
    pub fn total_routes(&self) -> usize {
        self.roots.values().map(Self::count_routes).sum()
    }

    fn count_routes(node: &RouteNode) -> usize {
        let mut count = usize::from(node.entry.is_some());
        for child in node.children.values() {
            count += Self::count_routes(child);
        }
        if let Some(child) = &node.param_child {
            count += Self::count_routes(child);
        }
        count
    }

    /// Get every registered route (for the admin surface and debugging)
    pub fn all_routes(&self) -> Vec<RouteEntry> {
        let mut routes = Vec::new();
        for action in RouteAction::ALL {
            if let Some(root) = self.roots.get(&action) {
                Self::collect_routes(root, &mut routes);
            }
        }
        routes
    }

    fn collect_routes(node: &RouteNode, routes: &mut Vec<RouteEntry>) {
        if let Some(entry) = &node.entry {
            routes.push(entry.clone());
        }
        let mut keys: Vec<&CompactString> = node.children.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(child) = node.children.get(key) {
                Self::collect_routes(child, routes);
            }
        }
        if let Some(child) = &node.param_child {
            Self::collect_routes(child, routes);
        }
    }

    /// Find registered paths sharing segments with `target` (when an exact match fails)
    pub fn find_similar_paths(&self, target: &str, max_results: usize) -> Vec<String> {
        let target_parts: Vec<&str> = segments(target).collect();
        let mut scored: Vec<(usize, String)> = self
            .all_routes()
            .into_iter()
            .filter_map(|entry| {
                let shared = segments(&entry.descriptor.path)
                    .filter(|segment| target_parts.contains(segment))
                    .count();
                (shared > 0).then(|| (shared, format!("{} {}", entry.descriptor.action, entry.descriptor.path)))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().take(max_results).map(|(_, path)| path).collect()
    }

    /// Check if a route exists for the given action and path
    pub fn route_exists(&self, action: RouteAction, path: &str) -> bool {
        self.find_route(action, path).is_some()
    }
}
