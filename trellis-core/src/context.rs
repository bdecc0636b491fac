// Per-request state shared by the dispatch pipeline and the serializer

use crate::collection::Object;
use crate::content_negotiation::Negotiated;
use crate::pagination::PageParams;
use crate::tree::{NodeId, ResourceTree, RouteMatch};
use crate::{HttpMethod, Principal};
use std::collections::{HashMap, HashSet};

/// Query parameter and body field naming links to inline.
pub const EXPAND_PARAM: &str = "expand";

/// Query parameter restricting the serialized fields.
pub const ONLY_FIELDS_PARAM: &str = "only-fields";

/// Query parameter restricting the serialized links.
pub const ONLY_LINKS_PARAM: &str = "only-links";

/// Names of fields and links to inline instead of linking.
///
/// Entries may be dotted (`owner.profile`): expanding `owner` leaves
/// `profile` to be expanded one level further down. Every step consumes
/// at least one segment, so recursion always terminates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandSet {
    paths: Vec<Vec<String>>,
}

impl ExpandSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list like `owner,comments.author`.
    pub fn parse(raw: &str) -> Self {
        let paths = raw
            .split(',')
            .map(|entry| {
                entry
                    .split('.')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|path| !path.is_empty())
            .collect();
        Self { paths }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether `name` may be expanded at this level.
    pub fn contains(&self, name: &str) -> bool {
        self.paths.iter().any(|path| path[0] == name)
    }

    /// Total number of segments left.
    pub fn segment_count(&self) -> usize {
        self.paths.iter().map(Vec::len).sum()
    }

    /// Set to use inside an expansion of `name`: entries headed by `name`
    /// lose that head, all other entries stay.
    pub fn consume(&self, name: &str) -> Self {
        let paths = self
            .paths
            .iter()
            .filter_map(|path| {
                if path[0] == name {
                    (path.len() > 1).then(|| path[1..].to_vec())
                } else {
                    Some(path.clone())
                }
            })
            .collect();
        Self { paths }
    }
}

/// Parse a comma-separated name list; an empty value yields an empty set.
pub fn parse_name_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A capture value bound to the node that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub node: NodeId,
    pub key: String,
    pub value: String,
}

/// State of one request as it moves through dispatch.
pub struct RequestContext {
    pub method: HttpMethod,
    pub path: String,
    pub node: NodeId,
    pub is_item: bool,
    pub captures: Vec<Capture>,
    /// Objects resolved along the path, root first.
    pub resolved: Vec<(NodeId, Object)>,
    pub negotiated: Option<Negotiated>,
    pub expand: ExpandSet,
    /// `None` means every field; an empty set means none.
    pub only_fields: Option<HashSet<String>>,
    /// `None` means every link; an empty set omits `links` entirely.
    pub only_links: Option<HashSet<String>>,
    pub page: PageParams,
    pub principal: Principal,
    pub query: HashMap<String, String>,
}

impl RequestContext {
    /// Bind a route match to the nodes that declared each capture.
    pub fn new(
        tree: &ResourceTree,
        method: HttpMethod,
        path: impl Into<String>,
        route: &RouteMatch,
        principal: Principal,
        query: HashMap<String, String>,
    ) -> Self {
        let captures = tree
            .chain(route.node)
            .into_iter()
            .filter_map(|id| {
                let key = &tree.node(id).resource.object_key_name;
                route
                    .captures
                    .iter()
                    .find(|(k, _)| k == key)
                    .filter(|_| !tree.node(id).resource.singleton)
                    .map(|(k, v)| Capture {
                        node: id,
                        key: k.clone(),
                        value: v.clone(),
                    })
            })
            .collect();

        Self {
            method,
            path: path.into(),
            node: route.node,
            is_item: route.is_item,
            captures,
            resolved: Vec::new(),
            negotiated: None,
            expand: ExpandSet::empty(),
            only_fields: None,
            only_links: None,
            page: PageParams::default(),
            principal,
            query,
        }
    }

    /// Object resolved for `node`, if it lies on the request path.
    pub fn object_for(&self, node: NodeId) -> Option<&Object> {
        self.resolved
            .iter()
            .find(|(id, _)| *id == node)
            .map(|(_, obj)| obj)
    }

    pub fn capture_for(&self, node: NodeId) -> Option<&str> {
        self.captures
            .iter()
            .find(|c| c.node == node)
            .map(|c| c.value.as_str())
    }

    /// The addressed object of an item request.
    pub fn item(&self) -> Option<&Object> {
        if self.is_item {
            self.object_for(self.node)
        } else {
            None
        }
    }

    /// Resolved objects above the target, root first.
    pub fn parents(&self) -> Vec<Object> {
        self.resolved
            .iter()
            .filter(|(id, _)| *id != self.node)
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    /// The nearest resolved object that is not the target.
    pub fn nearest_parent(&self) -> Option<&Object> {
        self.resolved
            .iter()
            .rev()
            .find(|(id, _)| *id != self.node)
            .map(|(_, obj)| obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::object;
    use crate::resource::{LookupContext, Resource};

    #[test]
    fn test_expand_parse() {
        let set = ExpandSet::parse("owner, comments.author,,");
        assert!(set.contains("owner"));
        assert!(set.contains("comments"));
        assert!(!set.contains("author"));
        assert_eq!(set.segment_count(), 3);
        assert!(ExpandSet::parse("").is_empty());
    }

    #[test]
    fn test_expand_consume() {
        let set = ExpandSet::parse("owner,comments.author");
        let inner = set.consume("comments");
        assert!(inner.contains("author"));
        assert!(inner.contains("owner"));
        assert!(!inner.contains("comments"));

        let inner = set.consume("owner");
        assert!(!inner.contains("owner"));
        assert!(inner.contains("comments"));
    }

    #[test]
    fn test_consume_strictly_shrinks() {
        let mut set = ExpandSet::parse("a.b.a,b.a,a");
        let mut steps = 0;
        let total = set.segment_count();
        while set.contains("a") || set.contains("b") {
            let name = if set.contains("a") { "a" } else { "b" };
            let next = set.consume(name);
            assert!(next.segment_count() < set.segment_count());
            set = next;
            steps += 1;
        }
        assert!(steps <= total);
    }

    #[test]
    fn test_parse_name_list() {
        assert!(parse_name_list("").is_empty());
        let names = parse_name_list("id, name");
        assert!(names.contains("id") && names.contains("name"));
    }

    #[test]
    fn test_request_context_binding() {
        let root = Resource::root("root")
            .with_child(
                Resource::new("item")
                    .with_lookup(|_ctx: LookupContext| async { Ok(None) })
                    .with_child(Resource::new("comment")),
            );
        let tree = ResourceTree::build(root).unwrap();
        let route = tree.match_path("/items/4/comments/9/").unwrap();
        let mut ctx = RequestContext::new(
            &tree,
            HttpMethod::GET,
            "/items/4/comments/9/",
            &route,
            Principal::Anonymous,
            HashMap::new(),
        );

        let item = tree.find("item").unwrap().id;
        assert_eq!(ctx.capture_for(item), Some("4"));
        assert_eq!(ctx.capture_for(route.node), Some("9"));

        ctx.resolved.push((tree.root().id, object(())));
        ctx.resolved.push((item, object(4u32)));
        ctx.resolved.push((route.node, object(9u32)));
        assert_eq!(ctx.parents().len(), 2);
        assert!(ctx.item().is_some());
        assert_eq!(
            ctx.nearest_parent().unwrap().downcast_ref::<u32>(),
            Some(&4)
        );
    }
}
