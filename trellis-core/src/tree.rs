//! The immutable resource tree and URL routing.
//!
//! Building the tree assigns every resource a node, derives its list and
//! item URL templates from its ancestors, validates the declarations and
//! compiles a route table ordered so that the longest template wins.

use crate::conditional::CachePolicy;
use crate::content_negotiation::MimetypePair;
use crate::error::BuildError;
use crate::payload::is_xml_name;
use crate::resource::Resource;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Index of a node in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One path segment of a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Capture(String),
}

/// Ordered segments, rendered as `/items/{item_id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UrlTemplate {
    segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Template of literal segments taken from a path like `/api/v1/`.
    pub fn from_path(path: &str) -> Self {
        Self {
            segments: split_path(path)
                .map(|s| Segment::Literal(s.to_string()))
                .collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a literal. Empty literals add nothing.
    pub fn with_literal(&self, literal: &str) -> Self {
        let mut segments = self.segments.clone();
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal.to_string()));
        }
        Self { segments }
    }

    pub fn with_capture(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Capture(key.to_string()));
        Self { segments }
    }

    pub fn capture_keys(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(key) => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Template text with `{key}` placeholders.
    pub fn render(&self) -> String {
        let mut out = String::from("/");
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Capture(key) => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
            out.push('/');
        }
        out
    }

    /// Concrete path with each capture replaced by its percent-encoded value.
    /// Returns `None` when a value is missing.
    pub fn expand(&self, values: &HashMap<String, String>) -> Option<String> {
        let mut out = String::from("/");
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Capture(key) => out.push_str(&urlencoding::encode(values.get(key)?)),
            }
            out.push('/');
        }
        Some(out)
    }

    /// Match already-split path segments, returning decoded captures.
    pub fn match_segments(&self, path: &[&str]) -> Option<Vec<(String, String)>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut captures = Vec::new();
        for (segment, value) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != value {
                        return None;
                    }
                }
                Segment::Capture(key) => {
                    if value.is_empty() {
                        return None;
                    }
                    let decoded = urlencoding::decode(value)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| value.to_string());
                    captures.push((key.clone(), decoded));
                }
            }
        }
        Some(captures)
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A resource placed in the tree.
#[derive(Debug)]
pub struct ResourceNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub list_template: UrlTemplate,
    /// Item template; equal to the list template for singletons.
    pub template: UrlTemplate,
    pub resource: Resource,
    pub mimetypes: Vec<MimetypePair>,
}

impl ResourceNode {
    pub fn name(&self) -> &str {
        self.resource.name()
    }
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub template: UrlTemplate,
    pub node: NodeId,
    pub is_item: bool,
}

/// Result of matching a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub node: NodeId,
    pub is_item: bool,
    /// Percent-decoded `(capture key, value)` pairs, outermost first.
    pub captures: Vec<(String, String)>,
}

/// Validated, immutable resource hierarchy.
#[derive(Debug)]
pub struct ResourceTree {
    nodes: Vec<ResourceNode>,
    routes: Vec<Route>,
    base: UrlTemplate,
}

impl ResourceTree {
    /// Build with the root mounted at `/`.
    pub fn build(root: Resource) -> Result<Self, BuildError> {
        Self::build_with_base(root, "/")
    }

    /// Build with the root mounted at `base_path`, e.g. `/api/`.
    pub fn build_with_base(root: Resource, base_path: &str) -> Result<Self, BuildError> {
        if !base_path.starts_with('/') || base_path.contains(['{', '}', '?', '#']) {
            return Err(BuildError::InvalidBasePath(base_path.to_string()));
        }
        let base = UrlTemplate::from_path(base_path);

        let mut nodes = Vec::new();
        let mut keys = Vec::new();
        add_node(&mut nodes, root, None, &base, &mut keys)?;

        resolve_related(&mut nodes)?;
        validate_cache_fields(&nodes)?;
        validate_collaborators(&nodes)?;

        let mut routes = Vec::new();
        for node in &nodes {
            if node.resource.singleton {
                routes.push(Route {
                    template: node.template.clone(),
                    node: node.id,
                    is_item: true,
                });
            } else {
                routes.push(Route {
                    template: node.list_template.clone(),
                    node: node.id,
                    is_item: false,
                });
                routes.push(Route {
                    template: node.template.clone(),
                    node: node.id,
                    is_item: true,
                });
            }
        }
        // Stable: equal lengths keep declaration order.
        routes.sort_by(|a, b| b.template.len().cmp(&a.template.len()));

        Ok(Self {
            nodes,
            routes,
            base,
        })
    }

    pub fn root(&self) -> &ResourceNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &ResourceNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn base(&self) -> &UrlTemplate {
        &self.base
    }

    /// First node, in declaration order, with this resource name.
    pub fn find(&self, name: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.resource.name == name)
    }

    /// Path from the root down to `id`, inclusive.
    pub fn chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain.reverse();
        chain
    }

    /// Match a request path against the route table.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = split_path(path).collect();

        self.routes.iter().find_map(|route| {
            route
                .template
                .match_segments(&segments)
                .map(|captures| RouteMatch {
                    node: route.node,
                    is_item: route.is_item,
                    captures,
                })
        })
    }

    /// Every template keyed by resource name and plural name. The first
    /// declaration wins when names repeat.
    pub fn uri_templates(&self) -> BTreeMap<String, String> {
        let mut templates = BTreeMap::new();
        for node in self.nodes.iter().skip(1) {
            let resource = &node.resource;
            templates
                .entry(resource.name.clone())
                .or_insert_with(|| node.template.render());
            if !resource.singleton {
                templates
                    .entry(resource.name_plural.clone())
                    .or_insert_with(|| node.list_template.render());
            }
        }
        templates
    }
}

fn add_node(
    nodes: &mut Vec<ResourceNode>,
    mut resource: Resource,
    parent: Option<NodeId>,
    parent_template: &UrlTemplate,
    ancestor_keys: &mut Vec<String>,
) -> Result<NodeId, BuildError> {
    let children = std::mem::take(&mut resource.children);

    let mut names = HashSet::new();
    let mut uri_names = HashSet::new();
    for child in &children {
        if !names.insert(child.name.clone()) || !uri_names.insert(child.uri_name()) {
            return Err(BuildError::DuplicateSibling {
                parent: resource.name.clone(),
                name: child.name.clone(),
            });
        }
    }

    if !resource.singleton && ancestor_keys.contains(&resource.object_key_name) {
        return Err(BuildError::DuplicateCaptureKey {
            resource: resource.name.clone(),
            key: resource.object_key_name.clone(),
        });
    }

    let list_template = parent_template.with_literal(&resource.uri_name());
    let template = if resource.singleton {
        list_template.clone()
    } else {
        list_template.with_capture(&resource.object_key_name)
    };

    let mimetypes = MimetypePair::for_resource(
        resource.vendor.as_deref(),
        &resource.name,
        &resource.name_plural,
        resource.singleton,
    );

    let id = NodeId(nodes.len());
    let pushes_key = !resource.singleton;
    if pushes_key {
        ancestor_keys.push(resource.object_key_name.clone());
    }

    nodes.push(ResourceNode {
        id,
        parent,
        children: Vec::new(),
        list_template,
        template: template.clone(),
        resource,
        mimetypes,
    });

    for child in children {
        let child_id = add_node(nodes, child, Some(id), &template, ancestor_keys)?;
        nodes[id.0].children.push(child_id);
    }

    if pushes_key {
        ancestor_keys.pop();
    }
    Ok(id)
}

fn resolve_related(nodes: &mut [ResourceNode]) -> Result<(), BuildError> {
    let mut by_name: HashMap<String, Vec<NodeId>> = HashMap::new();
    for node in nodes.iter() {
        by_name
            .entry(node.resource.name.clone())
            .or_default()
            .push(node.id);
    }

    for node in nodes.iter_mut() {
        let resource_name = node.resource.name.clone();
        for field in &mut node.resource.fields {
            let Some(target) = field.related_resource() else {
                continue;
            };
            match by_name.get(target).map(Vec::as_slice) {
                Some([id]) => field.target = Some(*id),
                Some([]) | None => {
                    return Err(BuildError::UnknownRelatedResource {
                        resource: resource_name,
                        field: field.name().to_string(),
                        target: target.to_string(),
                    });
                }
                Some(_) => {
                    return Err(BuildError::AmbiguousRelatedResource {
                        resource: resource_name,
                        field: field.name().to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_cache_fields(nodes: &[ResourceNode]) -> Result<(), BuildError> {
    for node in nodes {
        let resource = &node.resource;
        if let CachePolicy::EtagField(field) = &resource.cache {
            let known = resource
                .fields
                .iter()
                .any(|f| f.name() == field && f.related_resource().is_none());
            if !known {
                return Err(BuildError::UnknownEtagField {
                    resource: resource.name.clone(),
                    field: field.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Rejects routes whose collaborators are missing and names XML cannot carry.
fn validate_collaborators(nodes: &[ResourceNode]) -> Result<(), BuildError> {
    for node in nodes {
        let resource = &node.resource;
        let names = resource
            .fields
            .iter()
            .map(|f| f.name())
            .chain(resource.extra_links.iter().map(|l| l.name.as_str()));
        for name in names {
            if !is_xml_name(name) {
                return Err(BuildError::InvalidFieldName {
                    resource: resource.name.clone(),
                    name: name.to_string(),
                });
            }
        }

        if resource.default_list && resource.query.is_none() {
            return Err(BuildError::MissingQuery {
                resource: resource.name.clone(),
            });
        }

        if resource.singleton {
            continue;
        }

        let slots = &resource.handlers;
        let serves_objects = slots.list.is_some()
            || slots.get.is_some()
            || slots.create.is_some()
            || slots.update.is_some();
        if serves_objects && !resource.has_object_key() {
            return Err(BuildError::MissingObjectKey {
                resource: resource.name.clone(),
            });
        }

        let resolves_items = slots.get.is_some()
            || slots.update.is_some()
            || slots.delete.is_some()
            || !node.children.is_empty();
        if resolves_items && resource.lookup.is_none() {
            return Err(BuildError::MissingLookup {
                resource: resource.name.clone(),
            });
        }
    }
    Ok(())
}
