//! Object serialization.
//!
//! Turns a resolved object into the field/link tree that is placed in the
//! response envelope. Related objects and child lists are emitted as links
//! unless the request expands them, in which case they are serialized in
//! place, bounded by the expand set and by the branch of objects already
//! being serialized.

use crate::collection::Object;
use crate::context::{ExpandSet, RequestContext};
use crate::permission::Operation;
use crate::resource::{FieldValue, LookupContext, QueryContext};
use crate::tree::{NodeId, ResourceTree};
use crate::{Error, HttpMethod};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// One entry of a `links` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub href: String,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
}

impl LinkEntry {
    pub fn new(href: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            href: href.into(),
            method,
            title: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("href".to_string(), Value::String(self.href.clone()));
        map.insert(
            "method".to_string(),
            Value::String(self.method.as_str().to_string()),
        );
        if let Some(title) = &self.title {
            map.insert("title".to_string(), Value::String(title.clone()));
        }
        Value::Object(map)
    }
}

/// Field and link filters for one serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Restrictions {
    pub only_fields: Option<HashSet<String>>,
    pub only_links: Option<HashSet<String>>,
}

impl Restrictions {
    fn keeps_field(&self, name: &str) -> bool {
        self.only_fields.as_ref().is_none_or(|set| set.contains(name))
    }

    fn keeps_link(&self, name: &str) -> bool {
        self.only_links.as_ref().is_none_or(|set| set.contains(name))
    }
}

type Branch = Vec<(NodeId, String)>;

/// Serializes objects of one request.
pub struct Serializer<'a> {
    tree: &'a ResourceTree,
    ctx: &'a RequestContext,
    site_url: String,
    expansion_limit: usize,
}

impl<'a> Serializer<'a> {
    pub fn new(tree: &'a ResourceTree, ctx: &'a RequestContext) -> Self {
        Self {
            tree,
            ctx,
            site_url: String::new(),
            expansion_limit: crate::pagination::DEFAULT_MAX_RESULTS,
        }
    }

    /// Prefix for every href, e.g. `https://example.com`.
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = site_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Largest number of entries inlined when a child list is expanded.
    pub fn with_expansion_limit(mut self, limit: usize) -> Self {
        self.expansion_limit = limit;
        self
    }

    /// Walk from `node` towards the root, pairing each node with its object.
    ///
    /// Parent objects come from the resource's parent key, else from the
    /// objects resolved for the current request.
    fn ancestry(&self, node: NodeId, obj: &Object) -> Result<Vec<(NodeId, Option<Object>)>, Error> {
        let mut out = Vec::new();
        let mut current = Some(obj.clone());
        let mut id = Some(node);

        while let Some(nid) = id {
            let tree_node = self.tree.node(nid);
            let here = current.or_else(|| self.ctx.object_for(nid).cloned());
            current = match (&here, &tree_node.resource.parent_key) {
                (Some(o), Some(parent_key)) => parent_key(o)?,
                _ => None,
            };
            out.push((nid, here));
            id = tree_node.parent;
        }
        Ok(out)
    }

    /// Objects from the root down to `obj`, skipping unknown levels.
    pub fn object_chain(&self, node: NodeId, obj: &Object) -> Result<Vec<Object>, Error> {
        let mut chain: Vec<Object> = self
            .ancestry(node, obj)?
            .into_iter()
            .filter_map(|(_, o)| o)
            .collect();
        chain.reverse();
        Ok(chain)
    }

    /// Absolute item href of `obj` as an object of `node`.
    pub fn href_for(&self, node: NodeId, obj: &Object) -> Result<String, Error> {
        let mut values = HashMap::new();
        for (nid, here) in self.ancestry(node, obj)? {
            let resource = &self.tree.node(nid).resource;
            if resource.singleton {
                continue;
            }
            let key = match &here {
                Some(o) => resource.object_key_of(o)?,
                None => self
                    .ctx
                    .capture_for(nid)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::Internal(format!(
                            "cannot build a URL for '{}': no parent object for '{}'",
                            self.tree.node(node).name(),
                            resource.name()
                        ))
                    })?,
            };
            values.insert(resource.object_key_name.clone(), key);
        }

        let path = self
            .tree
            .node(node)
            .template
            .expand(&values)
            .ok_or_else(|| Error::Internal("incomplete URL template values".to_string()))?;
        Ok(format!("{}{}", self.site_url, path))
    }

    /// Href of the list URL for the current request.
    pub fn request_href(&self) -> String {
        format!("{}{}", self.site_url, self.ctx.path)
    }

    /// Serialize `obj` with the request's expand set and restrictions.
    pub async fn serialize_object(&self, obj: &Object, node: NodeId) -> Result<Value, Error> {
        let restrictions = Restrictions {
            only_fields: self.ctx.only_fields.clone(),
            only_links: self.ctx.only_links.clone(),
        };
        self.serialize(obj.clone(), node, self.ctx.expand.clone(), restrictions)
            .await
    }

    /// Full, unexpanded payload used to compute ETags.
    pub async fn serialize_for_etag(
        &self,
        obj: &Object,
        node: NodeId,
    ) -> Result<Map<String, Value>, Error> {
        match self
            .serialize(obj.clone(), node, ExpandSet::empty(), Restrictions::default())
            .await?
        {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Internal("object did not serialize to a map".to_string())),
        }
    }

    pub fn serialize(
        &self,
        obj: Object,
        node: NodeId,
        expand: ExpandSet,
        restrictions: Restrictions,
    ) -> BoxFuture<'_, Result<Value, Error>> {
        self.serialize_in_branch(obj, node, expand, restrictions, Vec::new())
    }

    fn serialize_in_branch(
        &self,
        obj: Object,
        node: NodeId,
        expand: ExpandSet,
        restrictions: Restrictions,
        mut branch: Branch,
    ) -> BoxFuture<'_, Result<Value, Error>> {
        async move {
            let tree_node = self.tree.node(node);
            let resource = &tree_node.resource;
            let principal = &self.ctx.principal;
            let self_href = self.href_for(node, &obj)?;
            branch.push((node, self_href.clone()));

            let mut out = Map::new();
            for field in &resource.fields {
                if !restrictions.keeps_field(field.name()) {
                    continue;
                }
                let value = match field.evaluate(&obj, principal)? {
                    FieldValue::Value(v) => v,
                    FieldValue::Related(None) => Value::Null,
                    FieldValue::Related(Some(rel)) => {
                        self.related_value(field.name(), field.target(), rel, &expand, &branch)
                            .await?
                    }
                    FieldValue::RelatedList(list) => {
                        let mut values = Vec::with_capacity(list.len());
                        for rel in list {
                            values.push(
                                self.related_value(
                                    field.name(),
                                    field.target(),
                                    rel,
                                    &expand,
                                    &branch,
                                )
                                .await?,
                            );
                        }
                        Value::Array(values)
                    }
                };
                out.insert(field.name().to_string(), value);
            }

            let mut links = Map::new();
            links.insert(
                "self".to_string(),
                LinkEntry::new(self_href.clone(), HttpMethod::GET).to_value(),
            );
            if resource.handlers.update.is_some()
                && resource.permissions.can_modify(Some(&obj), principal)
            {
                links.insert(
                    "update".to_string(),
                    LinkEntry::new(self_href.clone(), HttpMethod::PUT).to_value(),
                );
            }
            if resource.handlers.delete.is_some()
                && resource.permissions.can_delete(Some(&obj), principal)
            {
                links.insert(
                    "delete".to_string(),
                    LinkEntry::new(self_href.clone(), HttpMethod::DELETE).to_value(),
                );
            }

            for child_id in &tree_node.children {
                let child = &self.tree.node(*child_id).resource;
                if !child.permissions.can_access(Some(&obj), principal) {
                    continue;
                }
                let link_name = child.link_name();
                let href = format!("{}{}/", self_href, child.uri_name());

                if expand.contains(link_name) && restrictions.keeps_field(link_name) {
                    let inner = expand.consume(link_name);
                    if let Some(value) = self
                        .expand_child(*child_id, &obj, node, inner, &branch)
                        .await?
                    {
                        out.insert(link_name.to_string(), value);
                        continue;
                    }
                }
                links.insert(
                    link_name.to_string(),
                    LinkEntry::new(href, HttpMethod::GET).to_value(),
                );
            }

            for extra in &resource.extra_links {
                if let Some(href) = (extra.href)(&obj, &self_href)? {
                    links.insert(
                        extra.name.clone(),
                        LinkEntry::new(href, extra.method).to_value(),
                    );
                }
            }

            let links: Map<String, Value> = links
                .into_iter()
                .filter(|(name, _)| restrictions.keeps_link(name))
                .collect();
            let omit_links = restrictions
                .only_links
                .as_ref()
                .is_some_and(HashSet::is_empty);
            if !omit_links {
                out.insert("links".to_string(), Value::Object(links));
            }

            Ok(Value::Object(out))
        }
        .boxed()
    }

    /// A related object: expanded in place, or a titled link.
    async fn related_value(
        &self,
        field: &str,
        target: Option<NodeId>,
        rel: Object,
        expand: &ExpandSet,
        branch: &Branch,
    ) -> Result<Value, Error> {
        let target = target.ok_or_else(|| {
            Error::Internal(format!("related field '{}' was never resolved", field))
        })?;
        let target_resource = &self.tree.node(target).resource;
        if !target_resource
            .permissions
            .allows(Operation::Access, Some(&rel), &self.ctx.principal)
        {
            return Ok(Value::Null);
        }

        let href = self.href_for(target, &rel)?;
        let seen = branch.iter().any(|(n, h)| *n == target && *h == href);
        if expand.contains(field) && !seen {
            return self
                .serialize_in_branch(
                    rel,
                    target,
                    expand.consume(field),
                    Restrictions::default(),
                    branch.clone(),
                )
                .await;
        }

        Ok(LinkEntry::new(href, HttpMethod::GET)
            .with_title(target_resource.title_of(&rel)?)
            .to_value())
    }

    /// Inline a child list (or singleton child) of `parent`.
    ///
    /// Returns `None` when the child cannot produce objects on its own.
    async fn expand_child(
        &self,
        child: NodeId,
        parent: &Object,
        parent_node: NodeId,
        expand: ExpandSet,
        branch: &Branch,
    ) -> Result<Option<Value>, Error> {
        let resource = &self.tree.node(child).resource;
        let parents = self.object_chain(parent_node, parent)?;
        let principal = self.ctx.principal.clone();

        if resource.singleton {
            let Some(lookup) = &resource.lookup else {
                return Ok(None);
            };
            let found = lookup(LookupContext {
                parents,
                key: String::new(),
                principal,
            })
            .await?;
            return match found {
                Some(obj) => self
                    .serialize_in_branch(obj, child, expand, Restrictions::default(), branch.clone())
                    .await
                    .map(Some),
                None => Ok(Some(Value::Null)),
            };
        }

        let Some(query) = &resource.query else {
            return Ok(None);
        };
        let collection = query(QueryContext {
            parents,
            query: HashMap::new(),
            principal,
        })
        .await?;
        let limit = resource
            .max_results_cap
            .unwrap_or(self.expansion_limit)
            .min(self.expansion_limit);
        let end = collection.count().await?.min(limit);
        let items = if end == 0 {
            Vec::new()
        } else {
            collection.slice(0, end).await?
        };

        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let href = self.href_for(child, &item)?;
            if branch.iter().any(|(n, h)| *n == child && *h == href) {
                values.push(LinkEntry::new(href, HttpMethod::GET).to_value());
                continue;
            }
            values.push(
                self.serialize_in_branch(
                    item,
                    child,
                    expand.clone(),
                    Restrictions::default(),
                    branch.clone(),
                )
                .await?,
            );
        }
        Ok(Some(Value::Array(values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Principal;
    use crate::collection::{Collection, VecCollection, object};
    use crate::permission::{AllowAll, PermissionFn};
    use crate::resource::{FieldDescriptor, HandlerOutput, LookupContext, Resource};
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Clone)]
    struct User {
        id: u32,
        name: String,
    }

    #[derive(Clone)]
    struct Item {
        id: u32,
        title: String,
        owner: Option<Arc<User>>,
        next: Option<u32>,
    }

    struct Comment {
        id: u32,
        item: Arc<Item>,
    }

    fn user_object(u: &Arc<User>) -> Object {
        u.clone()
    }

    fn build_tree() -> ResourceTree {
        let users = Resource::new("user")
            .with_field(FieldDescriptor::new("id", |u: &User| u.id))
            .with_field(FieldDescriptor::new("name", |u: &User| u.name.clone()))
            .with_title(|u: &User| u.name.clone());

        let comments = Resource::new("comment")
            .with_field(FieldDescriptor::new("id", |c: &Comment| c.id))
            .with_parent_key(|c: &Comment| Some(c.item.clone() as Object))
            .with_query(|ctx: QueryContext| async move {
                let item = ctx.parent::<Item>()?.clone();
                let item = Arc::new(item);
                let comments: Vec<Object> = (1..=3)
                    .map(|id| {
                        object(Comment {
                            id,
                            item: item.clone(),
                        })
                    })
                    .collect();
                Ok(Box::new(VecCollection::new(comments)) as Box<dyn Collection>)
            });

        let items = Resource::new("item")
            .with_field(FieldDescriptor::new("id", |i: &Item| i.id))
            .with_field(FieldDescriptor::new("title", |i: &Item| i.title.clone()))
            .with_field(FieldDescriptor::related("owner", "user", |i: &Item| {
                i.owner.as_ref().map(user_object)
            }))
            .with_related_link("next", HttpMethod::GET, |i: &Item, _href: &str| {
                i.next.map(|n| format!("/items/{}/", n))
            })
            .with_lookup(|_ctx: LookupContext| async { Ok(None) })
            .with_update(|_| async { Ok(HandlerOutput::NoContent) })
            .with_delete(|_| async { Ok(HandlerOutput::NoContent) })
            .with_permissions(PermissionFn::new().modify(|_, p| !p.is_anonymous()))
            .with_child(comments);

        ResourceTree::build(Resource::root("root").with_child(users).with_child(items)).unwrap()
    }

    fn sample_item() -> Object {
        object(Item {
            id: 42,
            title: "Widget".into(),
            owner: Some(Arc::new(User {
                id: 7,
                name: "ada".into(),
            })),
            next: Some(43),
        })
    }

    fn context(tree: &ResourceTree, principal: Principal) -> RequestContext {
        let route = tree.match_path("/items/42/").unwrap();
        let mut ctx = RequestContext::new(
            tree,
            HttpMethod::GET,
            "/items/42/",
            &route,
            principal,
            HashMap::new(),
        );
        ctx.resolved.push((tree.root().id, object(())));
        ctx.resolved.push((route.node, sample_item()));
        ctx
    }

    #[test]
    fn test_link_entry_value() {
        let link = LinkEntry::new("/items/1/", HttpMethod::DELETE);
        assert_eq!(link.to_value(), json!({"href": "/items/1/", "method": "DELETE"}));
        let titled = link.with_title(Some("One".into()));
        assert_eq!(titled.to_value()["title"], "One");
    }

    #[tokio::test]
    async fn test_fields_and_links() {
        let tree = build_tree();
        let ctx = context(&tree, Principal::Anonymous);
        let item = tree.find("item").unwrap().id;
        let value = Serializer::new(&tree, &ctx)
            .serialize_object(&sample_item(), item)
            .await
            .unwrap();

        assert_eq!(value["id"], 42);
        assert_eq!(value["title"], "Widget");
        assert_eq!(value["owner"]["href"], "/users/7/");
        assert_eq!(value["owner"]["title"], "ada");
        assert_eq!(value["links"]["self"]["href"], "/items/42/");
        assert_eq!(value["links"]["comments"]["href"], "/items/42/comments/");
        assert_eq!(value["links"]["next"]["href"], "/items/43/");
        // Anonymous callers cannot modify or delete.
        assert!(value["links"].get("update").is_none());
        assert!(value["links"].get("delete").is_none());
    }

    #[tokio::test]
    async fn test_mutation_links_follow_permissions() {
        let tree = build_tree();
        let ctx = context(&tree, Principal::user("1", "ada"));
        let item = tree.find("item").unwrap().id;
        let value = Serializer::new(&tree, &ctx)
            .serialize_object(&sample_item(), item)
            .await
            .unwrap();

        assert_eq!(value["links"]["update"]["method"], "PUT");
        // The permission set only grants modify.
        assert!(value["links"].get("delete").is_none());
    }

    #[tokio::test]
    async fn test_expand_related_and_child_list() {
        let tree = build_tree();
        let mut ctx = context(&tree, Principal::Anonymous);
        ctx.expand = ExpandSet::parse("owner,comments");
        let item = tree.find("item").unwrap().id;
        let value = Serializer::new(&tree, &ctx)
            .serialize_object(&sample_item(), item)
            .await
            .unwrap();

        assert_eq!(value["owner"]["name"], "ada");
        assert_eq!(value["owner"]["links"]["self"]["href"], "/users/7/");
        let comments = value["comments"].as_array().unwrap();
        assert_eq!(comments.len(), 3);
        assert_eq!(
            comments[0]["links"]["self"]["href"],
            "/items/42/comments/1/"
        );
        assert!(value["links"].get("comments").is_none());
    }

    #[tokio::test]
    async fn test_restrictions() {
        let tree = build_tree();
        let mut ctx = context(&tree, Principal::Anonymous);
        ctx.only_fields = Some(["title".to_string()].into_iter().collect());
        ctx.only_links = Some(HashSet::new());
        let item = tree.find("item").unwrap().id;
        let value = Serializer::new(&tree, &ctx)
            .serialize_object(&sample_item(), item)
            .await
            .unwrap();

        assert_eq!(value, json!({"title": "Widget"}));
    }

    #[tokio::test]
    async fn test_href_outside_request_path_uses_parent_key() {
        let tree = build_tree();
        let ctx = context(&tree, Principal::Anonymous);
        let comment = tree.find("comment").unwrap().id;
        let other = object(Comment {
            id: 5,
            item: Arc::new(Item {
                id: 99,
                title: "Other".into(),
                owner: None,
                next: None,
            }),
        });
        let href = Serializer::new(&tree, &ctx).href_for(comment, &other).unwrap();
        assert_eq!(href, "/items/99/comments/5/");
    }

    #[tokio::test]
    async fn test_site_url_prefix() {
        let tree = build_tree();
        let ctx = context(&tree, Principal::Anonymous);
        let item = tree.find("item").unwrap().id;
        let href = Serializer::new(&tree, &ctx)
            .with_site_url("https://example.com/")
            .href_for(item, &sample_item())
            .unwrap();
        assert_eq!(href, "https://example.com/items/42/");
    }

    #[derive(Clone)]
    struct Node {
        id: u32,
    }

    #[tokio::test]
    async fn test_self_reference_does_not_recurse() {
        let nodes = Resource::new("node")
            .with_field(FieldDescriptor::new("id", |n: &Node| n.id))
            .with_field(FieldDescriptor::related("me", "node", |n: &Node| {
                Some(object(n.clone()))
            }))
            .with_permissions(AllowAll);
        let tree = ResourceTree::build(Resource::root("root").with_child(nodes)).unwrap();
        let route = tree.match_path("/nodes/1/").unwrap();
        let mut ctx = RequestContext::new(
            &tree,
            HttpMethod::GET,
            "/nodes/1/",
            &route,
            Principal::Anonymous,
            HashMap::new(),
        );
        ctx.expand = ExpandSet::parse("me.me.me.me");

        let value = Serializer::new(&tree, &ctx)
            .serialize_object(&object(Node { id: 1 }), route.node)
            .await
            .unwrap();
        assert_eq!(value["me"]["href"], "/nodes/1/");
        assert!(value["me"].get("id").is_none());
    }
}
