//! Resource declarations.
//!
//! A [`Resource`] describes one kind of addressable object: its exposed
//! fields, how objects are found, which handlers exist, who may use them and
//! how responses are validated for caching. Resources nest through
//! [`Resource::with_child`] and are assembled into an immutable
//! [`ResourceTree`](crate::tree::ResourceTree) once at startup.
//!
//! ```
//! use trellis_core::prelude::*;
//!
//! #[derive(Clone)]
//! struct Item {
//!     id: u64,
//!     name: String,
//! }
//!
//! let items = Resource::new("item")
//!     .with_field(FieldDescriptor::new("id", |i: &Item| i.id))
//!     .with_field(FieldDescriptor::new("name", |i: &Item| i.name.clone()))
//!     .with_object_key(|i: &Item| i.id)
//!     .with_lookup(|ctx: LookupContext| async move {
//!         let id: u64 = ctx.key.parse().map_err(|_| Error::NotFound(ctx.key.clone()))?;
//!         Ok(Some(object(Item { id, name: "Widget".into() })))
//!     })
//!     .with_default_get();
//!
//! assert_eq!(items.uri_name(), "items");
//! assert_eq!(items.object_key_name(), "item_id");
//! ```

use crate::collection::{Collection, Object, downcast, object};
use crate::conditional::CachePolicy;
use crate::permission::{DefaultPermissions, Permissions};
use crate::tree::NodeId;
use crate::{Error, HttpMethod, HttpStatus, Principal};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

// ============================================================================
// Collaborators
// ============================================================================

/// Resolves one object from its URL key.
pub type LookupFn =
    Arc<dyn Fn(LookupContext) -> BoxFuture<'static, Result<Option<Object>, Error>> + Send + Sync>;

/// Produces the collection behind a list URL.
pub type QueryFn = Arc<
    dyn Fn(QueryContext) -> BoxFuture<'static, Result<Box<dyn Collection>, Error>> + Send + Sync,
>;

/// Implements one HTTP operation of a resource.
pub type HandlerFn =
    Arc<dyn Fn(HandlerContext) -> BoxFuture<'static, Result<HandlerOutput, Error>> + Send + Sync>;

/// Renders the value captured in an object's URL.
pub type ObjectKeyFn = Arc<dyn Fn(&Object) -> Result<String, Error> + Send + Sync>;

/// Returns the parent domain object of an object.
pub type ParentKeyFn = Arc<dyn Fn(&Object) -> Result<Option<Object>, Error> + Send + Sync>;

/// Computes an extra link from an object and its own href.
pub type LinkFn = Arc<dyn Fn(&Object, &str) -> Result<Option<String>, Error> + Send + Sync>;

type TitleFn = Arc<dyn Fn(&Object) -> Result<String, Error> + Send + Sync>;

fn nearest<T: Any>(parents: &[Object]) -> Result<&T, Error> {
    parents
        .iter()
        .rev()
        .find_map(|p| p.downcast_ref::<T>())
        .ok_or_else(|| {
            Error::Internal(format!(
                "no parent of type {} was resolved",
                std::any::type_name::<T>()
            ))
        })
}

/// Input of a [`LookupFn`].
#[derive(Clone)]
pub struct LookupContext {
    /// Objects resolved above this one, root first.
    pub parents: Vec<Object>,
    /// Percent-decoded URL value; empty for singletons.
    pub key: String,
    pub principal: Principal,
}

impl LookupContext {
    /// Nearest resolved ancestor of type `T`.
    pub fn parent<T: Any>(&self) -> Result<&T, Error> {
        nearest(&self.parents)
    }
}

/// Input of a [`QueryFn`].
#[derive(Clone)]
pub struct QueryContext {
    pub parents: Vec<Object>,
    pub query: HashMap<String, String>,
    pub principal: Principal,
}

impl QueryContext {
    pub fn parent<T: Any>(&self) -> Result<&T, Error> {
        nearest(&self.parents)
    }
}

/// Input of a [`HandlerFn`].
#[derive(Clone)]
pub struct HandlerContext {
    /// Effective method after `_method` remapping.
    pub method: HttpMethod,
    /// Objects resolved above the target, root first.
    pub parents: Vec<Object>,
    /// The addressed object for item operations.
    pub item: Option<Object>,
    pub query: HashMap<String, String>,
    /// Decoded form or JSON body fields.
    pub fields: Map<String, Value>,
    pub body: Vec<u8>,
    pub principal: Principal,
    pub(crate) query_fn: Option<QueryFn>,
}

impl HandlerContext {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            parents: Vec::new(),
            item: None,
            query: HashMap::new(),
            fields: Map::new(),
            body: Vec::new(),
            principal: Principal::Anonymous,
            query_fn: None,
        }
    }

    pub fn parent<T: Any>(&self) -> Result<&T, Error> {
        nearest(&self.parents)
    }

    /// The addressed object, downcast.
    pub fn item_as<T: Any>(&self) -> Result<&T, Error> {
        let item = self
            .item
            .as_ref()
            .ok_or_else(|| Error::Internal("operation has no target object".to_string()))?;
        downcast(item)
    }

    /// A body field that must be present and non-empty.
    pub fn require_field(&self, name: &str) -> Result<&Value, Error> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Err(Error::MissingAttribute(name.to_string())),
            Some(Value::String(s)) if s.is_empty() => Err(Error::MissingAttribute(name.to_string())),
            Some(value) => Ok(value),
        }
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Run the resource's query collaborator for these parents.
    pub async fn query_collection(&self) -> Result<Box<dyn Collection>, Error> {
        let query_fn = self
            .query_fn
            .as_ref()
            .ok_or_else(|| Error::Internal("resource has no query collaborator".to_string()))?;
        query_fn(QueryContext {
            parents: self.parents.clone(),
            query: self.query.clone(),
            principal: self.principal.clone(),
        })
        .await
    }
}

/// What a handler produced.
pub enum HandlerOutput {
    /// An object of this resource, serialized with status 200.
    Item(Object),
    /// A new object, serialized with status 201 and a `Location` header.
    Created(Object),
    /// A collection, paginated.
    List(Box<dyn Collection>),
    /// Status 204 with an empty body.
    NoContent,
    /// A literal payload, wrapped in the `stat` envelope.
    Payload { status: HttpStatus, body: Value },
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOutput::Item(_) => f.write_str("Item(..)"),
            HandlerOutput::Created(_) => f.write_str("Created(..)"),
            HandlerOutput::List(_) => f.write_str("List(..)"),
            HandlerOutput::NoContent => f.write_str("NoContent"),
            HandlerOutput::Payload { status, .. } => write!(f, "Payload({})", status),
        }
    }
}

// ============================================================================
// Fields
// ============================================================================

type ValueFn = Arc<dyn Fn(&Object, &Principal) -> Result<Value, Error> + Send + Sync>;
type RelatedFn = Arc<dyn Fn(&Object) -> Result<Option<Object>, Error> + Send + Sync>;
type RelatedListFn = Arc<dyn Fn(&Object) -> Result<Vec<Object>, Error> + Send + Sync>;

#[derive(Clone)]
enum FieldKind {
    Value(ValueFn),
    Related { resource: String, accessor: RelatedFn },
    RelatedList { resource: String, accessor: RelatedListFn },
}

/// Value of one field for one object.
pub enum FieldValue {
    Value(Value),
    Related(Option<Object>),
    RelatedList(Vec<Object>),
}

/// One exposed attribute of a resource.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    description: Option<String>,
    kind: FieldKind,
    pub(crate) target: Option<NodeId>,
}

impl FieldDescriptor {
    /// Plain field read through a typed accessor.
    pub fn new<T, V, F>(name: impl Into<String>, accessor: F) -> Self
    where
        T: Any + Send + Sync,
        V: Serialize,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let kind = FieldKind::Value(Arc::new(move |obj: &Object, _: &Principal| {
            let value = accessor(downcast::<T>(obj)?);
            Ok(serde_json::to_value(value)?)
        }));
        Self::with_kind(name, kind)
    }

    /// Link to a single object of another resource, expandable by name.
    pub fn related<T, F>(name: impl Into<String>, resource: impl Into<String>, accessor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Option<Object> + Send + Sync + 'static,
    {
        let kind = FieldKind::Related {
            resource: resource.into(),
            accessor: Arc::new(move |obj: &Object| Ok(accessor(downcast::<T>(obj)?))),
        };
        Self::with_kind(name, kind)
    }

    /// Links to several objects of another resource.
    pub fn related_list<T, F>(
        name: impl Into<String>,
        resource: impl Into<String>,
        accessor: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Vec<Object> + Send + Sync + 'static,
    {
        let kind = FieldKind::RelatedList {
            resource: resource.into(),
            accessor: Arc::new(move |obj: &Object| Ok(accessor(downcast::<T>(obj)?))),
        };
        Self::with_kind(name, kind)
    }

    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            target: None,
        }
    }

    /// Replace the accessor with a custom serializer that sees the caller.
    pub fn with_serializer<T, F>(mut self, serializer: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &Principal) -> Value + Send + Sync + 'static,
    {
        self.kind = FieldKind::Value(Arc::new(move |obj: &Object, principal: &Principal| {
            Ok(serializer(downcast::<T>(obj)?, principal))
        }));
        self.target = None;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Name of the resource this field links to, if any.
    pub fn related_resource(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Value(_) => None,
            FieldKind::Related { resource, .. } | FieldKind::RelatedList { resource, .. } => {
                Some(resource)
            }
        }
    }

    /// Node of the related resource, resolved when the tree is built.
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn evaluate(&self, obj: &Object, principal: &Principal) -> Result<FieldValue, Error> {
        match &self.kind {
            FieldKind::Value(f) => f(obj, principal).map(FieldValue::Value),
            FieldKind::Related { accessor, .. } => accessor(obj).map(FieldValue::Related),
            FieldKind::RelatedList { accessor, .. } => accessor(obj).map(FieldValue::RelatedList),
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("related", &self.related_resource())
            .finish()
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Extra link published on every object of a resource.
#[derive(Clone)]
pub struct ExtraLink {
    pub name: String,
    pub method: HttpMethod,
    pub(crate) href: LinkFn,
}

/// The five handler slots of a resource.
#[derive(Clone, Default)]
pub struct HandlerSlots {
    pub list: Option<HandlerFn>,
    pub get: Option<HandlerFn>,
    pub create: Option<HandlerFn>,
    pub update: Option<HandlerFn>,
    pub delete: Option<HandlerFn>,
}

fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HandlerOutput, Error>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Declarative description of one kind of addressable object.
#[derive(Clone)]
pub struct Resource {
    pub(crate) name: String,
    pub(crate) name_plural: String,
    uri_name: Option<String>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) vendor: Option<String>,
    pub(crate) cache: CachePolicy,
    pub(crate) object_key_name: String,
    object_key: Option<ObjectKeyFn>,
    pub(crate) parent_key: Option<ParentKeyFn>,
    title: Option<TitleFn>,
    pub(crate) children: Vec<Resource>,
    pub(crate) singleton: bool,
    pub(crate) root: bool,
    pub(crate) permissions: Arc<dyn Permissions>,
    pub(crate) lookup: Option<LookupFn>,
    pub(crate) query: Option<QueryFn>,
    pub(crate) handlers: HandlerSlots,
    pub(crate) default_list: bool,
    pub(crate) extra_links: Vec<ExtraLink>,
    pub(crate) max_results_cap: Option<usize>,
}

impl Resource {
    /// A list/item resource. The plural defaults to `<name>s` and the URL
    /// capture key to `<name>_id`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name_plural: format!("{}s", name),
            object_key_name: format!("{}_id", name),
            name,
            uri_name: None,
            fields: Vec::new(),
            vendor: None,
            cache: CachePolicy::None,
            object_key: None,
            parent_key: None,
            title: None,
            children: Vec::new(),
            singleton: false,
            root: false,
            permissions: Arc::new(DefaultPermissions),
            lookup: None,
            query: None,
            handlers: HandlerSlots::default(),
            default_list: false,
            extra_links: Vec::new(),
            max_results_cap: None,
        }
    }

    /// The root of an API: a singleton mounted directly at the base path,
    /// whose payload links to every child and lists the URI templates.
    pub fn root(name: impl Into<String>) -> Self {
        let mut resource = Self::new(name).singleton().with_uri_name("");
        resource.root = true;
        resource.handlers.get = Some(handler(|ctx: HandlerContext| async move {
            Ok(HandlerOutput::Item(ctx.item.unwrap_or_else(|| object(()))))
        }));
        resource
    }

    /// Item semantics at a literal URL, without a capture.
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn with_plural(mut self, name_plural: impl Into<String>) -> Self {
        self.name_plural = name_plural.into();
        self
    }

    /// Override the URL segment.
    pub fn with_uri_name(mut self, uri_name: impl Into<String>) -> Self {
        self.uri_name = Some(uri_name.into());
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache = policy;
        self
    }

    /// Rename the URL capture key.
    pub fn with_object_key_name(mut self, key: impl Into<String>) -> Self {
        self.object_key_name = key.into();
        self
    }

    /// Value rendered into hrefs for an object. Defaults to the `id` field.
    pub fn with_object_key<T, K, F>(mut self, accessor: F) -> Self
    where
        T: Any + Send + Sync,
        K: fmt::Display,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.object_key = Some(Arc::new(move |obj: &Object| {
            Ok(accessor(downcast::<T>(obj)?).to_string())
        }));
        self
    }

    /// Parent object of an object, used to build hrefs outside the request path.
    pub fn with_parent_key<T, F>(mut self, accessor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Option<Object> + Send + Sync + 'static,
    {
        self.parent_key = Some(Arc::new(move |obj: &Object| {
            Ok(accessor(downcast::<T>(obj)?))
        }));
        self
    }

    /// Title attached to links pointing at objects of this resource.
    pub fn with_title<T, F>(mut self, accessor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.title = Some(Arc::new(move |obj: &Object| Ok(accessor(downcast::<T>(obj)?))));
        self
    }

    pub fn with_permissions<P: Permissions + 'static>(mut self, permissions: P) -> Self {
        self.permissions = Arc::new(permissions);
        self
    }

    pub fn with_lookup<F, Fut>(mut self, lookup: F) -> Self
    where
        F: Fn(LookupContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Object>, Error>> + Send + 'static,
    {
        self.lookup = Some(Arc::new(move |ctx| lookup(ctx).boxed()));
        self
    }

    pub fn with_query<F, Fut>(mut self, query: F) -> Self
    where
        F: Fn(QueryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn Collection>, Error>> + Send + 'static,
    {
        self.query = Some(Arc::new(move |ctx| query(ctx).boxed()));
        self
    }

    pub fn with_list<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutput, Error>> + Send + 'static,
    {
        self.handlers.list = Some(handler(f));
        self.default_list = false;
        self
    }

    pub fn with_get<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutput, Error>> + Send + 'static,
    {
        self.handlers.get = Some(handler(f));
        self
    }

    pub fn with_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutput, Error>> + Send + 'static,
    {
        self.handlers.create = Some(handler(f));
        self
    }

    pub fn with_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutput, Error>> + Send + 'static,
    {
        self.handlers.update = Some(handler(f));
        self
    }

    pub fn with_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutput, Error>> + Send + 'static,
    {
        self.handlers.delete = Some(handler(f));
        self
    }

    /// `get` returns the resolved object unchanged.
    pub fn with_default_get(mut self) -> Self {
        self.handlers.get = Some(handler(|ctx: HandlerContext| async move {
            ctx.item
                .map(HandlerOutput::Item)
                .ok_or_else(|| Error::NotFound("object".to_string()))
        }));
        self
    }

    /// `list` returns the query collaborator's collection.
    pub fn with_default_list(mut self) -> Self {
        self.handlers.list = Some(handler(|ctx: HandlerContext| async move {
            ctx.query_collection().await.map(HandlerOutput::List)
        }));
        self.default_list = true;
        self
    }

    /// `delete` hands the resolved object to `remove` and answers 204.
    pub fn with_default_delete<F, Fut>(mut self, remove: F) -> Self
    where
        F: Fn(Object) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let remove = Arc::new(remove);
        self.handlers.delete = Some(handler(move |ctx: HandlerContext| {
            let remove = Arc::clone(&remove);
            async move {
                let item = ctx
                    .item
                    .ok_or_else(|| Error::NotFound("object".to_string()))?;
                remove(item).await?;
                Ok(HandlerOutput::NoContent)
            }
        }));
        self
    }

    pub fn with_child(mut self, child: Resource) -> Self {
        self.children.push(child);
        self
    }

    /// Publish an additional link, computed from the object and its href.
    pub fn with_related_link<T, F>(
        mut self,
        name: impl Into<String>,
        method: HttpMethod,
        href: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.extra_links.push(ExtraLink {
            name: name.into(),
            method,
            href: Arc::new(move |obj: &Object, self_href: &str| {
                Ok(href(downcast::<T>(obj)?, self_href))
            }),
        });
        self
    }

    /// Per-resource page size ceiling.
    pub fn with_max_results_cap(mut self, cap: usize) -> Self {
        self.max_results_cap = Some(cap);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_plural(&self) -> &str {
        &self.name_plural
    }

    pub fn object_key_name(&self) -> &str {
        &self.object_key_name
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn cache_policy(&self) -> &CachePolicy {
        &self.cache
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// URL segment: explicit, else `name` for singletons, else the plural
    /// with `_` replaced by `-`.
    pub fn uri_name(&self) -> String {
        match &self.uri_name {
            Some(uri_name) => uri_name.clone(),
            None if self.singleton => self.name.clone(),
            None => self.name_plural.replace('_', "-"),
        }
    }

    /// Name of the link or expansion pointing at this resource from its parent.
    pub fn link_name(&self) -> &str {
        if self.singleton {
            &self.name
        } else {
            &self.name_plural
        }
    }

    /// Handler for a method on an item or list URL.
    pub fn handler_for(&self, method: HttpMethod, is_item: bool) -> Option<&HandlerFn> {
        let slots = &self.handlers;
        match (method, is_item) {
            (HttpMethod::GET | HttpMethod::HEAD, true) => slots.get.as_ref(),
            (HttpMethod::GET | HttpMethod::HEAD, false) => slots.list.as_ref(),
            (HttpMethod::POST, false) => slots.create.as_ref(),
            (HttpMethod::PUT | HttpMethod::PATCH, true) => slots.update.as_ref(),
            (HttpMethod::DELETE, true) => slots.delete.as_ref(),
            _ => None,
        }
    }

    /// Methods with a populated slot, for the `Allow` header.
    pub fn allowed_methods(&self, is_item: bool) -> Vec<HttpMethod> {
        [
            HttpMethod::GET,
            HttpMethod::HEAD,
            HttpMethod::POST,
            HttpMethod::PUT,
            HttpMethod::PATCH,
            HttpMethod::DELETE,
        ]
        .into_iter()
        .filter(|m| self.handler_for(*m, is_item).is_some())
        .collect()
    }

    /// Whether objects can be keyed, by accessor or by an `id` value field.
    pub(crate) fn has_object_key(&self) -> bool {
        self.object_key.is_some()
            || self
                .fields
                .iter()
                .any(|f| f.name == "id" && f.related_resource().is_none())
    }

    /// Rendered URL key of an object.
    pub fn object_key_of(&self, obj: &Object) -> Result<String, Error> {
        if let Some(accessor) = &self.object_key {
            return accessor(obj);
        }

        let id_field = self
            .fields
            .iter()
            .find(|f| f.name == "id")
            .ok_or_else(|| {
                Error::Internal(format!("resource '{}' has no object key", self.name))
            })?;
        match id_field.evaluate(obj, &Principal::Anonymous)? {
            FieldValue::Value(Value::String(s)) => Ok(s),
            FieldValue::Value(Value::Null) => Err(Error::Internal(format!(
                "object of resource '{}' has a null id",
                self.name
            ))),
            FieldValue::Value(other) => Ok(other.to_string()),
            _ => Err(Error::Internal(format!(
                "id field of resource '{}' is a link",
                self.name
            ))),
        }
    }

    pub fn title_of(&self, obj: &Object) -> Result<Option<String>, Error> {
        self.title.as_ref().map(|f| f(obj)).transpose()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("name_plural", &self.name_plural)
            .field("singleton", &self.singleton)
            .field("fields", &self.fields)
            .field("cache", &self.cache)
            .field("children", &self.children)
            .finish()
    }
}
