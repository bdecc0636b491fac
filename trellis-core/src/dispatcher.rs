//! The per-request pipeline.
//!
//! [`Dispatcher::handle`] turns one parsed [`HttpRequest`] into exactly one
//! [`HttpResponse`]: route, resolve, select the handler, negotiate,
//! authorize, validate the client cache, run the handler and build the
//! envelope. Failures at any stage become a failure envelope; a panicking
//! handler becomes a generic 500.

use crate::collection::{Object, object};
use crate::conditional::{CacheCheck, CacheValidator, ConditionalHeaders};
use crate::config::DispatchConfig;
use crate::content_negotiation::{effective_accept, negotiate_pairs};
use crate::context::{
    EXPAND_PARAM, ExpandSet, ONLY_FIELDS_PARAM, ONLY_LINKS_PARAM, RequestContext, parse_name_list,
};
use crate::error::BuildError;
use crate::logging::{debug, error, info, request_span, warn};
use crate::pagination::{PageParams, page_links, paginate};
use crate::payload::{Format, item_envelope, list_envelope, raw_envelope};
use crate::permission::{self, Operation};
use crate::resource::{HandlerContext, HandlerOutput, LookupContext, Resource};
use crate::serializer::Serializer;
use crate::tree::ResourceTree;
use crate::{Error, HttpMethod, HttpRequest, HttpResponse, HttpStatus};
use futures_util::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Body field or query parameter that overrides a `POST`.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// Query parameter that replaces the `Accept` header.
pub const API_FORMAT_PARAM: &str = "api_format";

/// Routes requests through a [`ResourceTree`].
///
/// Cheap to clone; the tree is shared and never mutated.
#[derive(Clone)]
pub struct Dispatcher {
    tree: Arc<ResourceTree>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(tree: ResourceTree) -> Self {
        Self::with_config(tree, DispatchConfig::default())
    }

    pub fn with_config(tree: ResourceTree, config: DispatchConfig) -> Self {
        Self {
            tree: Arc::new(tree),
            config,
        }
    }

    /// Build the tree under `config.base_path` and wrap it.
    pub fn from_config(root: Resource, config: DispatchConfig) -> Result<Self, BuildError> {
        let tree = ResourceTree::build_with_base(root, &config.base_path)?;
        info!(
            resources = tree.len(),
            routes = tree.routes().len(),
            base_path = %config.base_path,
            "resource tree built"
        );
        Ok(Self::with_config(tree, config))
    }

    pub fn tree(&self) -> &Arc<ResourceTree> {
        &self.tree
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Handle one request. Never fails; errors become failure envelopes.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let start = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();
        let is_head = method.eq_ignore_ascii_case("HEAD");
        let span = request_span(&method, &path);

        let outcome = AssertUnwindSafe(self.process(request))
            .catch_unwind()
            .instrument(span)
            .await;

        let mut response = match outcome {
            Ok(response) => response,
            Err(panic) => {
                error!(
                    method = %method,
                    path = %path,
                    panic = %panic_message(panic.as_ref()),
                    "handler panicked"
                );
                Error::Internal("handler panicked".to_string()).into_response(Format::Json)
            }
        };
        if is_head {
            response.body.clear();
        }

        info!(
            method = %method,
            path = %path,
            status = response.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "request handled"
        );
        response
    }

    async fn process(&self, request: HttpRequest) -> HttpResponse {
        let mut format = Format::Json;

        match self.respond(&request, &mut format).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_server_error() {
                    error!(error = %err, "request failed");
                } else {
                    debug!(status = err.status_code(), error = %err, "request rejected");
                }
                err.into_response(format)
            }
        }
    }

    async fn respond(&self, request: &HttpRequest, format: &mut Format) -> Result<HttpResponse, Error> {
        let tree = self.tree.as_ref();

        let route = tree
            .match_path(&request.path)
            .ok_or_else(|| Error::NotFound(request.path.clone()))?;
        let node = tree.node(route.node);
        let resource = &node.resource;
        debug!(resource = %resource.name(), item = route.is_item, "route matched");

        let request_method =
            HttpMethod::from_str(&request.method).ok_or_else(|| Error::MethodNotAllowed {
                method: request.method.clone(),
                allowed: resource.allowed_methods(route.is_item),
            })?;

        let mut ctx = RequestContext::new(
            tree,
            request_method,
            request.path.clone(),
            &route,
            request.principal.clone(),
            request.query_params.clone(),
        );
        self.resolve(&mut ctx).await?;

        let mut fields = if request_method.is_safe() || request.body.is_empty() {
            Map::new()
        } else {
            request.form_fields()?
        };
        let method = effective_method(request_method, &fields, &ctx.query)?;
        fields.remove(METHOD_OVERRIDE_FIELD);
        ctx.method = method;

        let handler = resource
            .handler_for(method, route.is_item)
            .cloned()
            .ok_or_else(|| Error::MethodNotAllowed {
                method: method.as_str().to_string(),
                allowed: resource.allowed_methods(route.is_item),
            })?;

        let accept = effective_accept(
            ctx.query.get(API_FORMAT_PARAM).map(String::as_str),
            request.header("Accept"),
        )?;
        let is_list = !route.is_item && method.is_safe();
        let negotiated = negotiate_pairs(
            accept.as_deref(),
            &node.mimetypes,
            is_list,
            self.config.tie_break,
        )?;
        *format = negotiated.format;
        debug!(content_type = %negotiated.content_type.mime_type(), "mimetype negotiated");
        ctx.negotiated = Some(negotiated.clone());

        self.authorize(&ctx)?;

        let cap = resource
            .max_results_cap
            .unwrap_or(self.config.max_results_cap)
            .min(self.config.max_results_cap);
        ctx.expand = request_param(&ctx.query, &fields, EXPAND_PARAM, "expand")
            .map(|raw| ExpandSet::parse(&raw))
            .unwrap_or_default();
        ctx.only_fields =
            request_param(&ctx.query, &fields, ONLY_FIELDS_PARAM, "only_fields").map(|v| parse_name_list(&v));
        ctx.only_links =
            request_param(&ctx.query, &fields, ONLY_LINKS_PARAM, "only_links").map(|v| parse_name_list(&v));
        ctx.page = PageParams::from_query(&ctx.query, self.config.default_max_results.min(cap), cap);

        let serializer = Serializer::new(tree, &ctx)
            .with_site_url(self.config.site_url.clone())
            .with_expansion_limit(self.config.default_max_results);

        let mut cache = CacheCheck::default();
        if route.is_item && method.is_safe() && !resource.cache.is_none() {
            if let Some(item) = ctx.item() {
                let payload = if resource.cache.needs_payload() {
                    Some(serializer.serialize_for_etag(item, ctx.node).await?)
                } else {
                    None
                };
                cache = CacheValidator::new(&resource.cache).check(
                    item,
                    &ConditionalHeaders::from_request(request),
                    payload.as_ref(),
                )?;
                if cache.use_cached {
                    debug!(resource = %resource.name(), "client copy is current");
                    let response = HttpResponse::new(HttpStatus::NotModified.code())
                        .with_header("Vary", "Accept");
                    return Ok(cache.apply_headers(response));
                }
            }
        }

        let handler_ctx = HandlerContext {
            method,
            parents: ctx.parents(),
            item: ctx.item().cloned(),
            query: ctx.query.clone(),
            fields,
            body: request.body.clone(),
            principal: ctx.principal.clone(),
            query_fn: resource.query.clone(),
        };
        let output = handler(handler_ctx).await.inspect_err(|err| {
            if !err.is_server_error() {
                warn!(resource = %resource.name(), error = %err, "handler failed");
            }
        })?;

        let mut location = None;
        let (status, payload) = match output {
            HandlerOutput::Item(obj) => {
                let value = serializer.serialize_object(&obj, ctx.node).await?;
                let payload = if resource.is_root() {
                    self.root_payload(value)
                } else {
                    item_envelope(resource.name(), value)
                };
                (HttpStatus::Ok, Some(payload))
            }
            HandlerOutput::Created(obj) => {
                location = Some(serializer.href_for(ctx.node, &obj)?);
                let value = serializer.serialize_object(&obj, ctx.node).await?;
                (HttpStatus::Created, Some(item_envelope(resource.name(), value)))
            }
            HandlerOutput::List(collection) => {
                let page = paginate(
                    collection.as_ref(),
                    ctx.page.start,
                    ctx.page.max_results,
                    cap,
                )
                .await?;
                let mut items = Vec::with_capacity(page.items.len());
                for item in &page.items {
                    items.push(serializer.serialize_object(item, ctx.node).await?);
                }
                let links = page_links(&serializer.request_href(), &ctx.query, &page.window)?;
                (
                    HttpStatus::Ok,
                    Some(list_envelope(
                        resource.name_plural(),
                        items,
                        page.total_count,
                        links,
                    )),
                )
            }
            HandlerOutput::NoContent => (HttpStatus::NoContent, None),
            HandlerOutput::Payload { status, body } => (status, Some(raw_envelope(body))),
        };

        let mut response = HttpResponse::new(status.code()).with_header("Vary", "Accept");
        if let Some(payload) = payload.filter(|_| !status.forbids_body()) {
            response = response
                .with_header("Content-Type", negotiated.content_type.to_header_value())
                .with_body(negotiated.format.encode(&payload)?);
            if let Some(item_type) = &negotiated.item_content_type {
                response = response.with_header("Item-Content-Type", item_type.to_header_value());
            }
        }
        if let Some(location) = location {
            response = response.with_header("Location", location);
        }
        if status == HttpStatus::Ok {
            response = cache.apply_headers(response);
        }
        Ok(response)
    }

    /// Resolve one object per level, root first. A miss stops the walk.
    async fn resolve(&self, ctx: &mut RequestContext) -> Result<(), Error> {
        for id in self.tree.chain(ctx.node) {
            if id == ctx.node && !ctx.is_item {
                break;
            }
            let resource = &self.tree.node(id).resource;
            let parents: Vec<Object> = ctx.resolved.iter().map(|(_, o)| o.clone()).collect();

            let (key, lookup) = if resource.singleton {
                match &resource.lookup {
                    Some(lookup) => (String::new(), lookup),
                    None => {
                        ctx.resolved.push((id, object(())));
                        continue;
                    }
                }
            } else {
                let key = ctx.capture_for(id).map(str::to_string).ok_or_else(|| {
                    Error::Internal(format!("no URL value captured for '{}'", resource.name()))
                })?;
                let lookup = resource.lookup.as_ref().ok_or_else(|| {
                    Error::Internal(format!("resource '{}' has no lookup", resource.name()))
                })?;
                (key, lookup)
            };

            let found = lookup(LookupContext {
                parents,
                key: key.clone(),
                principal: ctx.principal.clone(),
            })
            .await?;
            let Some(obj) = found else {
                debug!(resource = %resource.name(), key = %key, "object not found");
                return Err(Error::NotFound(format!("{} '{}'", resource.name(), key)));
            };
            ctx.resolved.push((id, obj));
        }
        Ok(())
    }

    /// Ancestors need access; the target needs the method's operation.
    fn authorize(&self, ctx: &RequestContext) -> Result<(), Error> {
        for (id, obj) in &ctx.resolved {
            if *id == ctx.node {
                continue;
            }
            let resource = &self.tree.node(*id).resource;
            permission::check(
                resource.permissions.as_ref(),
                Operation::Access,
                Some(obj),
                &ctx.principal,
                resource.name(),
            )?;
        }

        let resource = &self.tree.node(ctx.node).resource;
        let target = if ctx.is_item {
            ctx.item()
        } else {
            ctx.nearest_parent()
        };
        permission::check(
            resource.permissions.as_ref(),
            Operation::for_method(ctx.method),
            target,
            &ctx.principal,
            resource.name(),
        )
    }

    fn root_payload(&self, value: Value) -> Value {
        let mut payload = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        if self.config.expose_uri_templates {
            let site_url = self.config.site_url.trim_end_matches('/');
            let templates: Map<String, Value> = self
                .tree
                .uri_templates()
                .into_iter()
                .map(|(name, template)| (name, Value::String(format!("{}{}", site_url, template))))
                .collect();
            payload.insert("uri_templates".to_string(), Value::Object(templates));
        }
        raw_envelope(Value::Object(payload))
    }
}

/// Apply `_method` to a `POST`.
fn effective_method(
    method: HttpMethod,
    fields: &Map<String, Value>,
    query: &HashMap<String, String>,
) -> Result<HttpMethod, Error> {
    if method != HttpMethod::POST {
        return Ok(method);
    }
    let requested = fields
        .get(METHOD_OVERRIDE_FIELD)
        .and_then(Value::as_str)
        .or_else(|| query.get(METHOD_OVERRIDE_FIELD).map(String::as_str));

    match requested {
        None => Ok(method),
        Some(value) => match HttpMethod::from_str(value) {
            Some(m @ (HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH | HttpMethod::DELETE)) => {
                Ok(m)
            }
            _ => Err(Error::InvalidAttribute(format!(
                "{} cannot be '{}'",
                METHOD_OVERRIDE_FIELD, value
            ))),
        },
    }
}

/// A query parameter, else a string body field.
fn request_param(
    query: &HashMap<String, String>,
    fields: &Map<String, Value>,
    query_name: &str,
    field_name: &str,
) -> Option<String> {
    query
        .get(query_name)
        .cloned()
        .or_else(|| fields.get(field_name).and_then(Value::as_str).map(str::to_string))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
