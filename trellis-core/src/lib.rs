// Core library for the Trellis resource framework
// Resource declarations, the resource tree, and the per-request dispatch pipeline

pub mod collection;
pub mod conditional;
pub mod config;
pub mod content_negotiation;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod logging;
pub mod pagination;
pub mod payload;
pub mod permission;
pub mod resource;
pub mod serializer;
pub mod status;
pub mod tree;

// Re-export commonly used types
pub use collection::{Collection, Object, VecCollection, downcast, object};
pub use conditional::{CachePolicy, ETag};
pub use config::DispatchConfig;
pub use content_negotiation::{MediaType, TieBreak};
pub use dispatcher::Dispatcher;
pub use error::*;
pub use http::*;
pub use permission::{AllowAll, AuthenticatedCanModify, DefaultPermissions, PermissionFn, Permissions};
pub use resource::{
    FieldDescriptor, HandlerContext, HandlerOutput, LookupContext, QueryContext, Resource,
};
pub use serializer::LinkEntry;
pub use status::*;
pub use tree::{NodeId, ResourceTree};

/// Everything needed to declare resources and serve them.
pub mod prelude {
    pub use crate::collection::{Collection, Object, VecCollection, downcast, object};
    pub use crate::conditional::CachePolicy;
    pub use crate::config::DispatchConfig;
    pub use crate::dispatcher::Dispatcher;
    pub use crate::error::{BuildError, Error};
    pub use crate::http::{HttpMethod, HttpRequest, HttpResponse, Principal};
    pub use crate::permission::{
        AllowAll, AuthenticatedCanModify, DefaultPermissions, PermissionFn, Permissions,
    };
    pub use crate::resource::{
        FieldDescriptor, HandlerContext, HandlerOutput, LookupContext, QueryContext, Resource,
    };
    pub use crate::status::HttpStatus;
    pub use crate::tree::ResourceTree;
    pub use async_trait::async_trait;
}
