//! Testing utilities for Trellis resource trees.
//!
//! - **TestApp** - build a tree and dispatcher in one step
//! - **TestClient** - drive a dispatcher in-process
//! - **MemoryStore** - shared in-memory lookup, query and removal closures
//! - **PermissionSpy** - record permission checks
//! - **Assertions** - status, header and envelope assertions
//!
//! ## Quick Start
//!
//! ```
//! use trellis_core::prelude::*;
//! use trellis_testing::*;
//!
//! #[derive(Clone)]
//! struct Note {
//!     id: u32,
//!     text: String,
//! }
//!
//! # tokio_test::block_on(async {
//! let notes = MemoryStore::new(|n: &Note| n.id.to_string()).with_items([Note {
//!     id: 1,
//!     text: "hello".to_string(),
//! }]);
//!
//! let app = TestAppBuilder::new()
//!     .with_resource(
//!         Resource::new("note")
//!             .with_field(FieldDescriptor::new("text", |n: &Note| n.text.clone()))
//!             .with_object_key(|n: &Note| n.id)
//!             .with_lookup(notes.lookup())
//!             .with_query(notes.query())
//!             .with_default_get()
//!             .with_default_list(),
//!     )
//!     .build();
//!
//! let response = app.client().get("/notes/1/").await;
//! assert_status(&response, 200);
//! assert_json_pointer(&response, "/note/text", &serde_json::json!("hello"));
//! assert_eq!(notes.method_call_count("lookup"), 1);
//! # });
//! ```

mod assertions;
mod mock;
mod test_app;
mod test_client;

pub use assertions::{
    assert_body_contains, assert_client_error, assert_content_type, assert_failure,
    assert_header, assert_http_status, assert_json_pointer, assert_no_header,
    assert_server_error, assert_stat, assert_status, assert_success,
};
pub use mock::{MemoryStore, PermissionSpy};
pub use test_app::{TestApp, TestAppBuilder};
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};

// Re-export common testing utilities
pub use tokio::test as tokio_test;
