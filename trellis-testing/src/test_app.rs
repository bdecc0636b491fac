// Test application builder

use crate::TestClient;
use trellis_core::{BuildError, DispatchConfig, Dispatcher, Principal, Resource};

/// A built resource tree ready to take requests
pub struct TestApp {
    dispatcher: Dispatcher,
}

impl TestApp {
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Create an anonymous test client
    pub fn client(&self) -> TestClient {
        TestClient::new(self.dispatcher.clone())
    }

    /// Create a test client acting as `principal`
    pub fn client_as(&self, principal: Principal) -> TestClient {
        self.client().as_principal(principal)
    }
}

/// Builder for test applications
pub struct TestAppBuilder {
    root: Resource,
    config: DispatchConfig,
}

impl TestAppBuilder {
    /// Start from an empty root resource named `root`
    pub fn new() -> Self {
        Self {
            root: Resource::root("root"),
            config: DispatchConfig::default(),
        }
    }

    /// Replace the root resource
    pub fn with_root(self, root: Resource) -> Self {
        Self { root, ..self }
    }

    /// Add a top-level resource under the root
    pub fn with_resource(self, resource: Resource) -> Self {
        Self {
            root: self.root.with_child(resource),
            ..self
        }
    }

    /// Set the dispatch configuration
    pub fn with_config(self, config: DispatchConfig) -> Self {
        Self { config, ..self }
    }

    /// Build the tree and dispatcher
    pub fn try_build(self) -> Result<TestApp, BuildError> {
        Ok(TestApp {
            dispatcher: Dispatcher::from_config(self.root, self.config)?,
        })
    }

    /// Build the test application, panicking on an invalid tree
    pub fn build(self) -> TestApp {
        match self.try_build() {
            Ok(app) => app,
            Err(err) => panic!("invalid resource tree: {}", err),
        }
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use trellis_core::FieldDescriptor;

    #[derive(Clone)]
    struct Note {
        id: u32,
        text: String,
    }

    fn note_resource(notes: &MemoryStore<Note>) -> Resource {
        Resource::new("note")
            .with_field(FieldDescriptor::new("text", |n: &Note| n.text.clone()))
            .with_lookup(notes.lookup())
            .with_query(notes.query())
            .with_default_get()
            .with_default_list()
    }

    #[test]
    fn test_app_creation() {
        let app = TestAppBuilder::new()
            .with_resource(Resource::new("item"))
            .build();
        assert!(app.dispatcher().tree().find("item").is_some());
    }

    #[test]
    fn test_duplicate_sibling_is_reported() {
        let result = TestAppBuilder::new()
            .with_resource(Resource::new("item"))
            .with_resource(Resource::new("item"))
            .try_build();
        assert!(matches!(result, Err(BuildError::DuplicateSibling { .. })));
    }

    #[tokio::test]
    async fn test_unkeyed_resource_is_rejected_before_serving() {
        let notes = MemoryStore::new(|n: &Note| n.id.to_string()).with_items([Note {
            id: 1,
            text: "hello".to_string(),
        }]);

        let result = TestAppBuilder::new()
            .with_resource(note_resource(&notes))
            .try_build();
        assert!(matches!(result, Err(BuildError::MissingObjectKey { .. })));

        let app = TestAppBuilder::new()
            .with_resource(note_resource(&notes).with_object_key(|n: &Note| n.id))
            .build();
        let response = app.client().get("/notes/1/").await;
        assert_eq!(response.status(), 200);
        let response = app.client().get("/notes/").await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_root_is_served() {
        let app = TestAppBuilder::new().build();
        let response = app.client().get("/").await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.stat().as_deref(), Some("ok"));
    }
}
