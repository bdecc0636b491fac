// In-memory collaborators for resource declarations

use parking_lot::{Mutex, RwLock};
use std::future::{Ready, ready};
use std::sync::Arc;
use trellis_core::permission::{Operation, Permissions};
use trellis_core::{
    Collection, Error, LookupContext, Object, Principal, QueryContext, VecCollection, downcast,
    object,
};

type CallLog = Arc<Mutex<Vec<(String, Vec<String>)>>>;
type KeyFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// A shared `Vec<T>` that hands out lookup, query and removal closures.
///
/// Every call made through those closures is recorded so tests can assert
/// how often the dispatcher touched the backing store.
pub struct MemoryStore<T> {
    items: Arc<RwLock<Vec<T>>>,
    key: KeyFn<T>,
    calls: CallLog,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            key: Arc::clone(&self.key),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T> MemoryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty store keyed by `key`
    pub fn new<K>(key: K) -> Self
    where
        K: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            key: Arc::new(key),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Seed the store
    pub fn with_items(self, items: impl IntoIterator<Item = T>) -> Self {
        self.items.write().extend(items);
        self
    }

    pub fn insert(&self, item: T) {
        self.items.write().push(item);
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.items
            .read()
            .iter()
            .find(|item| (self.key)(item) == key)
            .cloned()
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        let mut items = self.items.write();
        let index = items.iter().position(|item| (self.key)(item) == key)?;
        Some(items.remove(index))
    }

    /// Replace the item with the same key, or append it
    pub fn upsert(&self, item: T) {
        let key = (self.key)(&item);
        let mut items = self.items.write();
        match items.iter_mut().find(|existing| (self.key)(existing) == key) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Record a method call with arguments
    pub fn record_call(&self, method: &str, args: Vec<String>) {
        self.calls.lock().push((method.to_string(), args));
    }

    /// Get the number of calls to a specific method
    pub fn method_call_count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    /// Check if a method was called
    pub fn was_called(&self, method: &str) -> bool {
        self.method_call_count(method) > 0
    }

    /// Get all calls
    pub fn get_all_calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }

    /// Clear all calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Closure for `Resource::with_lookup`, recorded as `lookup`
    pub fn lookup(
        &self,
    ) -> impl Fn(LookupContext) -> Ready<Result<Option<Object>, Error>> + Send + Sync + 'static
    {
        let store = self.clone();
        move |ctx: LookupContext| {
            store.record_call("lookup", vec![ctx.key.clone()]);
            ready(Ok(store.get(&ctx.key).map(object)))
        }
    }

    /// Closure for `Resource::with_query`, recorded as `query`
    pub fn query(
        &self,
    ) -> impl Fn(QueryContext) -> Ready<Result<Box<dyn Collection>, Error>> + Send + Sync + 'static
    {
        let store = self.clone();
        move |_ctx: QueryContext| {
            store.record_call("query", Vec::new());
            let objects = store.items().into_iter().map(object).collect();
            ready(Ok(Box::new(VecCollection::new(objects)) as Box<dyn Collection>))
        }
    }

    /// Closure for `Resource::with_default_delete`, recorded as `remove`
    pub fn remover(&self) -> impl Fn(Object) -> Ready<Result<(), Error>> + Send + Sync + 'static {
        let store = self.clone();
        move |obj: Object| {
            let result = downcast::<T>(&obj).and_then(|item| {
                let key = (store.key)(item);
                store.record_call("remove", vec![key.clone()]);
                store
                    .remove(&key)
                    .map(|_| ())
                    .ok_or_else(|| Error::NotFound(key))
            });
            ready(result)
        }
    }
}

/// Spy wrapper recording every permission check
#[derive(Clone)]
pub struct PermissionSpy<P> {
    inner: P,
    checks: Arc<Mutex<Vec<(Operation, bool)>>>,
}

impl<P: Permissions> PermissionSpy<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            checks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, operation: Operation, allowed: bool) -> bool {
        self.checks.lock().push((operation, allowed));
        allowed
    }

    /// Get the number of checks
    pub fn call_count(&self) -> usize {
        self.checks.lock().len()
    }

    /// Checks made for `operation`, with their outcome
    pub fn checks_for(&self, operation: Operation) -> Vec<bool> {
        self.checks
            .lock()
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, allowed)| *allowed)
            .collect()
    }

    /// Check if an operation was asked about
    pub fn was_checked(&self, operation: Operation) -> bool {
        !self.checks_for(operation).is_empty()
    }

    /// Get the wrapped permissions
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Permissions> Permissions for PermissionSpy<P> {
    fn can_access(&self, object: Option<&Object>, principal: &Principal) -> bool {
        self.record(Operation::Access, self.inner.can_access(object, principal))
    }

    fn can_modify(&self, object: Option<&Object>, principal: &Principal) -> bool {
        self.record(Operation::Modify, self.inner.can_modify(object, principal))
    }

    fn can_delete(&self, object: Option<&Object>, principal: &Principal) -> bool {
        self.record(Operation::Delete, self.inner.can_delete(object, principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{AuthenticatedCanModify, DefaultPermissions};

    #[derive(Clone, Debug, PartialEq)]
    struct Note {
        id: u32,
        text: String,
    }

    fn store() -> MemoryStore<Note> {
        MemoryStore::new(|n: &Note| n.id.to_string()).with_items((1..=3).map(|id| Note {
            id,
            text: format!("note {}", id),
        }))
    }

    #[test]
    fn test_store_crud() {
        let store = store();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("2").map(|n| n.text), Some("note 2".to_string()));

        store.upsert(Note {
            id: 2,
            text: "edited".to_string(),
        });
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("2").map(|n| n.text), Some("edited".to_string()));

        assert!(store.remove("2").is_some());
        assert!(store.remove("2").is_none());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_records_calls() {
        let store = store();
        let lookup = store.lookup();

        let found = lookup(LookupContext {
            parents: Vec::new(),
            key: "1".to_string(),
            principal: Principal::Anonymous,
        })
        .await
        .unwrap();
        assert_eq!(downcast::<Note>(&found.unwrap()).unwrap().id, 1);

        let missing = lookup(LookupContext {
            parents: Vec::new(),
            key: "9".to_string(),
            principal: Principal::Anonymous,
        })
        .await
        .unwrap();
        assert!(missing.is_none());

        assert_eq!(store.method_call_count("lookup"), 2);
        assert_eq!(store.get_all_calls()[1], ("lookup".to_string(), vec!["9".to_string()]));
    }

    #[tokio::test]
    async fn test_remover() {
        let store = store();
        let remove = store.remover();
        let note = object(store.get("3").unwrap());

        remove(note.clone()).await.unwrap();
        assert_eq!(store.len(), 2);
        assert!(matches!(remove(note).await, Err(Error::NotFound(_))));
        assert!(matches!(remove(object(5u8)).await, Err(Error::Internal(_))));
    }

    #[test]
    fn test_permission_spy() {
        let spy = PermissionSpy::new(AuthenticatedCanModify);
        let user = Principal::user("1", "ann");

        assert!(spy.can_access(None, &Principal::Anonymous));
        assert!(!spy.can_modify(None, &Principal::Anonymous));
        assert!(spy.can_modify(None, &user));

        assert_eq!(spy.call_count(), 3);
        assert_eq!(spy.checks_for(Operation::Modify), vec![false, true]);
        assert!(!spy.was_checked(Operation::Delete));

        let readonly = PermissionSpy::new(DefaultPermissions);
        assert!(!readonly.allows(Operation::Delete, None, &user));
        assert!(readonly.was_checked(Operation::Delete));
    }
}
