//! Domain objects and the collection abstraction.
//!
//! Trellis never inspects domain objects directly. Objects travel through the
//! pipeline as [`Object`] handles and are only downcast by the typed
//! accessors declared on a resource. Collections are anything that can be
//! counted and sliced; filtering happens in the query collaborator that
//! produces them.

use crate::Error;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Type-erased, shareable domain object.
pub type Object = Arc<dyn Any + Send + Sync>;

/// Wrap a domain value into an [`Object`].
pub fn object<T: Any + Send + Sync>(value: T) -> Object {
    Arc::new(value)
}

/// Downcast an object to its concrete type.
///
/// A mismatch means a resource was declared with accessors for a different
/// type than its collaborators return, which is a programming error surfaced
/// as [`Error::Internal`].
pub fn downcast<T: Any>(obj: &Object) -> Result<&T, Error> {
    obj.downcast_ref::<T>().ok_or_else(|| {
        Error::Internal(format!(
            "object is not a {}",
            std::any::type_name::<T>()
        ))
    })
}

/// A countable, sliceable sequence of domain objects.
///
/// `slice` takes a half-open range and must not mutate the underlying data;
/// the pagination builder may call `count` and `slice` in any order.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Total number of objects in the collection.
    async fn count(&self) -> Result<usize, Error>;

    /// Objects in `start..end`, truncated to what exists.
    async fn slice(&self, start: usize, end: usize) -> Result<Vec<Object>, Error>;
}

/// In-memory collection backed by a vector.
#[derive(Clone, Default)]
pub struct VecCollection {
    items: Vec<Object>,
}

impl VecCollection {
    pub fn new(items: Vec<Object>) -> Self {
        Self { items }
    }

    /// Build a collection from plain values.
    pub fn from_values<T, I>(values: I) -> Self
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = T>,
    {
        Self {
            items: values.into_iter().map(object).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for VecCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VecCollection")
            .field("len", &self.items.len())
            .finish()
    }
}

#[async_trait]
impl Collection for VecCollection {
    async fn count(&self) -> Result<usize, Error> {
        Ok(self.items.len())
    }

    async fn slice(&self, start: usize, end: usize) -> Result<Vec<Object>, Error> {
        let end = end.min(self.items.len());
        let start = start.min(end);
        Ok(self.items[start..end].to_vec())
    }
}
