// Permission checks applied before any handler runs

use crate::collection::Object;
use crate::{Error, HttpMethod, Principal};
use std::fmt;
use std::sync::Arc;

/// Which predicate a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Access,
    Modify,
    Delete,
}

impl Operation {
    pub fn for_method(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET | HttpMethod::HEAD => Operation::Access,
            HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH => Operation::Modify,
            HttpMethod::DELETE => Operation::Delete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Access => "access",
            Operation::Modify => "modify",
            Operation::Delete => "delete",
        }
    }
}

/// Authorization predicates of a resource.
///
/// `object` is the target item, or the nearest resolved parent for list and
/// create operations (`None` at the top of the tree). Reading is allowed and
/// mutation denied unless a resource opts in.
pub trait Permissions: Send + Sync {
    fn can_access(&self, _object: Option<&Object>, _principal: &Principal) -> bool {
        true
    }

    fn can_modify(&self, _object: Option<&Object>, _principal: &Principal) -> bool {
        false
    }

    fn can_delete(&self, _object: Option<&Object>, _principal: &Principal) -> bool {
        false
    }

    fn allows(&self, operation: Operation, object: Option<&Object>, principal: &Principal) -> bool {
        match operation {
            Operation::Access => self.can_access(object, principal),
            Operation::Modify => self.can_modify(object, principal),
            Operation::Delete => self.can_delete(object, principal),
        }
    }
}

/// Read-only access for everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPermissions;

impl Permissions for DefaultPermissions {}

/// Everything is allowed for everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Permissions for AllowAll {
    fn can_modify(&self, _object: Option<&Object>, _principal: &Principal) -> bool {
        true
    }

    fn can_delete(&self, _object: Option<&Object>, _principal: &Principal) -> bool {
        true
    }
}

/// Anyone may read; any logged-in user may modify and delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticatedCanModify;

impl Permissions for AuthenticatedCanModify {
    fn can_modify(&self, _object: Option<&Object>, principal: &Principal) -> bool {
        !principal.is_anonymous()
    }

    fn can_delete(&self, _object: Option<&Object>, principal: &Principal) -> bool {
        !principal.is_anonymous()
    }
}

type Predicate = Arc<dyn Fn(Option<&Object>, &Principal) -> bool + Send + Sync>;

/// Permissions assembled from closures. Unset predicates keep the defaults.
///
/// ```
/// use trellis_core::permission::{PermissionFn, Permissions};
/// use trellis_core::Principal;
///
/// let perms = PermissionFn::new().modify(|_, principal| principal.id() == Some("1"));
/// assert!(perms.can_modify(None, &Principal::user("1", "admin")));
/// assert!(!perms.can_delete(None, &Principal::user("1", "admin")));
/// ```
#[derive(Clone, Default)]
pub struct PermissionFn {
    access: Option<Predicate>,
    modify: Option<Predicate>,
    delete: Option<Predicate>,
}

impl PermissionFn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Object>, &Principal) -> bool + Send + Sync + 'static,
    {
        self.access = Some(Arc::new(f));
        self
    }

    pub fn modify<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Object>, &Principal) -> bool + Send + Sync + 'static,
    {
        self.modify = Some(Arc::new(f));
        self
    }

    pub fn delete<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Object>, &Principal) -> bool + Send + Sync + 'static,
    {
        self.delete = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for PermissionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionFn")
            .field("access", &self.access.is_some())
            .field("modify", &self.modify.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

impl Permissions for PermissionFn {
    fn can_access(&self, object: Option<&Object>, principal: &Principal) -> bool {
        self.access.as_ref().is_none_or(|f| f(object, principal))
    }

    fn can_modify(&self, object: Option<&Object>, principal: &Principal) -> bool {
        self.modify.as_ref().is_some_and(|f| f(object, principal))
    }

    fn can_delete(&self, object: Option<&Object>, principal: &Principal) -> bool {
        self.delete.as_ref().is_some_and(|f| f(object, principal))
    }
}

/// Run one predicate, mapping a refusal to 401 for anonymous callers and
/// 403 for everyone else.
pub fn check(
    permissions: &dyn Permissions,
    operation: Operation,
    object: Option<&Object>,
    principal: &Principal,
    resource: &str,
) -> Result<(), Error> {
    if permissions.allows(operation, object, principal) {
        return Ok(());
    }

    if principal.is_anonymous() {
        Err(Error::AuthenticationRequired)
    } else {
        Err(Error::PermissionDenied(format!(
            "cannot {} {}",
            operation.as_str(),
            resource
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{downcast, object};

    struct Note {
        owner: String,
    }

    #[test]
    fn test_operation_for_method() {
        assert_eq!(Operation::for_method(HttpMethod::HEAD), Operation::Access);
        assert_eq!(Operation::for_method(HttpMethod::PATCH), Operation::Modify);
        assert_eq!(Operation::for_method(HttpMethod::DELETE), Operation::Delete);
    }

    #[test]
    fn test_defaults_are_read_only() {
        let anon = Principal::Anonymous;
        assert!(DefaultPermissions.can_access(None, &anon));
        assert!(!DefaultPermissions.can_modify(None, &anon));
        assert!(!DefaultPermissions.can_delete(None, &anon));
    }

    #[test]
    fn test_anonymous_failure_is_401() {
        let err = check(
            &DefaultPermissions,
            Operation::Delete,
            None,
            &Principal::Anonymous,
            "item",
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_authenticated_failure_is_403() {
        let err = check(
            &DefaultPermissions,
            Operation::Delete,
            None,
            &Principal::user("3", "ada"),
            "item",
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_authenticated_can_modify() {
        let user = Principal::user("3", "ada");
        assert!(AuthenticatedCanModify.can_delete(None, &user));
        assert!(!AuthenticatedCanModify.can_modify(None, &Principal::Anonymous));
    }

    #[test]
    fn test_permission_fn_owner_check() {
        let perms = PermissionFn::new().delete(|obj, principal| {
            obj.and_then(|o| downcast::<Note>(o).ok())
                .is_some_and(|note| Some(note.owner.as_str()) == principal.id())
        });
        let note = object(Note {
            owner: "9".to_string(),
        });

        assert!(perms.can_access(Some(&note), &Principal::Anonymous));
        assert!(perms.can_delete(Some(&note), &Principal::user("9", "bo")));
        assert!(!perms.can_delete(Some(&note), &Principal::user("8", "cy")));
        assert!(!perms.can_modify(Some(&note), &Principal::user("9", "bo")));
    }
}
