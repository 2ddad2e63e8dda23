use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ShiftError;

/// Caller roles as supplied by the external auth collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Attendant,
    Manager,
    Admin,
}

impl Role {
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Attendant => "attendant",
            Role::Manager => "manager",
            Role::Admin => "admin",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attendant" => Ok(Role::Attendant),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(ShiftError::Malformed(format!("unknown role {other:?}"))),
        }
    }
}

/// Authenticated identity attached to every engine operation. Authentication
/// itself happens upstream; the engine only consumes the result.
#[derive(Clone, Copy, Debug)]
pub struct Caller {
    pub user_id: Uuid,
    pub station_id: Uuid,
    pub role: Role,
}

/// Capability seam injected into the service, so the access policy is
/// swappable and testable independently of the lifecycle logic.
pub trait AccessPolicy: Send + Sync {
    /// May `caller` read and mutate a session owned by `owner`?
    fn can_access(&self, caller: &Caller, owner: &Uuid) -> bool;

    /// May `caller` perform supervisor-only operations (shift review)?
    fn is_privileged(&self, caller: &Caller) -> bool;
}

/// Default policy: attendants operate on their own shifts only; managers and
/// admins may act on any shift within their station.
pub struct RoleBasedAccess;

impl AccessPolicy for RoleBasedAccess {
    fn can_access(&self, caller: &Caller, owner: &Uuid) -> bool {
        self.is_privileged(caller) || caller.user_id == *owner
    }

    fn is_privileged(&self, caller: &Caller) -> bool {
        caller.role.is_privileged()
    }
}
