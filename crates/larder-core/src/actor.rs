//! The acting family member and the parent capability token.
//!
//! Approval, rejection, archiving and favoriting take a [`ParentCapability`]
//! argument. The only way to obtain one is [`Actor::parent_capability`],
//! which refuses kids, so a kid-initiated approval cannot be expressed.

use uuid::Uuid;

use larder_db::models::{FamilyMember, MemberRole};

use crate::error::{LarderError, Result};

/// The member on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub member_id: Uuid,
    pub family_id: Uuid,
    pub display_name: String,
    pub role: MemberRole,
}

impl Actor {
    pub fn from_member(member: &FamilyMember) -> Self {
        Self {
            member_id: member.id,
            family_id: member.family_id,
            display_name: member.display_name.clone(),
            role: member.role,
        }
    }

    pub fn is_parent(&self) -> bool {
        self.role == MemberRole::Parent
    }

    /// Prove the actor is a parent before performing `action`.
    pub fn parent_capability(&self, action: &str) -> Result<ParentCapability> {
        if !self.is_parent() {
            tracing::warn!(
                member = %self.display_name,
                role = %self.role,
                action,
                "parent-only action refused"
            );
            return Err(self.permission_error(action));
        }
        Ok(ParentCapability {
            member_id: self.member_id,
            family_id: self.family_id,
        })
    }

    /// Refuse access to records of another family.
    pub fn ensure_family(&self, family_id: Uuid, action: &str) -> Result<()> {
        if self.family_id != family_id {
            return Err(self.permission_error(&format!("{action} for another family")));
        }
        Ok(())
    }

    fn permission_error(&self, action: &str) -> LarderError {
        LarderError::Permission {
            member: self.display_name.clone(),
            role: self.role,
            action: action.to_owned(),
        }
    }
}

/// Proof that a parent authorized the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentCapability {
    member_id: Uuid,
    family_id: Uuid,
}

impl ParentCapability {
    /// The approving parent.
    pub fn member_id(&self) -> Uuid {
        self.member_id
    }

    pub fn family_id(&self) -> Uuid {
        self.family_id
    }
}
