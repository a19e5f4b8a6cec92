use serde::{Deserialize, Serialize};

use crate::domain::actor::{Actor, Role};
use crate::domain::request::{RequestRecord, RequestType};
use crate::flows::catalog::resolve;
use crate::flows::ApprovalError;

/// True iff `role` is the approver named by the stage at `index`.
///
/// Stages without an approver (the submission stage and the terminal stage)
/// and out-of-range indices admit nobody. Admin is never granted here.
pub fn can_act(role: Role, request_type: RequestType, index: u32) -> bool {
    resolve(request_type, index)
        .and_then(|stage| stage.approver_role)
        .is_some_and(|approver| approver == role)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationBasis {
    StageRole,
    AdminOverride,
}

/// Authorization wrapper around [`can_act`] carrying deployment switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermissionPolicy {
    pub admin_override: bool,
}

impl PermissionPolicy {
    pub fn new(admin_override: bool) -> Self {
        Self { admin_override }
    }

    pub fn authorize(
        &self,
        actor: &Actor,
        record: &RequestRecord,
    ) -> Result<AuthorizationBasis, ApprovalError> {
        let stage = resolve(record.request_type, record.current_stage_index);

        if can_act(actor.role, record.request_type, record.current_stage_index) {
            return Ok(AuthorizationBasis::StageRole);
        }

        let actionable = stage.is_some_and(|stage| stage.approver_role.is_some());
        if self.admin_override && actor.role == Role::Admin && actionable {
            return Ok(AuthorizationBasis::AdminOverride);
        }

        Err(ApprovalError::Unauthorized {
            role: actor.role,
            required_role: stage.and_then(|stage| stage.approver_role),
            stage: stage.map(|stage| stage.name.to_string()),
        })
    }

    /// Roles that may act on a request sitting at `index`.
    pub fn eligible_roles(&self, request_type: RequestType, index: u32) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| {
                can_act(*role, request_type, index)
                    || (self.admin_override
                        && *role == Role::Admin
                        && resolve(request_type, index)
                            .is_some_and(|stage| stage.approver_role.is_some()))
            })
            .collect()
    }
}
