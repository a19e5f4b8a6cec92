use serde::Serialize;
use tracing::warn;

use crate::domain::actor::Role;
use crate::domain::request::RequestType;
use crate::flows::ApprovalError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub approver_role: Option<Role>,
}

impl StageDescriptor {
    const fn new(key: &'static str, name: &'static str, approver_role: Option<Role>) -> Self {
        Self { key, name, approver_role }
    }
}

const SUBMITTED: StageDescriptor = StageDescriptor::new("submitted", "Submitted", None);
const PENDING_LECTURER: StageDescriptor =
    StageDescriptor::new("pending_lecturer", "Pending Lecturer Approval", Some(Role::Lecturer));
const PENDING_HOD: StageDescriptor =
    StageDescriptor::new("pending_hod", "Pending HOD Approval", Some(Role::Hod));
const PENDING_DEAN: StageDescriptor =
    StageDescriptor::new("pending_dean", "Pending Dean Approval", Some(Role::Dean));
const PENDING_VC: StageDescriptor =
    StageDescriptor::new("pending_vc", "Pending VC Approval", Some(Role::Vc));
const PENDING_STAFF: StageDescriptor =
    StageDescriptor::new("pending_staff", "Pending Staff Approval", Some(Role::Staff));
const APPROVED: StageDescriptor = StageDescriptor::new("approved", "Approved", None);
const READY_TO_COLLECT: StageDescriptor =
    StageDescriptor::new("ready_to_collect", "Ready to Collect", None);

const EXCUSE_STAGES: &[StageDescriptor] =
    &[SUBMITTED, PENDING_LECTURER, PENDING_HOD, PENDING_DEAN, PENDING_VC, APPROVED];
const LEAVE_STAGES: &[StageDescriptor] =
    &[SUBMITTED, PENDING_LECTURER, PENDING_HOD, PENDING_DEAN, APPROVED];
const LETTER_STAGES: &[StageDescriptor] = &[SUBMITTED, PENDING_STAFF, READY_TO_COLLECT];

impl RequestType {
    pub fn stages(&self) -> &'static [StageDescriptor] {
        match self {
            Self::Excuse => EXCUSE_STAGES,
            Self::Leave => LEAVE_STAGES,
            Self::Letter => LETTER_STAGES,
        }
    }

    /// Index of the last stage; reaching it finalizes the request as approved.
    pub fn terminal_index(&self) -> u32 {
        self.stages().len().saturating_sub(1) as u32
    }
}

/// Stage list for a raw type name. Unknown names yield an empty slice.
pub fn stages_for(request_type: &str) -> &'static [StageDescriptor] {
    request_type.parse::<RequestType>().map(|kind| kind.stages()).unwrap_or(&[])
}

pub fn resolve(request_type: RequestType, index: u32) -> Option<&'static StageDescriptor> {
    let stage = request_type.stages().get(index as usize);
    if stage.is_none() {
        warn!(
            event_name = "approval.stage.out_of_range",
            request_type = request_type.as_str(),
            stage_index = index,
            "stage index has no descriptor in catalog"
        );
    }
    stage
}

pub fn resolve_required(
    request_type: RequestType,
    index: u32,
) -> Result<&'static StageDescriptor, ApprovalError> {
    resolve(request_type, index)
        .ok_or(ApprovalError::IndexOutOfRange { request_type, stage_index: index })
}
