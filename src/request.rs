//! Core approval request entity and its transition rules
use super::error::TransitionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "Event Creation")]
    EventCreation,
    #[serde(rename = "Event Modification")]
    EventModification,
    #[serde(rename = "Event Cancellation")]
    EventCancellation,
    #[serde(rename = "Budget Approval")]
    BudgetApproval,
    #[serde(rename = "Venue Booking")]
    VenueBooking,
    #[serde(rename = "Trainer Invitation")]
    TrainerInvitation,
    #[serde(rename = "Resource Allocation")]
    ResourceAllocation,
    #[serde(rename = "Certificate Issuance")]
    CertificateIssuance,
    #[serde(rename = "Report Publication")]
    ReportPublication,
    #[serde(rename = "Leave Request")]
    LeaveRequest,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Event,
    Registration,
    Certificate,
    Report,
    Resource,
    Venue,
    Budget,
    Other,
}

/// Reference to the institutional record a request acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub entity_type: EntityType,
    pub entity_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub designation: String,
}

/// Primitive value held in the free-form details map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Flag(bool),
    Number(i64),
    Text(String),
}

/// Structured block for event-shaped requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_participants: Option<u32>,
}

/// Structured block for budget-shaped requests. Amounts are integer minor
/// units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetDetails {
    pub amount: u64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelStatus {
    Pending,
    Approved,
    Rejected,
    Forwarded,
}

/// One stage in the ordered approval sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalLevel {
    pub level: u32,
    pub approver_role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_name: Option<String>,
    pub status: LevelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ApprovalLevel {
    pub fn new(level: u32, approver_role: impl Into<String>) -> Self {
        Self {
            level,
            approver_role: approver_role.into(),
            approver_id: None,
            approver_name: None,
            status: LevelStatus::Pending,
            comments: None,
            action_date: None,
            signature: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Pending,
    #[serde(rename = "Under Review")]
    UnderReview,
    Approved,
    Rejected,
    Cancelled,
    #[serde(rename = "On Hold")]
    OnHold,
}

impl OverallStatus {
    /// Approved, Rejected and Cancelled take no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::UnderReview => "Under Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
            Self::OnHold => "On Hold",
        };
        f.write_str(name)
    }
}

/// Free-text note on the request, independent of per-level comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Log entry written by the external notification collaborator. The engine
/// never appends to this list itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub user_id: String,
    pub sent_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Actor metadata attached to an approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveAction {
    pub approver_id: String,
    pub approver_name: String,
    pub comments: Option<String>,
    pub signature: Option<String>,
}

/// Actor metadata attached to a rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectAction {
    pub approver_id: String,
    pub approver_name: String,
    pub reason: String,
    pub comments: Option<String>,
}

/// An institutional record passing through an ordered sequence of approver
/// levels. Mutated exclusively through the transition methods below; the
/// workflow itself is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: String,
    pub request_number: String,
    pub request_type: RequestType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_reference: Option<EntityReference>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub requester: Requester,
    pub type_specific_details: BTreeMap<String, DetailValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_details: Option<EventDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_details: Option<BudgetDetails>,
    pub attachments: Vec<Attachment>,
    pub approval_workflow: Vec<ApprovalLevel>,
    pub current_approval_level: u32,
    pub overall_status: OverallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub comments: Vec<Comment>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub is_urgent: bool,
    pub notifications_sent: Vec<NotificationRecord>,
    pub related_requests: Vec<String>,
}

impl ApprovalRequest {
    pub fn is_terminal(&self) -> bool {
        self.overall_status.is_terminal()
    }

    /// Index of the level awaiting action. Duplicate level numbers are
    /// malformed input; the first match in document order wins.
    fn current_level_index(&self) -> Result<usize, TransitionError> {
        self.approval_workflow
            .iter()
            .position(|l| l.level == self.current_approval_level)
            .ok_or(TransitionError::LevelNotFound {
                level: self.current_approval_level,
                levels: self.approval_workflow.len(),
            })
    }

    fn guard_not_terminal(&self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::NotActionable {
                status: self.overall_status,
            });
        }
        Ok(())
    }

    /// Approve the current level. Advances the level pointer, or completes
    /// the request when the last level signs off.
    pub fn approve(
        mut self,
        action: ApproveAction,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        self.guard_not_terminal()?;
        let index = self.current_level_index()?;

        let level = &mut self.approval_workflow[index];
        level.status = LevelStatus::Approved;
        level.approver_id = Some(action.approver_id);
        level.approver_name = Some(action.approver_name);
        level.comments = action.comments;
        level.action_date = Some(now);
        level.signature = action.signature;

        if self.reviewed_at.is_none() {
            self.reviewed_at = Some(now);
        }

        if self.current_approval_level < self.approval_workflow.len() as u32 {
            self.current_approval_level += 1;
            self.overall_status = OverallStatus::UnderReview;
        } else {
            self.overall_status = OverallStatus::Approved;
            self.completed_at = Some(now);
        }

        Ok(self)
    }

    /// Reject the current level. Rejection short-circuits the whole workflow;
    /// any later levels stay pending permanently as historical record.
    pub fn reject(
        mut self,
        action: RejectAction,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        self.guard_not_terminal()?;
        let index = self.current_level_index()?;

        let level = &mut self.approval_workflow[index];
        level.status = LevelStatus::Rejected;
        level.approver_id = Some(action.approver_id);
        level.approver_name = Some(action.approver_name);
        level.comments = action.comments;
        level.action_date = Some(now);

        if self.reviewed_at.is_none() {
            self.reviewed_at = Some(now);
        }
        self.overall_status = OverallStatus::Rejected;
        self.rejection_reason = Some(action.reason);
        self.completed_at = Some(now);

        Ok(self)
    }

    /// Withdraw the request. Legal only while it is still in flight.
    pub fn cancel(
        mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        match self.overall_status {
            OverallStatus::Pending | OverallStatus::UnderReview | OverallStatus::OnHold => {}
            status => return Err(TransitionError::NotActionable { status }),
        }

        self.overall_status = OverallStatus::Cancelled;
        self.cancellation_reason = Some(reason.into());
        self.completed_at = Some(now);

        Ok(self)
    }

    /// Append a free-text comment. Always legal, terminal requests included;
    /// comments are an audit trail, not a workflow action.
    pub fn with_comment(
        mut self,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        self.comments.push(Comment {
            user_id: user_id.into(),
            user_name: user_name.into(),
            text: text.into(),
            timestamp: now,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::RequestDraft;

    fn requester() -> Requester {
        Requester {
            user_id: "user_1".to_string(),
            name: "Asha Rao".to_string(),
            email: "asha@example.edu".to_string(),
            department: "Computer Science".to_string(),
            designation: "Coordinator".to_string(),
        }
    }

    fn two_level_request() -> ApprovalRequest {
        RequestDraft::new(RequestType::EventCreation, "Guest lecture")
            .set_requester(requester())
            .add_level("Head of Department")
            .add_level("Dean")
            .finalise(
                "req_test".to_string(),
                "APR-202408-00001".to_string(),
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn status_display_matches_document_spelling() {
        assert_eq!(OverallStatus::UnderReview.to_string(), "Under Review");
        assert_eq!(OverallStatus::OnHold.to_string(), "On Hold");
    }

    /// Duplicate level numbers are malformed input; the transition must act
    /// on the first match in document order.
    #[test]
    fn duplicate_level_numbers_use_first_match() {
        let mut request = two_level_request();
        request.approval_workflow[1].level = 1;

        let updated = request
            .approve(
                ApproveAction {
                    approver_id: "user_2".to_string(),
                    approver_name: "Dev Nair".to_string(),
                    comments: None,
                    signature: None,
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(updated.approval_workflow[0].status, LevelStatus::Approved);
        assert_eq!(updated.approval_workflow[1].status, LevelStatus::Pending);
    }

    /// Cancellation does not touch the workflow levels, so a dangling
    /// pointer must not block it.
    #[test]
    fn cancel_ignores_dangling_level_pointer() {
        let mut request = two_level_request();
        request.current_approval_level = 9;

        let cancelled = request.cancel("withdrawn", Utc::now()).unwrap();
        assert_eq!(cancelled.overall_status, OverallStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("withdrawn"));
    }

    #[test]
    fn approve_with_dangling_pointer_fails() {
        let mut request = two_level_request();
        request.current_approval_level = 9;

        let err = request
            .approve(
                ApproveAction {
                    approver_id: "user_2".to_string(),
                    approver_name: "Dev Nair".to_string(),
                    comments: None,
                    signature: None,
                },
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err, TransitionError::LevelNotFound { level: 9, levels: 2 });
    }
}
