//! Builder for assembling a request before it enters the workflow
use super::error::ValidationError;
use super::request::{
    ApprovalLevel, ApprovalRequest, Attachment, BudgetDetails, DetailValue, EntityReference,
    EventDetails, LevelStatus, OverallStatus, Priority, Requester, RequestType,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Creation input for an [`ApprovalRequest`]. The workflow levels are fixed
/// here; the engine never inserts or removes levels later.
#[derive(Debug, Clone, Default)]
pub struct RequestDraft {
    request_type: Option<RequestType>,
    title: String,
    description: String,
    priority: Priority,
    requester: Option<Requester>,
    entity_reference: Option<EntityReference>,
    type_specific_details: BTreeMap<String, DetailValue>,
    event_details: Option<EventDetails>,
    budget_details: Option<BudgetDetails>,
    attachments: Vec<Attachment>,
    workflow: Vec<ApprovalLevel>,
    deadline: Option<DateTime<Utc>>,
    is_urgent: bool,
    related_requests: Vec<String>,
}

impl RequestDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new(request_type: RequestType, title: impl Into<String>) -> Self {
        Self {
            request_type: Some(request_type),
            title: title.into(),
            ..Self::default()
        }
    }
    pub fn set_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
    pub fn set_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
    pub fn set_requester(mut self, requester: Requester) -> Self {
        self.requester = Some(requester);
        self
    }
    pub fn set_entity_reference(mut self, reference: EntityReference) -> Self {
        self.entity_reference = Some(reference);
        self
    }
    pub fn set_detail(mut self, key: impl Into<String>, value: DetailValue) -> Self {
        self.type_specific_details.insert(key.into(), value);
        self
    }
    pub fn set_event_details(mut self, details: EventDetails) -> Self {
        self.event_details = Some(details);
        self
    }
    pub fn set_budget_details(mut self, details: BudgetDetails) -> Self {
        self.budget_details = Some(details);
        self
    }
    pub fn add_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
    /// Append the next approval level, numbered contiguously from 1.
    pub fn add_level(mut self, approver_role: impl Into<String>) -> Self {
        let next = self.workflow.len() as u32 + 1;
        self.workflow.push(ApprovalLevel::new(next, approver_role));
        self
    }
    /// Replace the workflow with caller-built levels. `finalise` still checks
    /// the numbering.
    pub fn set_workflow(mut self, workflow: Vec<ApprovalLevel>) -> Self {
        self.workflow = workflow;
        self
    }
    pub fn set_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
    pub fn set_urgent(mut self, is_urgent: bool) -> Self {
        self.is_urgent = is_urgent;
        self
    }
    pub fn add_related_request(mut self, id: impl Into<String>) -> Self {
        self.related_requests.push(id.into());
        self
    }

    /// Checks the draft against the creation rules without building it.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationError::TitleTooLong {
                len: self.title.chars().count(),
                max: MAX_TITLE_LEN,
            });
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::DescriptionTooLong {
                len: self.description.chars().count(),
                max: MAX_DESCRIPTION_LEN,
            });
        }
        if self.requester.is_none() {
            return Err(ValidationError::MissingRequester);
        }
        if self.workflow.is_empty() {
            return Err(ValidationError::EmptyWorkflow);
        }
        for (position, level) in self.workflow.iter().enumerate() {
            if level.level != position as u32 + 1 {
                return Err(ValidationError::NonContiguousLevels {
                    position,
                    found: level.level,
                });
            }
            if level.approver_role.trim().is_empty() {
                return Err(ValidationError::EmptyApproverRole { level: level.level });
            }
            if level.status != LevelStatus::Pending {
                return Err(ValidationError::LevelNotPending { level: level.level });
            }
        }
        Ok(())
    }

    /// Checks all fields and performs validation, then builds the entity with
    /// its store-assigned identifiers. The request starts at level 1,
    /// overall status Pending.
    pub fn finalise(
        self,
        id: String,
        request_number: String,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest, ValidationError> {
        self.validate()?;

        let request_type = self.request_type.unwrap_or(RequestType::Other);
        let requester = self.requester.ok_or(ValidationError::MissingRequester)?;

        Ok(ApprovalRequest {
            id,
            request_number,
            request_type,
            entity_reference: self.entity_reference,
            title: self.title,
            description: self.description,
            priority: self.priority,
            requester,
            type_specific_details: self.type_specific_details,
            event_details: self.event_details,
            budget_details: self.budget_details,
            attachments: self.attachments,
            approval_workflow: self.workflow,
            current_approval_level: 1,
            overall_status: OverallStatus::Pending,
            rejection_reason: None,
            cancellation_reason: None,
            comments: Vec::new(),
            submitted_at: now,
            reviewed_at: None,
            completed_at: None,
            deadline: self.deadline,
            is_urgent: self.is_urgent,
            notifications_sent: Vec::new(),
            related_requests: self.related_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester() -> Requester {
        Requester {
            user_id: "user_9".to_string(),
            name: "Meera Iyer".to_string(),
            email: "meera@example.edu".to_string(),
            department: "Training".to_string(),
            designation: "Officer".to_string(),
        }
    }

    #[test]
    fn empty_workflow_is_rejected() {
        let err = RequestDraft::new(RequestType::BudgetApproval, "Lab upgrade")
            .set_requester(requester())
            .finalise("req_a".to_string(), "APR-202408-11111".to_string(), Utc::now())
            .unwrap_err();

        assert_eq!(err, ValidationError::EmptyWorkflow);
    }

    #[test]
    fn caller_built_levels_must_be_contiguous() {
        let err = RequestDraft::new(RequestType::BudgetApproval, "Lab upgrade")
            .set_requester(requester())
            .set_workflow(vec![
                ApprovalLevel::new(1, "Head of Department"),
                ApprovalLevel::new(3, "Dean"),
            ])
            .finalise("req_b".to_string(), "APR-202408-22222".to_string(), Utc::now())
            .unwrap_err();

        assert_eq!(err, ValidationError::NonContiguousLevels { position: 1, found: 3 });
    }

    #[test]
    fn finalised_request_starts_at_level_one() {
        let request = RequestDraft::new(RequestType::VenueBooking, "Auditorium")
            .set_requester(requester())
            .set_description("Annual convocation booking")
            .add_level("Facilities Manager")
            .add_level("Registrar")
            .finalise("req_c".to_string(), "APR-202408-33333".to_string(), Utc::now())
            .unwrap();

        assert_eq!(request.current_approval_level, 1);
        assert_eq!(request.overall_status, OverallStatus::Pending);
        assert!(request.approval_workflow.iter().all(|l| l.status == LevelStatus::Pending));
        assert!(request.completed_at.is_none());
    }
}
