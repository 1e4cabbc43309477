//! Service layer API for approval workflow operations
use super::draft::RequestDraft;
use super::error::{EngineError, StoreError, TransitionError};
use super::identifier::RequestNumberGenerator;
use super::request::{ApprovalRequest, ApproveAction, RejectAction};
use super::store::{RequestFilter, RequestStore, Version};
use super::utils;
use chrono::Utc;

/// Knobs for the service. The store client brings its own timeouts; the
/// engine adds none.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Attempts at finding an unclaimed request number before a creation
    /// fails with `IdentifierExhausted`.
    pub max_number_attempts: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_number_attempts: super::identifier::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Orchestrates loading a request, applying a transition and persisting the
/// result. Every mutation is a compare-and-swap against the version read at
/// load time; on mismatch the caller gets [`EngineError::Conflict`] and is
/// expected to re-fetch and retry.
pub struct ApprovalService<S> {
    store: S,
    numbers: RequestNumberGenerator,
}

impl<S: RequestStore> ApprovalService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: S, config: ServiceConfig) -> Self {
        Self {
            store,
            numbers: RequestNumberGenerator::new(config.max_number_attempts),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate a draft, allocate its identifiers and persist it. The draft
    /// is checked before any store write happens; the request number is
    /// generated exactly once, here.
    pub fn create_request(&self, draft: RequestDraft) -> Result<ApprovalRequest, EngineError> {
        draft.validate()?;

        let now = Utc::now();
        let request_number = self.numbers.next_unique(&self.store, now)?;
        let id = utils::new_request_id()?;
        let request = draft.finalise(id, request_number, now)?;

        self.store.create(&request)?;

        tracing::info!(
            id = %request.id,
            number = %request.request_number,
            levels = request.approval_workflow.len(),
            "approval request created"
        );
        Ok(request)
    }

    /// Approve the current level of a request.
    pub fn approve(
        &self,
        request_id: &str,
        action: ApproveAction,
    ) -> Result<ApprovalRequest, EngineError> {
        let (request, version) = self.load(request_id)?;
        let updated = request
            .approve(action, Utc::now())
            .map_err(|err| self.transition_failed(request_id, err))?;

        tracing::debug!(
            id = %request_id,
            level = updated.current_approval_level,
            status = %updated.overall_status,
            "level approved"
        );
        self.write_back(request_id, &version, updated)
    }

    /// Reject the current level, terminating the whole workflow.
    pub fn reject(
        &self,
        request_id: &str,
        action: RejectAction,
    ) -> Result<ApprovalRequest, EngineError> {
        let (request, version) = self.load(request_id)?;
        let updated = request
            .reject(action, Utc::now())
            .map_err(|err| self.transition_failed(request_id, err))?;

        tracing::debug!(id = %request_id, "request rejected");
        self.write_back(request_id, &version, updated)
    }

    /// Withdraw a request that is still in flight.
    pub fn cancel(
        &self,
        request_id: &str,
        reason: impl Into<String>,
    ) -> Result<ApprovalRequest, EngineError> {
        let (request, version) = self.load(request_id)?;
        let updated = request
            .cancel(reason, Utc::now())
            .map_err(|err| self.transition_failed(request_id, err))?;

        tracing::debug!(id = %request_id, "request cancelled");
        self.write_back(request_id, &version, updated)
    }

    /// Append a comment to the audit trail. Legal on terminal requests too,
    /// though the write-back can still lose a version race.
    pub fn add_comment(
        &self,
        request_id: &str,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<ApprovalRequest, EngineError> {
        let (request, version) = self.load(request_id)?;
        let updated = request.with_comment(user_id, user_name, text, Utc::now());
        self.write_back(request_id, &version, updated)
    }

    pub fn get_request(&self, request_id: &str) -> Result<ApprovalRequest, EngineError> {
        Ok(self.load(request_id)?.0)
    }

    pub fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<ApprovalRequest>, EngineError> {
        Ok(self.store.list(filter)?)
    }

    fn load(&self, request_id: &str) -> Result<(ApprovalRequest, Version), EngineError> {
        self.store
            .get_by_id(request_id)?
            .ok_or_else(|| EngineError::NotFound(request_id.to_owned()))
    }

    fn write_back(
        &self,
        request_id: &str,
        version: &Version,
        updated: ApprovalRequest,
    ) -> Result<ApprovalRequest, EngineError> {
        match self.store.compare_and_swap(request_id, version, &updated) {
            Ok(()) => Ok(updated),
            Err(StoreError::VersionMismatch(_)) => {
                tracing::debug!(id = %request_id, "write-back lost a version race");
                Err(EngineError::Conflict(request_id.to_owned()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn transition_failed(&self, request_id: &str, err: TransitionError) -> EngineError {
        // A dangling level pointer means the stored document is corrupted.
        if let TransitionError::LevelNotFound { level, levels } = err {
            tracing::error!(
                id = %request_id,
                level,
                levels,
                "current approval level points outside the workflow"
            );
        }
        err.into()
    }
}
