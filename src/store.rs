//! Durable storage seam for approval requests
//!
//! The engine only ever talks to a [`RequestStore`]. The sled-backed
//! implementation is the production store; [`MemoryRequestStore`] backs unit
//! tests that have no business opening a database.
use super::error::StoreError;
use super::request::{ApprovalRequest, OverallStatus, RequestType};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Opaque optimistic-concurrency token handed out with every read. A write
/// only lands if the token still matches what is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(Vec<u8>);

/// Criteria for listing requests. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<OverallStatus>,
    pub request_type: Option<RequestType>,
    pub requester_user_id: Option<String>,
}

impl RequestFilter {
    pub fn by_status(status: OverallStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
    pub fn by_request_type(request_type: RequestType) -> Self {
        Self {
            request_type: Some(request_type),
            ..Self::default()
        }
    }
    pub fn by_requester(user_id: impl Into<String>) -> Self {
        Self {
            requester_user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        if let Some(status) = self.status {
            if request.overall_status != status {
                return false;
            }
        }
        if let Some(request_type) = self.request_type {
            if request.request_type != request_type {
                return false;
            }
        }
        if let Some(user_id) = &self.requester_user_id {
            if request.requester.user_id != *user_id {
                return false;
            }
        }
        true
    }
}

/// Durable storage with a uniqueness constraint on the request number and
/// compare-and-swap writes. Requests are independent units of concurrency;
/// nothing here locks across them.
pub trait RequestStore {
    /// Persist a new request. Fails with [`StoreError::NumberTaken`] if the
    /// request number is already claimed.
    fn create(&self, request: &ApprovalRequest) -> Result<(), StoreError>;

    /// Load a request together with its current version token.
    fn get_by_id(&self, id: &str) -> Result<Option<(ApprovalRequest, Version)>, StoreError>;

    /// Replace the stored request, conditioned on `expected` still being the
    /// current version. Fails with [`StoreError::VersionMismatch`] when a
    /// concurrent writer got there first.
    fn compare_and_swap(
        &self,
        id: &str,
        expected: &Version,
        next: &ApprovalRequest,
    ) -> Result<(), StoreError>;

    fn find_by_request_number(&self, number: &str) -> Result<Option<ApprovalRequest>, StoreError>;

    fn list(&self, filter: &RequestFilter) -> Result<Vec<ApprovalRequest>, StoreError>;
}

const REQUESTS_TREE: &str = "requests";
const NUMBERS_TREE: &str = "request_numbers";

/// sled-backed store. Documents live in the `requests` tree as JSON keyed by
/// id; the `request_numbers` tree maps request number to id and doubles as
/// the uniqueness constraint.
pub struct SledRequestStore {
    requests: sled::Tree,
    numbers: sled::Tree,
}

impl SledRequestStore {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, StoreError> {
        Ok(Self {
            requests: instance.open_tree(REQUESTS_TREE)?,
            numbers: instance.open_tree(NUMBERS_TREE)?,
        })
    }

    fn decode(bytes: &[u8]) -> Result<ApprovalRequest, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl RequestStore for SledRequestStore {
    fn create(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        let document = serde_json::to_vec(request)?;

        // Claiming the number index entry is the uniqueness check; CAS from
        // absent makes it atomic under concurrent creators.
        let claim = self.numbers.compare_and_swap(
            request.request_number.as_bytes(),
            None::<&[u8]>,
            Some(request.id.as_bytes()),
        )?;
        if claim.is_err() {
            return Err(StoreError::NumberTaken(request.request_number.clone()));
        }

        self.requests.insert(request.id.as_bytes(), document)?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<(ApprovalRequest, Version)>, StoreError> {
        match self.requests.get(id.as_bytes())? {
            Some(bytes) => {
                let request = Self::decode(&bytes)?;
                Ok(Some((request, Version(bytes.to_vec()))))
            }
            None => Ok(None),
        }
    }

    fn compare_and_swap(
        &self,
        id: &str,
        expected: &Version,
        next: &ApprovalRequest,
    ) -> Result<(), StoreError> {
        let document = serde_json::to_vec(next)?;
        let swap = self.requests.compare_and_swap(
            id.as_bytes(),
            Some(expected.0.as_slice()),
            Some(document),
        )?;
        if swap.is_err() {
            return Err(StoreError::VersionMismatch(id.to_owned()));
        }
        Ok(())
    }

    fn find_by_request_number(&self, number: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        match self.numbers.get(number.as_bytes())? {
            Some(id) => match self.requests.get(&id)? {
                Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn list(&self, filter: &RequestFilter) -> Result<Vec<ApprovalRequest>, StoreError> {
        let mut results = Vec::new();
        for entry in self.requests.iter() {
            let (_, bytes) = entry?;
            let request = Self::decode(&bytes)?;
            if filter.matches(&request) {
                results.push(request);
            }
        }
        Ok(results)
    }
}

/// In-memory store with the same CAS semantics, for tests.
#[derive(Debug, Default)]
pub struct MemoryRequestStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    documents: BTreeMap<String, Vec<u8>>,
    numbers: BTreeMap<String, String>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RequestStore for MemoryRequestStore {
    fn create(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        let document = serde_json::to_vec(request)?;
        let mut inner = self.lock();
        if inner.numbers.contains_key(&request.request_number) {
            return Err(StoreError::NumberTaken(request.request_number.clone()));
        }
        inner
            .numbers
            .insert(request.request_number.clone(), request.id.clone());
        inner.documents.insert(request.id.clone(), document);
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<(ApprovalRequest, Version)>, StoreError> {
        let inner = self.lock();
        match inner.documents.get(id) {
            Some(bytes) => {
                let request = serde_json::from_slice(bytes)?;
                Ok(Some((request, Version(bytes.clone()))))
            }
            None => Ok(None),
        }
    }

    fn compare_and_swap(
        &self,
        id: &str,
        expected: &Version,
        next: &ApprovalRequest,
    ) -> Result<(), StoreError> {
        let document = serde_json::to_vec(next)?;
        let mut inner = self.lock();
        match inner.documents.get(id) {
            Some(current) if *current == expected.0 => {
                inner.documents.insert(id.to_owned(), document);
                Ok(())
            }
            _ => Err(StoreError::VersionMismatch(id.to_owned())),
        }
    }

    fn find_by_request_number(&self, number: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        let inner = self.lock();
        match inner.numbers.get(number).and_then(|id| inner.documents.get(id)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn list(&self, filter: &RequestFilter) -> Result<Vec<ApprovalRequest>, StoreError> {
        let inner = self.lock();
        let mut results = Vec::new();
        for bytes in inner.documents.values() {
            let request: ApprovalRequest = serde_json::from_slice(bytes)?;
            if filter.matches(&request) {
                results.push(request);
            }
        }
        Ok(results)
    }
}
