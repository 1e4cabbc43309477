//! Human-readable request number generation
use super::error::EngineError;
use super::store::RequestStore;
use chrono::{DateTime, Datelike, Utc};
use uuid7::uuid7;

pub const REQUEST_NUMBER_PREFIX: &str = "APR";

/// Attempts before giving up on finding an unclaimed number.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Produces `APR-YYYYMM-NNNNN` numbers and checks them for uniqueness
/// against the store before they are first persisted.
#[derive(Debug, Clone, Copy)]
pub struct RequestNumberGenerator {
    max_attempts: usize,
}

impl Default for RequestNumberGenerator {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RequestNumberGenerator {
    pub fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }

    /// One candidate number for the given instant. The 5-digit suffix is
    /// drawn from uuid7 random bits.
    pub fn generate(now: DateTime<Utc>) -> String {
        format!(
            "{REQUEST_NUMBER_PREFIX}-{:04}{:02}-{:05}",
            now.year(),
            now.month(),
            random_suffix()
        )
    }

    /// Generate a number that no stored request carries yet. Regenerates on
    /// collision up to the attempt bound, then fails with
    /// [`EngineError::IdentifierExhausted`].
    pub fn next_unique<S: RequestStore>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<String, EngineError> {
        for _ in 0..self.max_attempts {
            let candidate = Self::generate(now);
            if store.find_by_request_number(&candidate)?.is_none() {
                return Ok(candidate);
            }
        }

        tracing::error!(
            attempts = self.max_attempts,
            "request number generation exhausted"
        );
        Err(EngineError::IdentifierExhausted {
            attempts: self.max_attempts,
        })
    }
}

fn random_suffix() -> u32 {
    let id = uuid7();
    let bytes = id.as_bytes();
    let tail = [bytes[12], bytes[13], bytes[14], bytes[15]];
    u32::from_be_bytes(tail) % 100_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn number_has_fixed_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, 0).unwrap();
        let number = RequestNumberGenerator::generate(now);

        assert_eq!(number.len(), 16);
        assert!(number.starts_with("APR-202403-"));
        assert!(number[11..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn suffix_is_zero_padded() {
        // The suffix occupies exactly five digits regardless of its value.
        let now = Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap();
        for _ in 0..32 {
            let number = RequestNumberGenerator::generate(now);
            assert_eq!(number[11..].len(), 5, "bad suffix in {number}");
        }
    }
}
