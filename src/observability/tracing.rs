//! Span helpers.
//!
//! Every ingest cycle runs inside one span so that source retries, row
//! rejections and store errors logged during the cycle carry the job name
//! and the cycle's correlation id.

use uuid::Uuid;

/// Fresh correlation id for one cycle.
pub fn new_cycle_id() -> Uuid {
    Uuid::new_v4()
}

pub fn cycle_span(job: &str, cycle_id: Uuid) -> tracing::Span {
    tracing::info_span!("ingest_cycle", job = %job, cycle_id = %cycle_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_ids_are_unique() {
        assert_ne!(new_cycle_id(), new_cycle_id());
    }
}
