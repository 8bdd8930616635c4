//! Pseudo-sequence identifiers.
//!
//! The store has no sequences and no RETURNING clause. Two strategies stand
//! in for them, both pluggable:
//!
//! - [`BatchNumbering`] stamps `id = count + 1, count + 2, …` on a batch
//!   before it is compiled. The count is read, then the insert is sent; two
//!   callers inserting into the same table can read the same count and
//!   assign colliding ids, and deleting rows makes the count shrink so ids
//!   get reused. Both are known limitations of [`RowCountNumbering`].
//! - [`IdentifierGenerator`] produces the single id returned by
//!   insert-get-id. Nothing checks the value for uniqueness afterwards.
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::Result;
use crate::query::Query;
use crate::value::{Record, Value};

/// Counts the rows a query currently matches.
#[async_trait]
pub trait RowCounter: Send + Sync {
    async fn count(&self, query: &Query) -> Result<u64>;
}

/// Assigns ids to a batch of records before the insert is compiled.
#[async_trait]
pub trait BatchNumbering: Send + Sync {
    async fn assign(&self, target: &Query, records: &mut [Record], counter: &dyn RowCounter) -> Result<()>;
}

/// Numbers a batch from the table's current row count.
#[derive(Debug, Clone)]
pub struct RowCountNumbering {
    column: String,
}

impl RowCountNumbering {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Default for RowCountNumbering {
    fn default() -> Self {
        Self::new("id")
    }
}

#[async_trait]
impl BatchNumbering for RowCountNumbering {
    async fn assign(&self, target: &Query, records: &mut [Record], counter: &dyn RowCounter) -> Result<()> {
        let base = counter.count(target).await?;
        tracing::debug!(column = %self.column, base, rows = records.len(), "numbering batch");
        for (offset, record) in records.iter_mut().enumerate() {
            record.prepend(&self.column, Value::UInt(base + offset as u64 + 1));
        }
        Ok(())
    }
}

/// Produces the id returned by insert-get-id.
pub trait IdentifierGenerator: Send + Sync {
    fn next_id(&self) -> u64;
}

/// Random unix timestamp (seconds) between the start of the current UTC
/// day and now.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayRangeGenerator;

impl IdentifierGenerator for DayRangeGenerator {
    fn next_id(&self) -> u64 {
        id_in_day_range(Utc::now(), &mut rand::thread_rng())
    }
}

pub fn id_in_day_range<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> u64 {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp())
        .unwrap_or_else(|| now.timestamp());
    let end = now.timestamp();
    rng.gen_range(start..=end).max(0) as u64
}

/// Deterministic generator: `start`, `start + 1`, …
#[derive(Debug, Default)]
pub struct SequentialGenerator {
    next: AtomicU64,
}

impl SequentialGenerator {
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl IdentifierGenerator for SequentialGenerator {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct FixedCount(u64);

    #[async_trait]
    impl RowCounter for FixedCount {
        async fn count(&self, _query: &Query) -> Result<u64> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_batch_numbering_continues_from_count() {
        let mut records = vec![
            Record::new().with("name", "a"),
            Record::new().with("name", "b"),
            Record::new().with("name", "c"),
        ];
        RowCountNumbering::default()
            .assign(&Query::table("t"), &mut records, &FixedCount(5))
            .await
            .unwrap();

        let ids: Vec<&Value> = records.iter().map(|r| r.get("id").unwrap()).collect();
        assert_eq!(ids, vec![&Value::UInt(6), &Value::UInt(7), &Value::UInt(8)]);
        assert_eq!(records[0].columns().next(), Some("id"));
    }

    #[tokio::test]
    async fn test_batch_numbering_custom_column() {
        let mut records = vec![Record::new().with("name", "a")];
        RowCountNumbering::new("seq")
            .assign(&Query::table("t"), &mut records, &FixedCount(0))
            .await
            .unwrap();
        assert_eq!(records[0].get("seq"), Some(&Value::UInt(1)));
    }

    #[test]
    fn test_day_range_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap().timestamp() as u64;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let id = id_in_day_range(now, &mut rng);
            assert!(id >= start && id <= now.timestamp() as u64);
        }
    }

    #[test]
    fn test_day_range_at_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(id_in_day_range(now, &mut rng), now.timestamp() as u64);
    }

    #[test]
    fn test_sequential_generator() {
        let g = SequentialGenerator::starting_at(100);
        assert_eq!(g.next_id(), 100);
        assert_eq!(g.next_id(), 101);
    }
}
