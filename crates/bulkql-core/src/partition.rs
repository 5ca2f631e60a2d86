//! Splitting record sets into batches that fit a parameter budget

use crate::{BulkqlError, Result};

/// Batch sizing derived from a per-record parameter count and a ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    params_per_record: usize,
    param_ceiling: usize,
    batch_size: usize,
}

impl BatchPlan {
    /// Compute `floor(param_ceiling / params_per_record)` records per batch.
    pub fn new(params_per_record: usize, param_ceiling: usize) -> Result<Self> {
        if params_per_record == 0 {
            return Err(BulkqlError::NoColumns);
        }
        let batch_size = param_ceiling / params_per_record;
        if batch_size == 0 {
            return Err(BulkqlError::BatchSizeTooSmall {
                params_per_record,
                ceiling: param_ceiling,
            });
        }
        Ok(Self {
            params_per_record,
            param_ceiling,
            batch_size,
        })
    }

    /// Maximum records per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn params_per_record(&self) -> usize {
        self.params_per_record
    }

    pub fn param_ceiling(&self) -> usize {
        self.param_ceiling
    }

    /// Number of batches needed for `record_count` records
    pub fn batch_count(&self, record_count: usize) -> usize {
        record_count.div_ceil(self.batch_size)
    }

    /// Consecutive, order-preserving slices of at most `batch_size` records
    pub fn batches<'r, T>(&self, records: &'r [T]) -> std::slice::Chunks<'r, T> {
        records.chunks(self.batch_size)
    }
}

/// Partition `records` into batches whose parameter count stays within `param_ceiling`.
///
/// Empty input yields no batches.
pub fn partition<T>(
    records: &[T],
    params_per_record: usize,
    param_ceiling: usize,
) -> Result<Vec<&[T]>> {
    let plan = BatchPlan::new(params_per_record, param_ceiling)?;
    Ok(plan.batches(records).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_from_ceiling() {
        let plan = BatchPlan::new(700, 2099).unwrap();
        assert_eq!(plan.batch_size(), 2);
    }

    #[test]
    fn test_five_records_of_seven_hundred_params() {
        let records: Vec<u32> = (0..5).collect();
        let batches = partition(&records, 700, 2099).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_batches_cover_input_in_order() {
        let records: Vec<u32> = (0..1000).collect();
        for params in [1usize, 3, 7, 64, 2099] {
            let batches = partition(&records, params, 2099).unwrap();
            let flattened: Vec<u32> = batches.iter().flat_map(|b| b.iter().copied()).collect();
            assert_eq!(flattened, records);
            assert!(batches.iter().all(|b| b.len() * params <= 2099));
            assert!(batches.iter().all(|b| !b.is_empty()));
        }
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let records: Vec<u32> = Vec::new();
        assert!(partition(&records, 4, 2099).unwrap().is_empty());
    }

    #[test]
    fn test_record_wider_than_ceiling() {
        let err = BatchPlan::new(2100, 2099).unwrap_err();
        assert!(matches!(
            err,
            BulkqlError::BatchSizeTooSmall {
                params_per_record: 2100,
                ceiling: 2099
            }
        ));
    }

    #[test]
    fn test_record_exactly_at_ceiling() {
        let plan = BatchPlan::new(2099, 2099).unwrap();
        assert_eq!(plan.batch_size(), 1);
        assert_eq!(plan.batch_count(3), 3);
    }

    #[test]
    fn test_zero_params_rejected() {
        assert!(matches!(BatchPlan::new(0, 2099), Err(BulkqlError::NoColumns)));
    }
}
