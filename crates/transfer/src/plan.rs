use serde::{Deserialize, Serialize};

/// One planned unit of work: the half-open byte interval `[offset, limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    /// 0-based position in the plan.
    pub order: u64,
    pub offset: u64,
    pub limit: u64,
    /// Set only on the trailing range that may be shorter than the chunk size.
    pub is_final: bool,
}

impl ChunkRange {
    /// Number of bytes in the range.
    pub fn len(&self) -> u64 {
        self.limit - self.offset
    }

    /// Returns `true` if the range covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.limit == self.offset
    }
}

/// Splits `total_size` bytes into ranges of `chunk_size`.
///
/// A non-empty file smaller than one chunk becomes a single final range.
/// Otherwise every full chunk gets its own range and any remainder is
/// appended as a shorter final range. An exact multiple has no final
/// range. Returns an empty plan for an empty file or a zero chunk size.
pub fn plan(total_size: u64, chunk_size: u64) -> Vec<ChunkRange> {
    if total_size == 0 || chunk_size == 0 {
        return Vec::new();
    }

    if total_size < chunk_size {
        return vec![ChunkRange {
            order: 0,
            offset: 0,
            limit: total_size,
            is_final: true,
        }];
    }

    let full = total_size / chunk_size;
    let remainder = total_size % chunk_size;

    let mut ranges: Vec<ChunkRange> = (0..full)
        .map(|order| ChunkRange {
            order,
            offset: order * chunk_size,
            limit: (order + 1) * chunk_size,
            is_final: false,
        })
        .collect();

    if remainder > 0 {
        ranges.push(ChunkRange {
            order: full,
            offset: total_size - remainder,
            limit: total_size,
            is_final: true,
        });
    }

    ranges
}

/// Number of ranges [`plan`] produces, without building them.
pub fn total_ranges(total_size: u64, chunk_size: u64) -> u64 {
    if total_size == 0 || chunk_size == 0 {
        return 0;
    }
    total_size.div_ceil(chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(total_size: u64, chunk_size: u64) {
        let ranges = plan(total_size, chunk_size);
        let mut expected_offset = 0;
        for (i, r) in ranges.iter().enumerate() {
            assert_eq!(r.order, i as u64, "orders must be contiguous");
            assert_eq!(r.offset, expected_offset, "gap or overlap at {i}");
            assert!(r.limit > r.offset, "empty range at {i}");
            assert!(r.len() <= chunk_size);
            assert_eq!(r.is_final, i == ranges.len() - 1 && r.len() < chunk_size);
            expected_offset = r.limit;
        }
        assert_eq!(expected_offset, total_size, "plan must cover the whole file");
        assert_eq!(ranges.len() as u64, total_ranges(total_size, chunk_size));
    }

    #[test]
    fn exact_multiple_has_no_final_range() {
        let ranges = plan(1_500_000, 500_000);
        assert_eq!(
            ranges,
            vec![
                ChunkRange { order: 0, offset: 0, limit: 500_000, is_final: false },
                ChunkRange { order: 1, offset: 500_000, limit: 1_000_000, is_final: false },
                ChunkRange { order: 2, offset: 1_000_000, limit: 1_500_000, is_final: false },
            ]
        );
    }

    #[test]
    fn remainder_becomes_final_range() {
        let ranges = plan(1_200_000, 500_000);
        assert_eq!(ranges.len(), 3);
        assert!(!ranges[0].is_final);
        assert!(!ranges[1].is_final);
        assert_eq!(
            ranges[2],
            ChunkRange { order: 2, offset: 1_000_000, limit: 1_200_000, is_final: true }
        );
    }

    #[test]
    fn small_file_is_single_range() {
        let ranges = plan(1234, 500_000);
        assert_eq!(
            ranges,
            vec![ChunkRange { order: 0, offset: 0, limit: 1234, is_final: true }]
        );
    }

    #[test]
    fn empty_file_has_no_ranges() {
        assert!(plan(0, 500_000).is_empty());
        assert_eq!(total_ranges(0, 500_000), 0);
    }

    #[test]
    fn zero_chunk_size_has_no_ranges() {
        assert!(plan(100, 0).is_empty());
        assert_eq!(total_ranges(100, 0), 0);
    }

    #[test]
    fn one_byte_chunks() {
        let ranges = plan(5, 1);
        assert_eq!(ranges.len(), 5);
        assert!(ranges.iter().all(|r| r.len() == 1 && !r.is_final));
    }

    #[test]
    fn partitions_many_sizes() {
        for chunk_size in [1, 2, 3, 7, 64, 1000, 500_000] {
            for total_size in [1, 2, 3, 6, 7, 8, 63, 64, 65, 999, 1000, 1001, 1_200_000] {
                assert_partition(total_size, chunk_size);
            }
        }
    }

    #[test]
    fn replanning_is_identical() {
        assert_eq!(plan(1_234_567, 4096), plan(1_234_567, 4096));
    }

    #[test]
    fn remaining_ranges_by_order() {
        let ranges = plan(1_200_000, 500_000);
        let sent_count = 1;
        let remaining: Vec<_> = ranges.iter().filter(|r| r.order >= sent_count).collect();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].offset, 500_000);
    }
}
