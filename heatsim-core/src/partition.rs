use crate::error::{HeatError, HeatResult};

/// Half-open span of grid rows owned by one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, row: usize) -> bool {
        self.start <= row && row < self.end
    }
}

/// Split `interior_rows` rows between `workers`, starting at grid row 1.
///
/// Worker `i` gets `interior_rows / workers` rows plus one more while
/// `i < interior_rows % workers`. Surplus workers receive empty ranges placed
/// after the last populated one.
pub fn partition(interior_rows: usize, workers: usize) -> HeatResult<Vec<RowRange>> {
    if workers == 0 {
        return Err(HeatError::InvalidParameter {
            name: "worker_count",
            value: 0.0,
            reason: "at least one worker is required",
        });
    }

    let base = interior_rows / workers;
    let rem = interior_rows % workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut cursor = 1;
    for rank in 0..workers {
        let len = base + usize::from(rank < rem);
        ranges.push(RowRange {
            start: cursor,
            end: cursor + len,
        });
        cursor += len;
    }
    Ok(ranges)
}

/// Ranges covering `[1, rows - 1)` of a plate with `rows` rows.
pub fn partition_grid(rows: usize, workers: usize) -> HeatResult<Vec<RowRange>> {
    partition(rows.saturating_sub(2), workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(rows: usize, ranges: &[RowRange]) {
        let mut expected = 1;
        for r in ranges {
            assert_eq!(r.start, expected, "gap or overlap at {r:?}");
            expected = r.end;
        }
        assert_eq!(expected, rows - 1);
    }

    #[test]
    fn even_split() {
        let ranges = partition(8, 4).unwrap();
        assert!(ranges.iter().all(|r| r.len() == 2));
        assert_eq!(ranges[0], RowRange { start: 1, end: 3 });
        assert_eq!(ranges[3], RowRange { start: 7, end: 9 });
    }

    #[test]
    fn remainder_goes_to_lowest_ranks() {
        let lens: Vec<usize> = partition(10, 4).unwrap().iter().map(RowRange::len).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
    }

    #[test]
    fn surplus_workers_get_empty_tail() {
        let ranges = partition(2, 8).unwrap();
        assert_eq!(ranges.len(), 8);
        assert_eq!(ranges.iter().filter(|r| r.is_empty()).count(), 6);
        assert!(ranges[2..].iter().all(RowRange::is_empty));
        assert_exact_cover(4, &ranges);
    }

    #[test]
    fn zero_workers_is_invalid() {
        assert!(matches!(
            partition(5, 0),
            Err(HeatError::InvalidParameter { name: "worker_count", .. })
        ));
    }

    #[test]
    fn exact_cover_for_many_shapes() {
        for rows in 3..40 {
            for workers in 1..12 {
                let ranges = partition_grid(rows, workers).unwrap();
                assert_eq!(ranges.len(), workers);
                assert_exact_cover(rows, &ranges);
                let max = ranges.iter().map(RowRange::len).max().unwrap();
                let min = ranges.iter().map(RowRange::len).min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn contains_is_half_open() {
        let r = RowRange { start: 2, end: 4 };
        assert!(!r.contains(1));
        assert!(r.contains(2));
        assert!(r.contains(3));
        assert!(!r.contains(4));
    }
}
