use serde::{Deserialize, Serialize};

/// An abstract pointer into a partition's message sequence.
///
/// `Offset(o)` with `o >= 0` is an absolute offset. A negative offset is
/// relative to the end of the partition: `-1 - k` denotes the k-th-from-last
/// message, so `Offset(-1 - n)` selects the last `n` messages. Negative
/// offsets and `End` are only meaningful once the partition's high watermark
/// (or file count) is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchPosition {
    Start,
    End,
    Offset(i64),
    /// Epoch milliseconds; resolved to the first offset at/after this time.
    Timestamp(i64),
}

impl FetchPosition {
    /// Whether this position counts backwards from the end of the partition.
    pub fn is_from_end(&self) -> bool {
        match self {
            FetchPosition::End => true,
            FetchPosition::Offset(o) => *o < 0,
            _ => false,
        }
    }

    /// Resolve this position to an absolute offset within `[low, high]`.
    ///
    /// `high` is the high watermark, i.e. the offset one past the last
    /// message. Negative offsets map as `high + 1 + offset`, so the `-1 - n`
    /// sentinel lands `n` messages before the end. `Timestamp` positions must
    /// be translated to offsets by the backend before resolving.
    pub fn resolve(&self, low: i64, high: i64) -> i64 {
        match self {
            FetchPosition::Start => low,
            FetchPosition::End => high,
            FetchPosition::Offset(o) if *o >= 0 => (*o).clamp(low, high),
            FetchPosition::Offset(o) => (high + 1 + o).max(low),
            // callers translate timestamps via the backend first
            FetchPosition::Timestamp(_) => low,
        }
    }
}

/// What to fetch: where to start, an optional inclusive upper bound, and a
/// cap on the total number of messages across all partitions involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    pub start: FetchPosition,
    pub end: Option<FetchPosition>,
    pub limit: usize,
}

impl FetchOptions {
    pub fn new(start: FetchPosition, limit: usize) -> Self {
        Self {
            start,
            end: None,
            limit,
        }
    }

    pub fn with_end(mut self, end: FetchPosition) -> Self {
        self.end = Some(end);
        self
    }

    /// Split these options into one `FetchOptions` per partition.
    ///
    /// The limit is distributed by [`distribute_limit`]. A from-end start
    /// becomes the per-partition sentinel `-1 - share`, meaning "the last
    /// `share` messages of this partition" once resolved against that
    /// partition's high watermark.
    pub fn split_across(&self, partitions: usize) -> Vec<FetchOptions> {
        distribute_limit(self.limit, partitions)
            .into_iter()
            .map(|share| {
                let start = match self.start {
                    FetchPosition::End => FetchPosition::Offset(-1 - share as i64),
                    FetchPosition::Offset(o) if o < 0 => FetchPosition::Offset(-1 - share as i64),
                    other => other,
                };
                FetchOptions {
                    start,
                    end: self.end,
                    limit: share,
                }
            })
            .collect()
    }
}

/// Distribute `limit` across `partitions` so the shares sum exactly to
/// `limit`: partition `i` receives `remaining / (partitions - i)`, which is
/// then subtracted from `remaining`. The rule is deliberately kept identical
/// to the upstream iteration order, including which partitions absorb the
/// remainder when the limit does not divide evenly.
pub fn distribute_limit(limit: usize, partitions: usize) -> Vec<usize> {
    let mut shares = Vec::with_capacity(partitions);
    let mut remaining = limit;
    for i in 0..partitions {
        let share = remaining / (partitions - i);
        remaining -= share;
        shares.push(share);
    }
    shares
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_sum_to_limit() {
        for limit in 0..50 {
            for n in 1..10 {
                let shares = distribute_limit(limit, n);
                assert_eq!(shares.len(), n);
                assert_eq!(shares.iter().sum::<usize>(), limit, "limit={limit} n={n}");
            }
        }
    }

    #[test]
    fn uneven_limit_pins_literal_shares() {
        assert_eq!(distribute_limit(5, 2), vec![2, 3]);
        assert_eq!(distribute_limit(10, 3), vec![3, 3, 4]);
        assert_eq!(distribute_limit(2, 2), vec![1, 1]);
        assert_eq!(distribute_limit(0, 3), vec![0, 0, 0]);
    }

    #[test]
    fn resolve_absolute_offsets() {
        assert_eq!(FetchPosition::Start.resolve(3, 100), 3);
        assert_eq!(FetchPosition::End.resolve(3, 100), 100);
        assert_eq!(FetchPosition::Offset(50).resolve(3, 100), 50);
        // clamped against the watermarks
        assert_eq!(FetchPosition::Offset(1).resolve(3, 100), 3);
        assert_eq!(FetchPosition::Offset(500).resolve(3, 100), 100);
    }

    #[test]
    fn resolve_from_end_offsets() {
        // -1 - n selects the last n messages
        assert_eq!(FetchPosition::Offset(-1 - 10).resolve(0, 100), 90);
        assert_eq!(FetchPosition::Offset(-1).resolve(0, 100), 100);
        // never before the low watermark
        assert_eq!(FetchPosition::Offset(-1 - 10).resolve(95, 100), 95);
    }

    #[test]
    fn split_rewrites_from_end_sentinels() {
        let options = FetchOptions::new(FetchPosition::Offset(-1), 10);
        let per_partition = options.split_across(2);
        assert_eq!(per_partition[0].start, FetchPosition::Offset(-6));
        assert_eq!(per_partition[0].limit, 5);
        assert_eq!(per_partition[1].start, FetchPosition::Offset(-6));
        assert_eq!(per_partition[1].limit, 5);
    }

    #[test]
    fn split_keeps_absolute_starts() {
        let options = FetchOptions::new(FetchPosition::Offset(7), 9);
        let per_partition = options.split_across(2);
        assert_eq!(per_partition[0].start, FetchPosition::Offset(7));
        assert_eq!(per_partition[0].limit, 4);
        assert_eq!(per_partition[1].start, FetchPosition::Offset(7));
        assert_eq!(per_partition[1].limit, 5);
    }
}
