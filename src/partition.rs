/// Share of the global dataset owned by one worker: the contiguous half-open
/// range `[offset, offset + share)`.
///
/// Shares differ by at most one element, ranks carrying the larger remainder
/// share come first, and the ranges of all workers exactly tile
/// `[0, global_len)`. Computed once at solver construction and immutable
/// afterwards. A share may be empty when there are more workers than points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    global_len: usize,
    share: usize,
    offset: usize,
    workers: usize,
}

impl Partition {
    pub fn new(global_len: usize, rank: usize, workers: usize) -> Self {
        assert!(workers > 0, "partitioning over zero workers");
        assert!(rank < workers, "rank {} out of range for {} workers", rank, workers);

        let base = global_len / workers;
        let remainder = global_len % workers;
        let share = base + usize::from(rank < remainder);
        let offset = if rank < remainder {
            share * rank
        } else {
            (base + 1) * remainder + base * (rank - remainder)
        };
        Self { global_len, share, offset, workers }
    }

    pub fn global_len(&self) -> usize {
        self.global_len
    }

    pub fn share(&self) -> usize {
        self.share
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Global index range held by this worker.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.share
    }

    /// Rank of the worker owning the given global index. Needed whenever a
    /// single dataset point has to be fetched across workers (medoid
    /// projection, empty-cluster reseeding).
    pub fn rank_of(&self, global_index: usize) -> usize {
        assert!(global_index < self.global_len, "global index {} out of {}", global_index, self.global_len);
        let base = self.global_len / self.workers;
        let remainder = self.global_len % self.workers;
        let boundary = (base + 1) * remainder;
        if global_index < boundary {
            global_index / (base + 1)
        } else {
            remainder + (global_index - boundary) / base
        }
    }
}
