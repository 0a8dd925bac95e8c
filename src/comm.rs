use crate::{Point, Primitive};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// One message on a worker-to-worker channel.
///
/// Every exchange in the protocol is one of these shapes; receiving a shape
/// other than the expected one means the two workers disagree about where in
/// the protocol they are, which is not recoverable.
enum Packet<T: Primitive> {
    Reals(Vec<T>),
    Ints(Vec<i64>),
    /// Value + global index, for minimum-location reductions.
    Loc(T, u64),
    /// A dataset point, label included (the point-to-point shape the output
    /// collection uses).
    Point { coords: Vec<T>, label: i64 },
}

/// Handle to the fixed worker set, owned by exactly one worker.
///
/// All collective operations are blocking and must be entered by every
/// worker of the set; a worker that branches around one deadlocks the run.
/// Reductions are implemented as reduce-to-rank-0 followed by a broadcast,
/// so every collective doubles as a synchronization point: once it returns,
/// the reduced value is bit-for-bit identical on all workers.
pub struct Communicator<T: Primitive> {
    rank: usize,
    size: usize,
    /// txs[j] sends to worker j; rxs[i] receives from worker i.
    txs: Vec<Sender<Packet<T>>>,
    rxs: Vec<Receiver<Packet<T>>>,
}

impl<T: Primitive> Communicator<T> {
    /// Build the full channel mesh for a worker set of the given size.
    /// Returns one communicator per rank, in rank order.
    pub fn mesh(size: usize) -> Vec<Communicator<T>> {
        assert!(size > 0, "communicator mesh of size zero");

        // chans[i][j]: channel carrying messages from worker i to worker j
        let chans: Vec<Vec<(Sender<Packet<T>>, Receiver<Packet<T>>)>> =
            (0..size).map(|_| (0..size).map(|_| unbounded()).collect()).collect();

        let mut rx_sides: Vec<Vec<Receiver<Packet<T>>>> = (0..size).map(|_| Vec::new()).collect();
        let mut tx_sides: Vec<Vec<Sender<Packet<T>>>> = (0..size).map(|_| Vec::new()).collect();
        for (i, row) in chans.into_iter().enumerate() {
            for (j, (tx, rx)) in row.into_iter().enumerate() {
                tx_sides[i].push(tx);
                rx_sides[j].push(rx);
            }
        }

        tx_sides.into_iter().zip(rx_sides)
            .enumerate()
            .map(|(rank, (txs, rxs))| Communicator { rank, size, txs, rxs })
            .collect()
    }

    /// Communicator for a single worker; every collective degrades to a
    /// local no-op. Used by the sequential reference strategy.
    pub fn single() -> Communicator<T> {
        Self::mesh(1).pop().unwrap()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn send(&self, to: usize, packet: Packet<T>) {
        self.txs[to].send(packet)
            .unwrap_or_else(|_| panic!("worker {} vanished mid-protocol", to));
    }

    fn recv(&self, from: usize) -> Packet<T> {
        self.rxs[from].recv()
            .unwrap_or_else(|_| panic!("worker {} vanished mid-protocol", from))
    }

    fn recv_reals(&self, from: usize) -> Vec<T> {
        match self.recv(from) {
            Packet::Reals(v) => v,
            _ => panic!("protocol mismatch: expected reals from worker {}", from),
        }
    }

    fn recv_ints(&self, from: usize) -> Vec<i64> {
        match self.recv(from) {
            Packet::Ints(v) => v,
            _ => panic!("protocol mismatch: expected ints from worker {}", from),
        }
    }

    /// Send one labelled point to a specific worker.
    pub fn send_point(&self, to: usize, point: &Point<T>) {
        self.send(to, Packet::Point { coords: point.coords().to_vec(), label: point.label() });
    }

    /// Receive one labelled point from a specific worker.
    pub fn recv_point(&self, from: usize) -> Point<T> {
        match self.recv(from) {
            Packet::Point { coords, label } => {
                let mut p = Point::new(coords);
                p.set_label(label);
                p
            }
            _ => panic!("protocol mismatch: expected a point from worker {}", from),
        }
    }

    pub fn send_i64s(&self, to: usize, values: &[i64]) {
        self.send(to, Packet::Ints(values.to_vec()));
    }

    pub fn recv_i64s(&self, from: usize) -> Vec<i64> {
        self.recv_ints(from)
    }

    /// Componentwise global sum of `buf` across all workers. On return every
    /// worker holds the identical reduced buffer.
    pub fn all_reduce_sum(&self, buf: &mut [T]) {
        if self.size == 1 {
            return;
        }
        if self.rank == 0 {
            for peer in 1..self.size {
                let part = self.recv_reals(peer);
                assert_eq!(part.len(), buf.len(), "reduction length mismatch from worker {}", peer);
                buf.iter_mut().zip(part).for_each(|(b, p)| *b += p);
            }
            for peer in 1..self.size {
                self.send(peer, Packet::Reals(buf.to_vec()));
            }
        } else {
            self.send(0, Packet::Reals(buf.to_vec()));
            let reduced = self.recv_reals(0);
            buf.copy_from_slice(&reduced);
        }
    }

    /// Componentwise global sum for integer quantities (counts, change
    /// tallies, contingency tables).
    pub fn all_reduce_sum_i64(&self, buf: &mut [i64]) {
        if self.size == 1 {
            return;
        }
        if self.rank == 0 {
            for peer in 1..self.size {
                let part = self.recv_ints(peer);
                assert_eq!(part.len(), buf.len(), "reduction length mismatch from worker {}", peer);
                buf.iter_mut().zip(part).for_each(|(b, p)| *b += p);
            }
            for peer in 1..self.size {
                self.send(peer, Packet::Ints(buf.to_vec()));
            }
        } else {
            self.send(0, Packet::Ints(buf.to_vec()));
            let reduced = self.recv_ints(0);
            buf.copy_from_slice(&reduced);
        }
    }

    /// Global maximum of one scalar.
    pub fn all_reduce_max(&self, value: T) -> T {
        if self.size == 1 {
            return value;
        }
        if self.rank == 0 {
            let mut max = value;
            for peer in 1..self.size {
                let part = self.recv_reals(peer);
                if part[0] > max {
                    max = part[0];
                }
            }
            for peer in 1..self.size {
                self.send(peer, Packet::Reals(vec![max]));
            }
            max
        } else {
            self.send(0, Packet::Reals(vec![value]));
            self.recv_reals(0)[0]
        }
    }

    /// Global minimum of a `(value, global index)` pair, ties broken by the
    /// lower index. The fixed scan order (ascending rank, each rank having
    /// scanned ascending indices) makes the winner deterministic.
    pub fn all_reduce_min_loc(&self, value: T, index: usize) -> (T, usize) {
        if self.size == 1 {
            return (value, index);
        }
        if self.rank == 0 {
            let (mut best_val, mut best_idx) = (value, index);
            for peer in 1..self.size {
                let (val, idx) = match self.recv(peer) {
                    Packet::Loc(v, i) => (v, i as usize),
                    _ => panic!("protocol mismatch: expected a min-loc pair from worker {}", peer),
                };
                if val < best_val || (val == best_val && idx < best_idx) {
                    best_val = val;
                    best_idx = idx;
                }
            }
            for peer in 1..self.size {
                self.send(peer, Packet::Loc(best_val, best_idx as u64));
            }
            (best_val, best_idx)
        } else {
            self.send(0, Packet::Loc(value, index as u64));
            match self.recv(0) {
                Packet::Loc(v, i) => (v, i as usize),
                _ => panic!("protocol mismatch: expected a min-loc pair from worker 0"),
            }
        }
    }

    /// Replicate `buf` from `root` onto every worker.
    pub fn broadcast(&self, root: usize, buf: &mut Vec<T>) {
        if self.size == 1 {
            return;
        }
        if self.rank == root {
            for peer in 0..self.size {
                if peer != root {
                    self.send(peer, Packet::Reals(buf.clone()));
                }
            }
        } else {
            *buf = self.recv_reals(root);
        }
    }

    /// Replicate an integer buffer from `root` onto every worker.
    pub fn broadcast_i64s(&self, root: usize, buf: &mut Vec<i64>) {
        if self.size == 1 {
            return;
        }
        if self.rank == root {
            for peer in 0..self.size {
                if peer != root {
                    self.send(peer, Packet::Ints(buf.clone()));
                }
            }
        } else {
            *buf = self.recv_ints(root);
        }
    }

    /// Block until every worker of the set has arrived here.
    pub fn barrier(&self) {
        let mut token = [0i64];
        self.all_reduce_sum_i64(&mut token);
    }
}

/// Fixed-size SPMD harness: spawn `workers` threads, hand each its
/// communicator, and collect the per-rank results in rank order.
///
/// The worker set is static for the lifetime of the run; there is no
/// elasticity and no cancellation path. A panicking worker aborts the run.
pub fn run<T, R, F>(workers: usize, f: F) -> Vec<R>
where
    T: Primitive,
    R: Send,
    F: Fn(Communicator<T>) -> R + Sync,
{
    let comms = Communicator::mesh(workers);
    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms.into_iter()
            .map(|comm| scope.spawn(move || f(comm)))
            .collect();
        handles.into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_reduce_sum_replicates_the_total() {
        let results = run::<f64, _, _>(3, |comm| {
            let rank = comm.rank() as f64;
            let mut buf = vec![rank, 2.0 * rank];
            comm.all_reduce_sum(&mut buf);
            buf
        });
        for buf in results {
            assert_eq!(buf, vec![3.0, 6.0]);
        }
    }

    #[test]
    fn all_reduce_sum_i64_counts() {
        let results = run::<f64, _, _>(4, |comm| {
            let mut counts = vec![1i64, comm.rank() as i64];
            comm.all_reduce_sum_i64(&mut counts);
            counts
        });
        for counts in results {
            assert_eq!(counts, vec![4, 6]);
        }
    }

    #[test]
    fn all_reduce_max_picks_the_largest() {
        let results = run::<f64, _, _>(3, |comm| comm.all_reduce_max(comm.rank() as f64));
        assert_eq!(results, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn min_loc_breaks_ties_by_lowest_index() {
        // all workers report the same value with different indices
        let results = run::<f64, _, _>(3, |comm| comm.all_reduce_min_loc(1.0, 10 + comm.rank()));
        for (val, idx) in results {
            assert_eq!(val, 1.0);
            assert_eq!(idx, 10);
        }
    }

    #[test]
    fn broadcast_replicates_from_root() {
        let results = run::<f64, _, _>(3, |comm| {
            let mut buf = if comm.rank() == 1 { vec![7.0, 8.0] } else { Vec::new() };
            comm.broadcast(1, &mut buf);
            buf
        });
        for buf in results {
            assert_eq!(buf, vec![7.0, 8.0]);
        }
    }

    #[test]
    fn broadcast_i64s_replicates_from_root() {
        let results = run::<f64, _, _>(3, |comm| {
            let mut buf = if comm.rank() == 2 { vec![4i64, -1] } else { Vec::new() };
            comm.broadcast_i64s(2, &mut buf);
            buf
        });
        for buf in results {
            assert_eq!(buf, vec![4, -1]);
        }
    }

    #[test]
    fn point_roundtrip_carries_the_label() {
        let results = run::<f64, _, _>(2, |comm| {
            if comm.rank() == 0 {
                let mut p = Point::new(vec![1.0, 2.0]);
                p.set_label(5);
                comm.send_point(1, &p);
                None
            } else {
                Some(comm.recv_point(0))
            }
        });
        let p = results[1].as_ref().unwrap();
        assert_eq!(p.coords(), &[1.0, 2.0]);
        assert_eq!(p.label(), 5);
    }

    #[test]
    fn single_worker_collectives_are_noops() {
        let comm = Communicator::<f64>::single();
        let mut buf = vec![1.0, 2.0];
        comm.all_reduce_sum(&mut buf);
        assert_eq!(buf, vec![1.0, 2.0]);
        assert_eq!(comm.all_reduce_max(4.0), 4.0);
        assert_eq!(comm.all_reduce_min_loc(0.5, 3), (0.5, 3));
        comm.barrier();
    }
}
