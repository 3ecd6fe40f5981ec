/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::collections::VecDeque;
use std::thread;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("a worker thread exited before returning its work")]
    WorkerLost,
}

/// The result of offering an item to the pool.
#[derive(Debug, PartialEq, Eq)]
pub enum Submit<T> {
    Accepted,
    /// the in-flight bound is reached; the item is handed back
    WouldBlock(T),
}

struct Job<T> {
    item: T,
    // single slot channel on which this item comes back
    reply: Sender<T>,
}

/// A fixed set of worker threads that apply the same function to every
/// submitted item, and give the items back in exactly the order they
/// were submitted.
///
/// Every submission gets its own one-slot reply channel, and the
/// receiving ends are kept in a FIFO. Popping the front of that queue
/// and blocking on it is all that is needed to restore the submission
/// order; nothing is ever sorted. The length of the FIFO is the number
/// of items in flight, and it is never allowed to exceed `capacity`.
pub struct OrderedPool<T: Send + 'static> {
    jobs: Sender<Job<T>>,
    pending: VecDeque<Receiver<T>>,
    capacity: usize,
    max_in_flight: usize,
    workers: Vec<thread::JoinHandle<usize>>,
}

impl<T: Send + 'static> OrderedPool<T> {
    /// Spawn `num_workers` threads, each running `work` on the items it
    /// receives. At most `capacity` items are in flight at once.
    pub fn new<F>(num_workers: usize, capacity: usize, work: F) -> Self
    where
        F: Fn(&mut T) + Send + Clone + 'static,
    {
        let num_workers = num_workers.max(1);
        let capacity = capacity.max(1);
        let (tx, rx) = bounded::<Job<T>>(capacity);

        let mut workers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let rx = rx.clone();
            let work = work.clone();
            let handle = thread::spawn(move || {
                let mut nprocessed = 0usize;
                // the loop ends once the pool drops its sender and
                // the job queue is empty
                for mut job in rx.iter() {
                    work(&mut job.item);
                    nprocessed += 1;
                    // the only way this fails is if the pool was dropped
                    // without collecting the result; nothing to do then.
                    let _ = job.reply.send(job.item);
                }
                nprocessed
            });
            workers.push(handle);
        }

        OrderedPool {
            jobs: tx,
            pending: VecDeque::with_capacity(capacity),
            capacity,
            max_in_flight: 0,
            workers,
        }
    }

    /// Hand `item` to the workers unless `capacity` items are already in
    /// flight, in which case it is returned untouched.
    pub fn try_submit(&mut self, item: T) -> Result<Submit<T>, PoolError> {
        if self.pending.len() >= self.capacity {
            return Ok(Submit::WouldBlock(item));
        }
        let (reply, result) = bounded(1);
        self.jobs
            .send(Job { item, reply })
            .map_err(|_| PoolError::WorkerLost)?;
        self.pending.push_back(result);
        self.max_in_flight = self.max_in_flight.max(self.pending.len());
        Ok(Submit::Accepted)
    }

    /// Block until the oldest in-flight item is done and return it.
    /// `Ok(None)` when nothing is in flight.
    pub fn next_result(&mut self) -> Result<Option<T>, PoolError> {
        match self.pending.pop_front() {
            None => Ok(None),
            Some(rx) => rx.recv().map(Some).map_err(|_| PoolError::WorkerLost),
        }
    }

    /// Like `next_result`, but returns `Ok(None)` rather than waiting if
    /// the oldest item is not done yet.
    pub fn try_next_result(&mut self) -> Result<Option<T>, PoolError> {
        let Some(front) = self.pending.front() else {
            return Ok(None);
        };
        match front.try_recv() {
            Ok(v) => {
                self.pending.pop_front();
                Ok(Some(v))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PoolError::WorkerLost),
        }
    }

    #[inline(always)]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// the largest number of items that were ever in flight at once
    #[inline(always)]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Close the job queue and wait for the workers to exit. Returns the
    /// number of items each worker processed. Results that were never
    /// collected are discarded.
    pub fn join(self) -> Result<Vec<usize>, PoolError> {
        let OrderedPool { jobs, workers, .. } = self;
        drop(jobs);
        let mut counts = Vec::with_capacity(workers.len());
        for h in workers {
            counts.push(h.join().map_err(|_| PoolError::WorkerLost)?);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_results_come_back_in_submission_order() {
        // later items finish first
        let mut pool = OrderedPool::new(4, 8, |x: &mut u64| {
            thread::sleep(Duration::from_millis(8 - (*x % 8)));
            *x *= 10;
        });
        let mut out = Vec::new();
        for i in 0..8u64 {
            assert_eq!(pool.try_submit(i).unwrap(), Submit::Accepted);
        }
        while let Some(v) = pool.next_result().unwrap() {
            out.push(v);
        }
        assert_eq!(out, (0..8u64).map(|i| i * 10).collect::<Vec<_>>());
        let counts = pool.join().unwrap();
        assert_eq!(counts.iter().sum::<usize>(), 8);
    }

    #[test]
    fn test_submission_is_bounded() {
        let mut pool = OrderedPool::new(2, 3, |x: &mut u32| *x += 1);
        for i in 0..3u32 {
            assert_eq!(pool.try_submit(i).unwrap(), Submit::Accepted);
        }
        assert_eq!(pool.in_flight(), 3);
        assert_eq!(pool.try_submit(99).unwrap(), Submit::WouldBlock(99));

        assert_eq!(pool.next_result().unwrap(), Some(1));
        assert_eq!(pool.try_submit(99).unwrap(), Submit::Accepted);
        assert_eq!(pool.max_in_flight(), 3);

        let mut rest = Vec::new();
        while let Some(v) = pool.next_result().unwrap() {
            rest.push(v);
        }
        assert_eq!(rest, vec![2, 3, 100]);
        assert_eq!(pool.next_result().unwrap(), None);
        pool.join().unwrap();
    }

    #[test]
    fn test_try_next_result() {
        let mut pool = OrderedPool::new(1, 2, |x: &mut u8| *x += 1);
        assert_eq!(pool.try_next_result().unwrap(), None);
        pool.try_submit(1).unwrap();
        // spin until the single item is done
        let v = loop {
            if let Some(v) = pool.try_next_result().unwrap() {
                break v;
            }
            thread::yield_now();
        };
        assert_eq!(v, 2);
        assert_eq!(pool.in_flight(), 0);
        pool.join().unwrap();
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let mut pool = OrderedPool::new(1, 2, |x: &mut u8| {
            if *x == 0 {
                panic!("boom");
            }
        });
        pool.try_submit(0).unwrap();
        assert_eq!(pool.next_result(), Err(PoolError::WorkerLost));
    }
}
