//! Background loading. Jobs are split into two halves: [`Job::work`] runs on one of the worker
//! threads and may only touch what the job captured when it was created (file handles, archives,
//! its own buffers), while [`Job::complete`] runs on the thread that owns the queue, after `work`
//! has returned, and is the only place where shared state (the context `C`) gets mutated.
//!
//! Completions are applied in the order the jobs finished their work, not in submission order.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use itertools::Itertools;
use log::{error, trace, warn};

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    Queued,
    Executing,
    Completed,
}

pub trait Job<C>: Send {
    fn name(&self) -> &str;

    /// The expensive part: I/O and decoding. Must not fail the queue, errors are kept in the job
    /// until [`Job::complete`] gets to report them.
    fn work(&mut self);

    fn complete(self: Box<Self>, context: &mut C);

    /// Called instead of [`Job::complete`] when [`Job::work`] panicked.
    fn abandon(self: Box<Self>, _context: &mut C, reason: &str) {
        error!("Job {} panicked and has been dropped: {}", self.name(), reason);
    }
}

struct Ticket<C> {
    id: JobId,
    state: JobState,
    panic: Option<String>,
    job: Box<dyn Job<C>>,
}

impl<C> Ticket<C> {
    fn advance(&mut self, next: JobState) {
        debug_assert!(next > self.state, "job {} went from {:?} to {:?}", self.id, self.state, next);
        self.state = next;
    }

    fn execute(&mut self) {
        self.advance(JobState::Executing);
        profiling::scope!("Job::work");

        if let Err(reason) = work_isolated(|| self.job.work()) {
            self.panic = Some(reason);
        }
    }

    fn finish(mut self, context: &mut C) {
        self.advance(JobState::Completed);

        let Ticket { id, panic, job, .. } = self;
        trace!("Completing job {} ({})", id, job.name());
        match panic {
            Some(reason) => job.abandon(context, &reason),
            None => job.complete(context),
        }
    }
}

/// Runs a job's work, turning a panic into the panic's message the same way the workers do.
pub fn work_isolated(work: impl FnOnce()) -> Result<(), String> {
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A pool of named worker threads consuming submitted jobs, and the completion channel that
/// brings finished jobs back to the owner.
pub struct JobQueue<C> {
    sender: Option<Sender<Ticket<C>>>,
    completions: Receiver<Ticket<C>>,
    /// Jobs whose work is done, waiting for their completion.
    finished: VecDeque<Ticket<C>>,
    workers: Vec<JoinHandle<()>>,
    next_id: JobId,
    in_flight: usize,
}

impl<C: 'static> JobQueue<C> {
    pub fn new(worker_count: usize) -> Self {
        let (sender, jobs) = crossbeam_channel::unbounded::<Ticket<C>>();
        let (done, completions) = crossbeam_channel::unbounded::<Ticket<C>>();

        let workers = (0..worker_count.max(1))
            .map(|index| {
                let jobs = jobs.clone();
                let done = done.clone();
                std::thread::Builder::new()
                    .name(format!("Asset Worker {}", index))
                    .spawn(move || Self::run_worker(jobs, done))
                    .expect("Spawning an Asset Worker Thread succeeds")
            })
            .collect_vec();

        Self {
            sender: Some(sender),
            completions,
            finished: VecDeque::new(),
            workers,
            next_id: 0,
            in_flight: 0,
        }
    }

    fn run_worker(jobs: Receiver<Ticket<C>>, done: Sender<Ticket<C>>) {
        // Blocks until the next job arrives and ends once the queue has been dropped.
        for mut ticket in jobs.iter() {
            ticket.execute();
            if done.send(ticket).is_err() {
                warn!("Completion channel has been closed, stopping worker");
                return;
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs that have been submitted, but not completed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn submit(&mut self, job: Box<dyn Job<C>>) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        self.in_flight += 1;

        trace!("Queueing job {} ({})", id, job.name());
        let ticket = Ticket {
            id,
            state: JobState::Queued,
            panic: None,
            job,
        };

        let rejected = match &self.sender {
            Some(sender) => sender.send(ticket).err().map(|err| err.into_inner()),
            None => Some(ticket),
        };

        if let Some(mut ticket) = rejected {
            // No worker is left to take it, so it has to happen here, it still completes normally.
            error!("No asset worker available, running job {} on the calling thread", id);
            ticket.execute();
            self.finished.push_back(ticket);
        }

        id
    }

    /// Runs a job's work and completion right away on the calling thread.
    pub fn run_sync(&mut self, job: Box<dyn Job<C>>, context: &mut C) {
        let mut ticket = Ticket {
            id: self.next_id,
            state: JobState::Queued,
            panic: None,
            job,
        };
        self.next_id += 1;

        ticket.execute();
        ticket.finish(context);
    }

    fn next_finished(&mut self) -> Option<Ticket<C>> {
        self.finished
            .pop_front()
            .or_else(|| self.completions.try_recv().ok())
    }

    fn finish(&mut self, ticket: Ticket<C>, context: &mut C) {
        self.in_flight -= 1;
        ticket.finish(context);
    }

    /// Completes every job that has finished its work so far, without blocking.
    pub fn process_completions(&mut self, context: &mut C) -> usize {
        profiling::scope!("JobQueue::process_completions");
        let mut completed = 0;
        while let Some(ticket) = self.next_finished() {
            self.finish(ticket, context);
            completed += 1;
        }
        completed
    }

    /// Waits up to `timeout` for at least one job to finish, then completes everything that is ready.
    pub fn wait_for_completions(&mut self, context: &mut C, timeout: Duration) -> usize {
        if self.in_flight == 0 {
            return 0;
        }

        if self.finished.is_empty() {
            match self.completions.recv_timeout(timeout) {
                Ok(ticket) => self.finished.push_back(ticket),
                Err(RecvTimeoutError::Timeout) => return 0,
                Err(RecvTimeoutError::Disconnected) => {
                    error!("All asset workers are gone, {} jobs will never complete", self.in_flight);
                    return 0;
                }
            }
        }

        self.process_completions(context)
    }

    /// Blocks until every submitted job has completed.
    pub fn wait_idle(&mut self, context: &mut C) {
        while self.in_flight > 0 {
            if !self.finished.is_empty() {
                self.process_completions(context);
                continue;
            }

            match self.completions.recv() {
                Ok(ticket) => self.finish(ticket, context),
                Err(_) => {
                    error!("All asset workers are gone, {} jobs will never complete", self.in_flight);
                    return;
                }
            }
        }
    }
}

impl<C> Drop for JobQueue<C> {
    fn drop(&mut self) {
        if self.in_flight > 0 {
            warn!("Dropping the job queue with {} jobs in flight", self.in_flight);
        }

        // Closing the job channel ends the workers' loops.
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("An asset worker thread panicked");
            }
        }
    }
}
