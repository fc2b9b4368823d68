//! Message passing between catalogue worker ranks
//!
//! Workers run as scoped threads and own their data outright; the only way
//! data moves between them is by value through channels. This mirrors an MPI
//! program with a single coordinating rank: the coordinator broadcasts shared
//! metadata once and later gathers each worker's rows, concatenated in rank
//! order.
//!
//! Every rank must take part in every collective, in the same order. A rank
//! that fails locally still participates by sending its failure, so the
//! coordinator never blocks on a worker that has given up.

use crate::error::{SoError, SoResult};
use std::any::Any;
use std::ops::Range;
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::debug;

/// Rank that reads metadata and owns gathered results
pub const ROOT: usize = 0;

struct Envelope {
    source: usize,
    tag: u64,
    payload: Box<dyn Any + Send>,
}

/// One rank's view of the worker group
pub struct Communicator {
    rank: usize,
    size: usize,
    /// Channel to every other rank; `None` at our own index
    senders: Vec<Option<Sender<Envelope>>>,
    receiver: Receiver<Envelope>,
    /// Messages received while waiting for a different source or tag
    pending: Vec<Envelope>,
    next_tag: u64,
}

impl Communicator {
    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.rank == ROOT
    }

    fn error(&self, message: impl Into<String>) -> SoError {
        SoError::Communication {
            rank: self.rank,
            message: message.into(),
        }
    }

    fn next_tag(&mut self) -> u64 {
        self.next_tag += 1;
        self.next_tag
    }

    fn send(&self, dest: usize, tag: u64, payload: Box<dyn Any + Send>) -> SoResult<()> {
        let sender = self
            .senders
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.error(format!("no channel to rank {dest}")))?;
        sender
            .send(Envelope {
                source: self.rank,
                tag,
                payload,
            })
            .map_err(|_| self.error(format!("rank {dest} is no longer receiving")))
    }

    fn recv(&mut self, source: usize, tag: u64) -> SoResult<Box<dyn Any + Send>> {
        if let Some(pos) = self
            .pending
            .iter()
            .position(|e| e.source == source && e.tag == tag)
        {
            return Ok(self.pending.swap_remove(pos).payload);
        }
        loop {
            let envelope = self
                .receiver
                .recv()
                .map_err(|_| self.error(format!("rank {source} hung up before sending")))?;
            if envelope.source == source && envelope.tag == tag {
                return Ok(envelope.payload);
            }
            self.pending.push(envelope);
        }
    }

    /// Share `value` from `root` with every rank
    ///
    /// The root passes `Some(value)`, or `None` if it failed to produce one;
    /// other ranks pass `None`. All ranks return the root's value.
    ///
    /// # Errors
    /// Returns `SoError::Communication` if the root had nothing to send or a
    /// channel is closed.
    pub fn broadcast<T: Clone + Send + 'static>(
        &mut self,
        root: usize,
        value: Option<T>,
    ) -> SoResult<T> {
        let tag = self.next_tag();
        if self.rank == root {
            // Send to everyone before reporting any failure, so no rank is
            // left waiting.
            let mut first_error = None;
            for dest in (0..self.size).filter(|&d| d != root) {
                if let Err(e) = self.send(dest, tag, Box::new(value.clone())) {
                    first_error.get_or_insert(e);
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
            return value.ok_or_else(|| self.error("root had no value to broadcast"));
        }
        let payload = self.recv(root, tag)?;
        let value = payload
            .downcast::<Option<T>>()
            .map_err(|_| self.error("unexpected broadcast payload type"))?;
        (*value).ok_or_else(|| self.error(format!("rank {root} failed before broadcasting")))
    }

    /// Concatenate every rank's `local` rows onto `root`, in rank order
    ///
    /// Non-root ranks give up ownership of their rows and receive `None`.
    /// A rank reports a local failure by passing `Err(message)`.
    ///
    /// # Errors
    /// On the root, returns `SoError::Communication` naming the first rank
    /// that reported a failure or could not be heard from.
    pub fn gather<T: Send + 'static>(
        &mut self,
        root: usize,
        local: Result<Vec<T>, String>,
    ) -> SoResult<Option<Vec<T>>> {
        let tag = self.next_tag();
        if self.rank != root {
            self.send(root, tag, Box::new(local))?;
            return Ok(None);
        }

        let mut own = Some(local);
        let mut gathered = Vec::new();
        for source in 0..self.size {
            let part = if source == root {
                own.take().unwrap_or_else(|| Ok(Vec::new()))
            } else {
                let payload = self.recv(source, tag)?;
                *payload
                    .downcast::<Result<Vec<T>, String>>()
                    .map_err(|_| self.error("unexpected gather payload type"))?
            };
            let part = part.map_err(|message| SoError::Communication {
                rank: source,
                message,
            })?;
            debug!(rank = source, rows = part.len(), "gathered rows");
            gathered.extend(part);
        }
        Ok(Some(gathered))
    }
}

/// Split `nr_items` into `nr_ranks` contiguous ranges
///
/// The first `nr_items % nr_ranks` ranks get one extra item; ranges may be
/// empty when there are more ranks than items.
#[must_use]
pub fn partition(nr_items: usize, nr_ranks: usize) -> Vec<Range<usize>> {
    let nr_ranks = nr_ranks.max(1);
    let base = nr_items / nr_ranks;
    let rem = nr_items % nr_ranks;
    let mut out = Vec::with_capacity(nr_ranks);
    let mut cursor = 0;
    for rank in 0..nr_ranks {
        let len = base + usize::from(rank < rem);
        out.push(cursor..cursor + len);
        cursor += len;
    }
    out
}

/// Run `work` on `nr_ranks` worker threads connected by channels
///
/// Returns each rank's output in rank order, or the error of the lowest
/// failing rank.
///
/// # Errors
/// Returns `SoError::Config` for zero ranks, otherwise the first rank error.
pub fn run_ranks<R, F>(nr_ranks: usize, work: F) -> SoResult<Vec<R>>
where
    R: Send,
    F: Fn(&mut Communicator) -> SoResult<R> + Sync,
{
    if nr_ranks == 0 {
        return Err(SoError::Config("number of ranks must be >= 1".to_string()));
    }

    let (senders, receivers): (Vec<_>, Vec<_>) = (0..nr_ranks).map(|_| channel()).unzip();
    let comms: Vec<Communicator> = receivers
        .into_iter()
        .enumerate()
        .map(|(rank, receiver)| Communicator {
            rank,
            size: nr_ranks,
            senders: senders
                .iter()
                .enumerate()
                .map(|(dest, s)| (dest != rank).then(|| s.clone()))
                .collect(),
            receiver,
            pending: Vec::new(),
            next_tag: 0,
        })
        .collect();
    drop(senders);

    let work = &work;
    let results: Vec<SoResult<R>> = std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|mut comm| scope.spawn(move || work(&mut comm)))
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(SoError::Communication {
                        rank,
                        message: "worker panicked".to_string(),
                    })
                })
            })
            .collect()
    });
    results.into_iter().collect()
}
