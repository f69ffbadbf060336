use std::sync::mpsc::{channel, Receiver, Sender};

use super::{Communicator, WorkerContext};
use crate::block::LocalBlock;
use crate::error::{CommPhase, HeatError, HeatResult};

/// Two-way row link between vertically adjacent ranks.
struct Link {
    tx: Sender<Vec<f64>>,
    rx: Receiver<Vec<f64>>,
}

fn link_pair() -> (Link, Link) {
    let (tx_a, rx_b) = channel();
    let (tx_b, rx_a) = channel();
    (Link { tx: tx_a, rx: rx_a }, Link { tx: tx_b, rx: rx_b })
}

/// Collective plumbing: every rank votes to rank 0, which answers everyone.
enum Collective {
    Root {
        votes: Vec<Receiver<bool>>,
        verdicts: Vec<Sender<bool>>,
    },
    Member {
        vote: Sender<bool>,
        verdict: Receiver<bool>,
    },
}

/// Message-passing backend. Ranks share nothing but channels: each rank holds
/// only its own rows and trades one row of doubles with each neighbour per
/// iteration.
///
/// A rank that goes away drops its endpoints, so every peer blocked on it
/// fails with [`HeatError::WorkerCommunication`] instead of waiting forever.
pub struct ChannelComm {
    rank: usize,
    size: usize,
    up: Option<Link>,
    down: Option<Link>,
    collective: Collective,
}

impl ChannelComm {
    /// Wire up `size` ranks: neighbour links between consecutive ranks and a
    /// star to rank 0 for reductions.
    pub fn mesh(size: usize) -> Vec<ChannelComm> {
        let mut ups: Vec<Option<Link>> = (0..size).map(|_| None).collect();
        let mut downs: Vec<Option<Link>> = (0..size).map(|_| None).collect();
        for r in 1..size {
            let (lower_end, upper_end) = link_pair();
            ups[r] = Some(lower_end);
            downs[r - 1] = Some(upper_end);
        }

        let mut votes = Vec::with_capacity(size.saturating_sub(1));
        let mut verdicts = Vec::with_capacity(size.saturating_sub(1));
        let mut members = Vec::with_capacity(size.saturating_sub(1));
        for _ in 1..size {
            let (vote_tx, vote_rx) = channel();
            let (verdict_tx, verdict_rx) = channel();
            votes.push(vote_rx);
            verdicts.push(verdict_tx);
            members.push(Collective::Member {
                vote: vote_tx,
                verdict: verdict_rx,
            });
        }

        let mut collectives = Vec::with_capacity(size);
        if size > 0 {
            collectives.push(Collective::Root { votes, verdicts });
        }
        collectives.extend(members);

        ups.into_iter()
            .zip(downs)
            .zip(collectives)
            .enumerate()
            .map(|(rank, ((up, down), collective))| ChannelComm {
                rank,
                size,
                up,
                down,
                collective,
            })
            .collect()
    }

    fn fail(&self, phase: CommPhase) -> HeatError {
        HeatError::comm(self.rank, phase)
    }

    fn all_and(&self, value: bool, phase: CommPhase) -> HeatResult<bool> {
        match &self.collective {
            Collective::Root { votes, verdicts } => {
                let mut all = value;
                for rx in votes {
                    all &= rx.recv().map_err(|_| self.fail(phase))?;
                }
                for tx in verdicts {
                    tx.send(all).map_err(|_| self.fail(phase))?;
                }
                Ok(all)
            }
            Collective::Member { vote, verdict } => {
                vote.send(value).map_err(|_| self.fail(phase))?;
                verdict.recv().map_err(|_| self.fail(phase))
            }
        }
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn exchange_borders(&self, ctx: &WorkerContext, block: &mut LocalBlock) -> HeatResult<()> {
        let exchange = CommPhase::Exchange;
        let up = if ctx.has_upper_peer() { self.up.as_ref() } else { None };
        let down = if ctx.has_lower_peer() { self.down.as_ref() } else { None };

        // Sends never block, so post both rows before waiting on either.
        if let Some(link) = up {
            link.tx
                .send(block.top_owned().to_vec())
                .map_err(|_| self.fail(exchange))?;
        }
        if let Some(link) = down {
            link.tx
                .send(block.bottom_owned().to_vec())
                .map_err(|_| self.fail(exchange))?;
        }

        if let Some(link) = up {
            let row = link.rx.recv().map_err(|_| self.fail(exchange))?;
            block.set_top_ghost(&row);
        }
        if let Some(link) = down {
            let row = link.rx.recv().map_err(|_| self.fail(exchange))?;
            block.set_bottom_ghost(&row);
        }
        Ok(())
    }

    fn barrier(&self) -> HeatResult<()> {
        self.all_and(true, CommPhase::Barrier).map(|_| ())
    }

    fn reduce_and(&self, value: bool) -> HeatResult<bool> {
        self.all_and(value, CommPhase::Reduce)
    }
}
