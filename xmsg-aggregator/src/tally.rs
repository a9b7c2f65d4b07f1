//! Per-message vote tallies on the destination side

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::receiver::ReceiveCall;
use crate::types::{Account, Digest, GatewayId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyState {
    #[default]
    Unseen,
    Collecting,
    /// Terminal: the receiver call was dispatched
    Executed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Succeeded,
    Failed { reason: String },
}

/// Result of recording one gateway's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteResult {
    New,
    /// Same gateway, same copy
    Duplicate,
    /// Same gateway, different copy; the first vote stands
    Conflicting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub state: TallyState,
    pub votes: BTreeMap<GatewayId, Digest>,
    pub outcome: Option<ExecutionOutcome>,
    /// Decoded receiver call per copy digest, kept until execution
    #[serde(skip)]
    pub copies: BTreeMap<Digest, QueuedCall>,
}

/// Receiver call a copy would dispatch once it reaches quorum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCall {
    pub receiver: Account,
    pub call: ReceiveCall,
}

impl VoteTally {
    /// Record a vote. A gateway contributes at most one vote per message.
    pub fn record(&mut self, gateway: &GatewayId, digest: Digest) -> VoteResult {
        match self.votes.get(gateway) {
            Some(existing) if *existing == digest => VoteResult::Duplicate,
            Some(_) => VoteResult::Conflicting,
            None => {
                self.votes.insert(gateway.clone(), digest);
                if self.state == TallyState::Unseen {
                    self.state = TallyState::Collecting;
                }
                VoteResult::New
            }
        }
    }

    /// Votes for `digest` cast by gateways that are still trusted
    pub fn count_matching(&self, digest: &Digest, trusted: &[GatewayId]) -> usize {
        self.votes
            .iter()
            .filter(|(gateway, vote)| *vote == digest && trusted.contains(gateway))
            .count()
    }

    /// The copy with the most votes from `trusted` gateways and its vote count
    pub fn leading(&self, trusted: &[GatewayId]) -> Option<(Digest, usize)> {
        let mut leading: Option<(Digest, usize)> = None;
        for digest in self.votes.values() {
            let votes = self.count_matching(digest, trusted);
            if leading.map_or(true, |(_, best)| votes > best) {
                leading = Some((*digest, votes));
            }
        }
        leading
    }

    /// Flip to `Executed`. Returns false if it already was.
    pub fn mark_executed(&mut self) -> bool {
        if self.state == TallyState::Executed {
            return false;
        }
        self.state = TallyState::Executed;
        true
    }

    /// Record the execution outcome; the first one sticks
    pub fn set_outcome(&mut self, outcome: ExecutionOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    pub fn is_executed(&self) -> bool {
        self.state == TallyState::Executed
    }
}
