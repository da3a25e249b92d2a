//! Vote aggregation: vote sets, the polka builder, and the commit builder.
//!
//! Both builders are the same aggregator parameterized over the vote type
//! and its block-choice projection: votes are deduplicated per signatory at
//! each `(height, round)`, grouped by block choice, and queried for the
//! highest round crossing a threshold.

use std::collections::BTreeMap;

use riptide_types::{
    Commit, Hash, Height, Polka, Round, Signatory, SignedPreCommit, SignedPreVote,
};
use tracing::warn;

/// A vote that can be aggregated toward a threshold.
///
/// The block choice is the hash of the block the vote agrees on, or `None`
/// for nil. Two votes agree iff their choices are equal.
pub trait AggregatedVote: Clone {
    fn height(&self) -> Height;
    fn round(&self) -> Round;
    fn signatory(&self) -> Signatory;
    fn block_choice(&self) -> Option<Hash>;
}

impl AggregatedVote for SignedPreVote {
    fn height(&self) -> Height {
        self.vote.height
    }

    fn round(&self) -> Round {
        self.vote.round
    }

    fn signatory(&self) -> Signatory {
        self.signatory
    }

    fn block_choice(&self) -> Option<Hash> {
        self.vote.block_hash()
    }
}

impl AggregatedVote for SignedPreCommit {
    fn height(&self) -> Height {
        self.precommit.polka.height
    }

    fn round(&self) -> Round {
        self.precommit.polka.round
    }

    fn signatory(&self) -> Signatory {
        self.signatory
    }

    fn block_choice(&self) -> Option<Hash> {
        self.precommit.polka.block_hash()
    }
}

/// A deduplicating set of votes at one `(height, round)`, indexed by
/// signatory.
///
/// The first vote from each signatory wins; a later conflicting vote from
/// the same signatory is equivocation and is dropped (logged, never counted
/// twice toward any threshold).
#[derive(Debug, Clone)]
pub struct VoteSet<V> {
    votes: BTreeMap<Signatory, V>,
}

impl<V: AggregatedVote> VoteSet<V> {
    pub fn new() -> Self {
        VoteSet {
            votes: BTreeMap::new(),
        }
    }

    /// Insert a vote. Returns true iff the vote was new.
    pub fn insert(&mut self, vote: V) -> bool {
        let signatory = vote.signatory();
        if let Some(existing) = self.votes.get(&signatory) {
            if existing.block_choice() != vote.block_choice() {
                warn!(
                    ?signatory,
                    height = %vote.height(),
                    round = %vote.round(),
                    "Equivocation: conflicting vote from same signatory, keeping first"
                );
            }
            return false;
        }
        self.votes.insert(signatory, vote);
        true
    }

    /// Number of distinct signatories that have voted.
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// The first block choice reaching `threshold` agreeing votes, with the
    /// agreeing votes themselves.
    ///
    /// Choices are grouped in an ordered map (nil first, then ascending
    /// block hash), so a forged double-threshold resolves deterministically.
    pub fn quorum(&self, threshold: usize) -> Option<(Option<Hash>, Vec<V>)> {
        let mut by_choice: BTreeMap<Option<Hash>, Vec<&V>> = BTreeMap::new();
        for vote in self.votes.values() {
            by_choice.entry(vote.block_choice()).or_default().push(vote);
        }
        by_choice
            .into_iter()
            .find(|(_, votes)| votes.len() >= threshold)
            .map(|(choice, votes)| (choice, votes.into_iter().cloned().collect()))
    }
}

impl<V: AggregatedVote> Default for VoteSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates votes per height and round.
///
/// Builders never fail and never retract: once a threshold is crossed at a
/// `(height, round)`, it stays crossed until the height is dropped.
#[derive(Debug, Clone)]
struct VoteBuilder<V> {
    heights: BTreeMap<Height, BTreeMap<Round, VoteSet<V>>>,
}

impl<V: AggregatedVote> VoteBuilder<V> {
    fn new() -> Self {
        VoteBuilder {
            heights: BTreeMap::new(),
        }
    }

    /// Insert a vote at its own `(height, round)`. Returns true iff new.
    fn insert(&mut self, vote: V) -> bool {
        self.heights
            .entry(vote.height())
            .or_default()
            .entry(vote.round())
            .or_insert_with(VoteSet::new)
            .insert(vote)
    }

    /// Query `height` for the highest round with an agreeing quorum, and
    /// independently the highest round with `threshold` votes of any kind.
    fn query(
        &self,
        height: Height,
        threshold: usize,
    ) -> (Option<(Round, Option<Hash>, Vec<V>)>, Option<Round>) {
        let Some(rounds) = self.heights.get(&height) else {
            return (None, None);
        };

        let mut agreeing = None;
        let mut any = None;
        for (&round, set) in rounds.iter().rev() {
            if set.len() < threshold {
                continue;
            }
            if any.is_none() {
                any = Some(round);
            }
            if agreeing.is_none() {
                if let Some((choice, votes)) = set.quorum(threshold) {
                    agreeing = Some((round, choice, votes));
                }
            }
            if any.is_some() && agreeing.is_some() {
                break;
            }
        }
        (agreeing, any)
    }

    /// Discard all state below `height`.
    fn drop_below(&mut self, height: Height) {
        self.heights = self.heights.split_off(&height);
    }
}

impl<V: AggregatedVote> Default for VoteBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregates prevotes across rounds at each height and surfaces polkas.
#[derive(Debug, Clone, Default)]
pub struct PolkaBuilder {
    builder: VoteBuilder<SignedPreVote>,
}

impl PolkaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a prevote. Returns true iff the vote was new.
    pub fn insert(&mut self, vote: SignedPreVote) -> bool {
        self.builder.insert(vote)
    }

    /// The highest-round polka at `height` with at least `threshold`
    /// prevotes agreeing on one block choice, plus the highest round with
    /// `threshold` prevotes regardless of agreement (drives round skipping).
    pub fn polka(&self, height: Height, threshold: usize) -> (Option<Polka>, Option<Round>) {
        let (agreeing, any) = self.builder.query(height, threshold);
        let polka = agreeing.map(|(round, _choice, votes)| {
            let block = votes.iter().find_map(|v| v.vote.block.clone());
            Polka {
                block,
                height,
                round,
                signatures: votes,
            }
        });
        (polka, any)
    }

    /// Discard all state below `height`.
    pub fn drop(&mut self, height: Height) {
        self.builder.drop_below(height);
    }
}

/// Aggregates precommits across rounds at each height and surfaces commits.
#[derive(Debug, Clone, Default)]
pub struct CommitBuilder {
    builder: VoteBuilder<SignedPreCommit>,
}

impl CommitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a precommit. Returns true iff the vote was new.
    pub fn insert(&mut self, precommit: SignedPreCommit) -> bool {
        self.builder.insert(precommit)
    }

    /// The highest-round commit at `height` with at least `threshold`
    /// precommits agreeing on one polka choice, plus the highest round with
    /// `threshold` precommits regardless of agreement.
    ///
    /// Nil-choice commits are surfaced: the state machine needs them to
    /// advance rounds, and filters to block-bearing commits on the decisive
    /// path.
    pub fn commit(&self, height: Height, threshold: usize) -> (Option<Commit>, Option<Round>) {
        let (agreeing, any) = self.builder.query(height, threshold);
        let commit = agreeing.map(|(_round, _choice, votes)| {
            let polka = votes[0].precommit.polka.clone();
            Commit {
                polka,
                signatures: votes,
            }
        });
        (commit, any)
    }

    /// Discard all state below `height`.
    pub fn drop(&mut self, height: Height) {
        self.builder.drop_below(height);
    }
}
