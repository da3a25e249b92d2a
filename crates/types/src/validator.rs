//! Validator set membership and quorum arithmetic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identifiers::Signatory;

/// The set of validators participating in one consensus instance.
///
/// Membership is by signatory identity. The quorum threshold is the
/// standard BFT supermajority, `⌊2n/3⌋ + 1`, tolerating up to
/// `⌊(n−1)/3⌋` Byzantine validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    signatories: BTreeSet<Signatory>,
}

impl ValidatorSet {
    pub fn new<I: IntoIterator<Item = Signatory>>(signatories: I) -> Self {
        ValidatorSet {
            signatories: signatories.into_iter().collect(),
        }
    }

    pub fn contains(&self, signatory: &Signatory) -> bool {
        self.signatories.contains(signatory)
    }

    pub fn len(&self) -> usize {
        self.signatories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatories.is_empty()
    }

    /// The supermajority quorum size.
    pub fn threshold(&self) -> usize {
        (self.signatories.len() * 2) / 3 + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signatory> {
        self.signatories.iter()
    }
}
