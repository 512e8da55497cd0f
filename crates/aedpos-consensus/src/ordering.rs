//! Order Engine: derives each miner's production order for the next round.
//!
//! The order comes from a commit-reveal aggregate no single miner could
//! predict before the round started, then a bounded ring probe resolves
//! collisions deterministically.

use shared_types::{hash_to_u64, xor_hashes, Hash, Pubkey};
use tracing::debug;

use crate::domain::{ConsensusError, ConsensusResult, Round};

/// Result of deriving one miner's next-round order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedOrder {
    /// The recomputed aggregate signature for the sender.
    pub signature: Hash,
    /// Candidate order before collision resolution.
    pub supposed_order: u32,
    /// Order the sender actually receives.
    pub final_order: u32,
    /// Pre-existing holder displaced to a new slot, if the candidate order
    /// was already taken.
    pub displaced: Option<(Pubkey, u32)>,
}

/// Stateless order derivation over round snapshots.
pub struct OrderEngine;

impl OrderEngine {
    /// Aggregate signature for a revealed pre-image:
    /// `xor(previous_in_value, fold_xor(previous round signatures))`.
    pub fn compute_signature(previous_in_value: &Hash, previous_round: &Round) -> Hash {
        xor_hashes(previous_in_value, &previous_round.signatures_xor_fold())
    }

    /// Map a signature onto an order slot `1..=N`.
    pub fn candidate_order(signature: &Hash, miner_count: usize) -> u32 {
        (hash_to_u64(signature) % miner_count as u64) as u32 + 1
    }

    /// Derive the sender's next-round order against the current round's
    /// already-claimed final orders.
    ///
    /// Collision resolution probes `candidate+1, candidate+2, ...` on the
    /// order ring (0 maps back to N) and moves the *pre-existing* holder to
    /// the first free slot, freeing the candidate slot for the sender. At
    /// most `N - 1` probes are needed since at most `N - 1` other slots can
    /// be occupied; the loop bound is explicit.
    pub fn derive(
        current_round: &Round,
        sender: &Pubkey,
        signature: Hash,
    ) -> ConsensusResult<DerivedOrder> {
        let n = current_round.miner_count() as u32;
        if n == 0 {
            return Err(ConsensusError::MalformedInput(
                "cannot derive an order for an empty round".into(),
            ));
        }

        let candidate = Self::candidate_order(&signature, n as usize);

        let occupied = current_round.occupied_final_orders();
        let holder = occupied
            .iter()
            .find(|(pubkey, order)| *order == candidate && pubkey != sender)
            .copied();

        let displaced = match holder {
            None => None,
            Some((holder_pubkey, _)) => {
                let mut free_slot = None;
                for step in 1..n {
                    let probe = match (candidate + step) % n {
                        0 => n,
                        other => other,
                    };
                    let taken = probe == candidate
                        || occupied.iter().any(|(pk, o)| *o == probe && pk != sender);
                    if !taken {
                        free_slot = Some(probe);
                        break;
                    }
                }
                match free_slot {
                    Some(slot) => Some((holder_pubkey, slot)),
                    // Unreachable while I2 holds: N-1 probes cover every
                    // other slot on the ring.
                    None => {
                        return Err(ConsensusError::InvariantViolation(
                            "order ring exhausted during collision resolution".into(),
                        ))
                    }
                }
            }
        };

        if let Some((pubkey, slot)) = &displaced {
            debug!(
                displaced = %shared_types::short_hex(pubkey),
                from = candidate,
                to = slot,
                "order collision resolved"
            );
        }

        Ok(DerivedOrder {
            signature,
            supposed_order: candidate,
            final_order: candidate,
            displaced,
        })
    }

    /// Apply a derived order to a round, touching exactly the sender and
    /// (on collision) the displaced holder. Asserts the no-duplicate
    /// post-condition.
    pub fn apply(
        round: &mut Round,
        sender: &Pubkey,
        derived: &DerivedOrder,
    ) -> ConsensusResult<()> {
        if let Some((holder, new_slot)) = &derived.displaced {
            let slot = round
                .get_miner_mut(holder)
                .ok_or_else(|| ConsensusError::missing_miner(holder, "current round"))?;
            slot.final_order_of_next_round = *new_slot;
        }

        let slot = round
            .get_miner_mut(sender)
            .ok_or_else(|| ConsensusError::missing_miner(sender, "current round"))?;
        slot.signature = Some(derived.signature);
        slot.supposed_order_of_next_round = derived.supposed_order;
        slot.final_order_of_next_round = derived.final_order;

        if !round.final_orders_are_distinct() {
            return Err(ConsensusError::InvariantViolation(
                "duplicate final_order_of_next_round after order assignment".into(),
            ));
        }
        Ok(())
    }
}
