//! Consensus service: entry points and the transition processor.
//!
//! One call per block, strictly sequential. Each entry point loads the
//! trusted current round, runs the validation pipeline against it, and only
//! then builds and installs the new round snapshot. Collaborators are
//! notified after the snapshot is installed; their failures surface to the
//! execution engine, which aborts the block atomically; the core itself
//! never retries and never rolls back.


use std::sync::Arc;

use shared_types::{short_hex, Pubkey, Timestamp};
use tracing::{debug, info, warn};

use crate::config::ConsensusConfig;
use crate::domain::{
    BlockConsensusMetadata, ConsensusBehaviour, ConsensusError, ConsensusResult, MinerSlot, Round,
};
use crate::finality::LibCalculator;
use crate::ordering::OrderEngine;
use crate::ports::{
    ConsensusApi, ElectionProvider, SystemTimeSource, TimeSource, TreasuryGateway,
};
use crate::state::ConsensusState;
use crate::metrics;
use crate::validation::{ValidationContext, ValidationPipeline};

/// Flat per-block donation sent to the treasury when a round closes.
const DONATION_PER_BLOCK: u64 = 125_000;

/// Dependencies for `ConsensusService`.
pub struct ConsensusDependencies<E, T> {
    pub election: Arc<E>,
    pub treasury: Arc<T>,
}

/// The consensus core, generic over its collaborators.
pub struct ConsensusService<E, T>
where
    E: ElectionProvider,
    T: TreasuryGateway,
{
    election: Arc<E>,
    treasury: Arc<T>,
    state: Arc<ConsensusState>,
    time_source: Box<dyn TimeSource>,
}

impl<E, T> ConsensusService<E, T>
where
    E: ElectionProvider,
    T: TreasuryGateway,
{
    pub fn new(deps: ConsensusDependencies<E, T>) -> Self {
        Self {
            election: deps.election,
            treasury: deps.treasury,
            state: Arc::new(ConsensusState::new()),
            time_source: Box::new(SystemTimeSource),
        }
    }

    /// Set a custom time source (for testing).
    pub fn with_time_source(mut self, time_source: Box<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Read access to the current round snapshot.
    pub fn current_round(&self) -> ConsensusResult<Round> {
        Ok(self.state.rounds.read().current_round()?.clone())
    }

    pub fn term_change_successful(&self) -> bool {
        self.state.term_change_successful()
    }

    // === TRANSITION ENTRY ===

    /// Shared validate-then-apply path for all four behaviours.
    fn apply(&self, input: BlockConsensusMetadata) -> ConsensusResult<()> {
        let config = self.state.config()?;
        let start_time = self.state.blockchain_start_time()?;
        let now = self.time_source.now_ms();

        // The victor list is collaborator data the pipeline compares
        // against; it is fetched here so validation itself stays pure.
        let victors = if input.behaviour == ConsensusBehaviour::NextTerm {
            Some(
                self.election
                    .get_victories()
                    .map_err(ConsensusError::CollaboratorFailure)?,
            )
        } else {
            None
        };

        let mut rounds = self.state.rounds.write();
        let trusted = rounds.current_round()?.clone();
        let previous = rounds.previous_round().ok().cloned();

        let ctx = ValidationContext {
            trusted: &trusted,
            previous: previous.as_ref(),
            proposed: &input.round,
            sender: &input.sender_pubkey,
            behaviour: input.behaviour,
            now,
            block_height: input.block_height,
            config: &config,
            blockchain_start_time: start_time,
            expected_victors: victors.as_deref(),
        };
        if let Err(err) = ValidationPipeline::validate(&ctx) {
            metrics::record_rejection(err.reason_label());
            warn!(
                behaviour = ?input.behaviour,
                sender = %short_hex(&input.sender_pubkey),
                height = input.block_height,
                %err,
                "transition rejected"
            );
            return Err(err);
        }

        // Accepted: from here on, at most one mutation per block height.
        self.state.mark_height_applied(input.block_height)?;

        let outcome = match input.behaviour {
            ConsensusBehaviour::UpdateValue => self.process_update_value(
                &mut rounds,
                &trusted,
                previous.as_ref(),
                &input,
                now,
            )?,
            ConsensusBehaviour::TinyBlock => {
                self.process_tiny_block(&mut rounds, &trusted, &input.sender_pubkey, now)?
            }
            ConsensusBehaviour::NextRound => self.process_next_round(
                &mut rounds,
                &trusted,
                previous.as_ref(),
                &input.sender_pubkey,
                &config,
            )?,
            ConsensusBehaviour::NextTerm => self.process_next_term(
                &mut rounds,
                &trusted,
                previous.as_ref(),
                &input.sender_pubkey,
                victors.unwrap_or_default(),
                &config,
                now,
            )?,
        };
        drop(rounds);

        metrics::record_acceptance();
        self.notify_collaborators(outcome)
    }

    // === TRANSITION PROCESSOR ===

    /// Record the sender's commit-reveal triple and derive its next-round
    /// order. Replaces the current round snapshot in place.
    fn process_update_value(
        &self,
        rounds: &mut crate::state::RoundStore,
        trusted: &Round,
        previous: Option<&Round>,
        input: &BlockConsensusMetadata,
        now: Timestamp,
    ) -> ConsensusResult<Outcome> {
        let sender = &input.sender_pubkey;
        let proposed_slot = input
            .round
            .get_miner(sender)
            .ok_or_else(|| ConsensusError::missing_miner(sender, "proposed round"))?;
        let out_value = proposed_slot
            .out_value
            .ok_or_else(|| ConsensusError::MalformedInput("empty out_value".into()))?;
        let previous_in_value = proposed_slot.previous_in_value;
        let implied_height = proposed_slot.implied_irreversible_block_height;

        let mut updated = trusted.clone();
        {
            let slot = updated
                .get_miner_mut(sender)
                .ok_or_else(|| ConsensusError::missing_miner(sender, "current round"))?;
            // Fixed local deltas; caller-supplied absolute counters are
            // never copied.
            slot.produced_blocks += 1;
            slot.produced_tiny_blocks += 1;
            slot.actual_mining_times.push(now);
            slot.out_value = Some(out_value);
            slot.previous_in_value = previous_in_value;
            slot.implied_irreversible_block_height = implied_height;
        }

        // Recompute the signature rather than trusting the proposal, then
        // derive the sender's next-round order from it.
        let base = previous_in_value.unwrap_or(out_value);
        let signature = match previous {
            Some(prev) => OrderEngine::compute_signature(&base, prev),
            None => base,
        };
        let derived = OrderEngine::derive(&updated, sender, signature)?;
        OrderEngine::apply(&mut updated, sender, &derived)?;

        debug!(
            sender = %short_hex(sender),
            order = derived.final_order,
            "value published"
        );
        rounds.replace_current(updated)?;
        Ok(Outcome::none())
    }

    /// Record one more block in the sender's claimed slot. Never touches
    /// out_value, signature or order fields.
    fn process_tiny_block(
        &self,
        rounds: &mut crate::state::RoundStore,
        trusted: &Round,
        sender: &Pubkey,
        now: Timestamp,
    ) -> ConsensusResult<Outcome> {
        let mut updated = trusted.clone();
        let slot = updated
            .get_miner_mut(sender)
            .ok_or_else(|| ConsensusError::missing_miner(sender, "current round"))?;
        slot.produced_blocks += 1;
        slot.produced_tiny_blocks += 1;
        slot.actual_mining_times.push(now);

        rounds.replace_current(updated)?;
        Ok(Outcome::none())
    }

    /// Terminate the round: same miner set, orders reassigned from the
    /// collision-resolved next-round orders, LIB advanced when eligible,
    /// evil miners replaced or removed.
    fn process_next_round(
        &self,
        rounds: &mut crate::state::RoundStore,
        trusted: &Round,
        previous: Option<&Round>,
        sender: &Pubkey,
        config: &ConsensusConfig,
    ) -> ConsensusResult<Outcome> {
        let mut closing = trusted.clone();
        apply_termination_deltas(&mut closing, sender);

        let mut next = build_next_round(&closing, config);
        advance_lib(&mut next, previous, trusted);

        let replacement = self.replace_evil_miners(&mut next, config)?;

        check_round_invariants(&next, trusted)?;
        rounds.advance_to(next)?;

        let blocks_this_round: u64 = closing
            .miners
            .values()
            .map(|m| m.actual_mining_times.len() as u64)
            .sum();
        info!(
            round = closing.round_number + 1,
            replaced = replacement.replaced.len(),
            removed = replacement.removed.len(),
            "round advanced"
        );
        Ok(Outcome {
            donation: Some(blocks_this_round * DONATION_PER_BLOCK),
            release_period: None,
            evil_reports: replacement.reports,
            miners_count: replacement.new_count,
            snapshot: None,
        })
    }

    /// Terminate the term: install the election victors with zeroed
    /// counters, snapshot the ending term, release the treasury period.
    #[allow(clippy::too_many_arguments)]
    fn process_next_term(
        &self,
        rounds: &mut crate::state::RoundStore,
        trusted: &Round,
        previous: Option<&Round>,
        sender: &Pubkey,
        victors: Vec<Pubkey>,
        config: &ConsensusConfig,
        now: Timestamp,
    ) -> ConsensusResult<Outcome> {
        let mut closing = trusted.clone();
        apply_termination_deltas(&mut closing, sender);

        let mut next = build_term_opening_round(&closing, &victors, config, now);
        advance_lib(&mut next, previous, trusted);

        check_round_invariants(&next, trusted)?;
        let new_count = next.miner_count();
        rounds.advance_to(next)?;
        self.state.set_term_change_successful(true);

        // Ending-term statistics for every outgoing miner.
        let reports: Vec<EvilReport> = closing
            .miners
            .values()
            .map(|m| EvilReport {
                pubkey: m.pubkey,
                produced_blocks_delta: m.produced_blocks,
                missed_slots_delta: m.missed_time_slots,
                is_evil: m.missed_time_slots >= config.miss_threshold,
            })
            .collect();

        let blocks_this_round: u64 = closing
            .miners
            .values()
            .map(|m| m.actual_mining_times.len() as u64)
            .sum();
        info!(
            term = closing.term_number + 1,
            miners = new_count,
            "term advanced"
        );
        Ok(Outcome {
            donation: Some(blocks_this_round * DONATION_PER_BLOCK),
            release_period: Some(closing.term_number),
            evil_reports: reports,
            miners_count: Some(new_count),
            snapshot: Some(SnapshotData {
                term_number: closing.term_number,
                round_number: closing.round_number,
                round: closing,
            }),
        })
    }

    /// Detect and replace evil miners in a freshly built round.
    ///
    /// Every evil miner leaves the set: paired 1:1 with alternatives while
    /// they last, removed outright beyond that. Orders are re-compacted
    /// afterwards so they stay a surjection onto `1..=N`.
    fn replace_evil_miners(
        &self,
        round: &mut Round,
        config: &ConsensusConfig,
    ) -> ConsensusResult<Replacement> {
        let locally_evil: Vec<Pubkey> = round
            .miners
            .values()
            .filter(|m| m.missed_time_slots >= config.miss_threshold)
            .map(|m| m.pubkey)
            .collect();
        if locally_evil.is_empty() {
            return Ok(Replacement::default());
        }

        let current: Vec<Pubkey> = round.miners.keys().copied().collect();
        let info = self
            .election
            .get_miner_replacement_information(&current)
            .map_err(ConsensusError::CollaboratorFailure)?;

        // The local detection is authoritative; the election may add more.
        let mut evil = locally_evil;
        for pk in info.evil_miners {
            if !evil.contains(&pk) && round.contains_miner(&pk) {
                evil.push(pk);
            }
        }

        let mut replacement = Replacement::default();
        let mut alternatives = info.alternatives.into_iter();
        for evil_pubkey in evil {
            let Some(old_slot) = round.miners.remove(&evil_pubkey) else {
                continue;
            };
            replacement.reports.push(EvilReport {
                pubkey: evil_pubkey,
                produced_blocks_delta: old_slot.produced_blocks,
                missed_slots_delta: old_slot.missed_time_slots,
                is_evil: true,
            });
            // An alternative that already holds a slot in this round would
            // clobber that miner's entry and break the order surjection;
            // such entries are skipped, leaving removal as the fallback.
            match alternatives.find(|alt| !round.contains_miner(alt)) {
                Some(alternative) => {
                    // The replacement inherits the slot, not the record.
                    let fresh = MinerSlot::new(
                        alternative,
                        old_slot.order,
                        old_slot.expected_mining_time,
                    );
                    round.miners.insert(alternative, fresh);
                    replacement.replaced.push((evil_pubkey, alternative));
                }
                None => {
                    replacement.removed.push(evil_pubkey);
                    warn!(
                        miner = %short_hex(&evil_pubkey),
                        "evil miner removed without replacement"
                    );
                }
            }
        }

        if !replacement.removed.is_empty() {
            compact_orders(round, config.mining_interval_ms);
        }
        replacement.new_count = Some(round.miner_count());
        Ok(replacement)
    }

    /// Fire-and-continue collaborator notifications after the snapshot is
    /// installed. The first failure is surfaced; nothing is rolled back.
    fn notify_collaborators(&self, outcome: Outcome) -> ConsensusResult<()> {
        for report in &outcome.evil_reports {
            self.election
                .update_candidate_information(
                    &report.pubkey,
                    report.produced_blocks_delta,
                    report.missed_slots_delta,
                    report.is_evil,
                )
                .map_err(ConsensusError::CollaboratorFailure)?;
        }
        if let Some(count) = outcome.miners_count {
            self.election
                .update_miners_count(count)
                .map_err(ConsensusError::CollaboratorFailure)?;
        }
        if let Some(snapshot) = &outcome.snapshot {
            self.election
                .take_snapshot(
                    snapshot.term_number,
                    snapshot.round_number,
                    snapshot.round.mined_blocks_map(),
                )
                .map_err(ConsensusError::CollaboratorFailure)?;
        }
        if let Some(amount) = outcome.donation {
            self.treasury
                .donate(amount)
                .map_err(ConsensusError::CollaboratorFailure)?;
        }
        if let Some(period) = outcome.release_period {
            // Release is gated on the term change having gone through.
            if self.state.term_change_successful() {
                self.treasury
                    .release(period)
                    .map_err(ConsensusError::CollaboratorFailure)?;
            }
        }
        Ok(())
    }
}

impl<E, T> ConsensusApi for ConsensusService<E, T>
where
    E: ElectionProvider,
    T: TreasuryGateway,
{
    fn initialize(&self, config: ConsensusConfig) -> ConsensusResult<()> {
        info!(chain_class = ?config.chain_class, "consensus core initialized");
        self.state.initialize(config);
        Ok(())
    }

    fn first_round(&self, round: Round, block_height: u64) -> ConsensusResult<()> {
        self.state.config()?;
        {
            let rounds = self.state.rounds.read();
            if !rounds.is_empty() {
                return Err(ConsensusError::StructuralMismatch(
                    "first round already installed".into(),
                ));
            }
        }
        if round.round_number != 1 || round.term_number != 1 {
            return Err(ConsensusError::StructuralMismatch(
                "genesis round must be round 1 of term 1".into(),
            ));
        }
        if round.miners.is_empty() || !round.orders_are_well_formed() {
            return Err(ConsensusError::MalformedInput(
                "genesis round carries a malformed miner schedule".into(),
            ));
        }

        self.state.mark_height_applied(block_height)?;
        self.state.set_blockchain_start_time(round.started_at());
        let count = round.miner_count();
        info!(miners = count, "genesis round installed");
        self.state.rounds.write().advance_to(round)?;
        self.election
            .update_miners_count(count)
            .map_err(ConsensusError::CollaboratorFailure)
    }

    fn update_value(&self, input: BlockConsensusMetadata) -> ConsensusResult<()> {
        expect_behaviour(&input, ConsensusBehaviour::UpdateValue)?;
        self.apply(input)
    }

    fn update_tiny_block_information(&self, input: BlockConsensusMetadata) -> ConsensusResult<()> {
        expect_behaviour(&input, ConsensusBehaviour::TinyBlock)?;
        self.apply(input)
    }

    fn next_round(&self, input: BlockConsensusMetadata) -> ConsensusResult<()> {
        expect_behaviour(&input, ConsensusBehaviour::NextRound)?;
        self.apply(input)
    }

    fn next_term(&self, input: BlockConsensusMetadata) -> ConsensusResult<()> {
        expect_behaviour(&input, ConsensusBehaviour::NextTerm)?;
        self.apply(input)
    }
}

// === OUTCOME BOOKKEEPING ===

/// Per-miner statistics report for the election.
///
/// The counters carried here are term-to-date values; they equal the
/// since-last-report deltas because both reset at term boundaries, and the
/// election is reported to at most once per miner per term.
#[derive(Clone, Debug)]
struct EvilReport {
    pubkey: Pubkey,
    produced_blocks_delta: u64,
    missed_slots_delta: u64,
    is_evil: bool,
}

struct SnapshotData {
    term_number: u64,
    round_number: u64,
    round: Round,
}

/// Collaborator notifications owed after an accepted transition.
struct Outcome {
    donation: Option<u64>,
    release_period: Option<u64>,
    evil_reports: Vec<EvilReport>,
    miners_count: Option<usize>,
    snapshot: Option<SnapshotData>,
}

impl Outcome {
    fn none() -> Self {
        Self {
            donation: None,
            release_period: None,
            evil_reports: Vec::new(),
            miners_count: None,
            snapshot: None,
        }
    }
}

#[derive(Default)]
struct Replacement {
    replaced: Vec<(Pubkey, Pubkey)>,
    removed: Vec<Pubkey>,
    reports: Vec<EvilReport>,
    new_count: Option<usize>,
}

// === ROUND CONSTRUCTION ===

fn expect_behaviour(
    input: &BlockConsensusMetadata,
    expected: ConsensusBehaviour,
) -> ConsensusResult<()> {
    if input.behaviour != expected {
        return Err(ConsensusError::StructuralMismatch(format!(
            "entry point expects {:?}, metadata claims {:?}",
            expected, input.behaviour
        )));
    }
    Ok(())
}

/// Fold the terminating block's counter increments into the closing round.
fn apply_termination_deltas(closing: &mut Round, sender: &Pubkey) {
    let deltas = closing.termination_counter_deltas(sender);
    for slot in closing.miners.values_mut() {
        if let Some(delta) = deltas.get(&slot.pubkey) {
            slot.produced_blocks += delta.produced_blocks;
            slot.missed_time_slots += delta.missed_time_slots;
        }
    }
}

/// Build the next round from a closing round with the same miner set.
///
/// Orders come from the collision-resolved `final_order_of_next_round`;
/// miners that never derived one (missed the whole round) fill the
/// remaining orders in current-order sequence.
fn build_next_round(closing: &Round, config: &ConsensusConfig) -> Round {
    let n = closing.miner_count() as u32;
    let mut taken: Vec<u32> = closing
        .miners
        .values()
        .map(|m| m.final_order_of_next_round)
        .filter(|o| *o != 0)
        .collect();
    taken.sort_unstable();

    let mut free_orders = (1..=n).filter(|o| taken.binary_search(o).is_err());
    let next_start =
        closing.extra_block_mining_time(config.mining_interval_ms) + config.mining_interval_ms;

    let mut next = Round {
        round_number: closing.round_number + 1,
        term_number: closing.term_number,
        extra_block_producer_of_previous_round: next_extra_block_producer(closing),
        confirmed_irreversible_block_height: closing.confirmed_irreversible_block_height,
        confirmed_irreversible_block_round_number: closing
            .confirmed_irreversible_block_round_number,
        is_miner_list_just_changed: false,
        ..Round::default()
    };

    for slot in closing.miners_by_order() {
        let order = if slot.final_order_of_next_round != 0 {
            slot.final_order_of_next_round
        } else {
            // Free orders cannot run out: every unassigned miner gets one
            // of the n - taken.len() remaining slots.
            free_orders.next().unwrap_or(n)
        };
        let expected = next_start + (order as u64 - 1) * config.mining_interval_ms;
        next.miners
            .insert(slot.pubkey, slot.carried_into_next_round(order, expected));
    }
    next
}

/// Build the first round of a new term from the election victors.
fn build_term_opening_round(
    closing: &Round,
    victors: &[Pubkey],
    config: &ConsensusConfig,
    now: Timestamp,
) -> Round {
    let start = now.max(closing.extra_block_mining_time(config.mining_interval_ms))
        + config.mining_interval_ms;
    let mut next = Round {
        round_number: closing.round_number + 1,
        term_number: closing.term_number + 1,
        extra_block_producer_of_previous_round: next_extra_block_producer(closing),
        confirmed_irreversible_block_height: closing.confirmed_irreversible_block_height,
        confirmed_irreversible_block_round_number: closing
            .confirmed_irreversible_block_round_number,
        is_miner_list_just_changed: true,
        ..Round::default()
    };
    for (index, pubkey) in victors.iter().enumerate() {
        let order = index as u32 + 1;
        let expected = start + index as u64 * config.mining_interval_ms;
        next.miners
            .insert(*pubkey, MinerSlot::new(*pubkey, order, expected));
    }
    next
}

/// Pick the extra block producer for the round that follows `closing`.
///
/// Derived from the order-1 miner's published signature so that no miner
/// can choose itself; falls back to the order-1 miner when the signature
/// never arrived.
fn next_extra_block_producer(closing: &Round) -> Option<Pubkey> {
    let ordered = closing.miners_by_order();
    let first = ordered.first()?;
    match first.signature {
        Some(signature) => {
            let index = (shared_types::hash_to_u64(&signature) % ordered.len() as u64) as usize;
            Some(ordered[index].pubkey)
        }
        None => Some(first.pubkey),
    }
}

/// Run the LIB calculator for a round transition and advance the cursor
/// when a supermajority confirms a new height.
fn advance_lib(next: &mut Round, previous: Option<&Round>, current: &Round) {
    let Some(previous) = previous else {
        return;
    };
    if let Some(height) =
        LibCalculator::calculate(previous, current, current.confirmed_irreversible_block_height)
    {
        next.confirmed_irreversible_block_height = height;
        next.confirmed_irreversible_block_round_number = previous.round_number;
        metrics::record_lib_height(height);
    }
}

/// Reassign orders `1..=N` after removals, keeping relative order, and lay
/// expected times back onto the interval grid.
fn compact_orders(round: &mut Round, mining_interval_ms: u64) {
    let start = round.started_at();
    let pubkeys: Vec<Pubkey> = round.miners_by_order().iter().map(|m| m.pubkey).collect();
    for (index, pubkey) in pubkeys.iter().enumerate() {
        if let Some(slot) = round.miners.get_mut(pubkey) {
            slot.order = index as u32 + 1;
            slot.expected_mining_time = start + index as u64 * mining_interval_ms;
        }
    }
}

/// Post-conditions every installed round must satisfy. A violation here is
/// fatal for the block: the execution engine discards the whole delta.
fn check_round_invariants(next: &Round, trusted: &Round) -> ConsensusResult<()> {
    if !next.orders_are_well_formed() {
        return Err(ConsensusError::InvariantViolation(
            "orders are not a surjection onto 1..=N".into(),
        ));
    }
    if !next.final_orders_are_distinct() {
        return Err(ConsensusError::InvariantViolation(
            "duplicate final next-round orders".into(),
        ));
    }
    if next.confirmed_irreversible_block_height < trusted.confirmed_irreversible_block_height {
        return Err(ConsensusError::InvariantViolation(
            "irreversible height regressed".into(),
        ));
    }
    Ok(())
}
