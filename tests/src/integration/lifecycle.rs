//! Round and term progression through the public API.
//!
//! Every block goes through the same validate-then-apply path a real
//! execution engine would drive, so these flows exercise validation,
//! the transition processor and the collaborator notifications together.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use aedpos_consensus::config::ConsensusConfig;
    use aedpos_consensus::domain::ConsensusError;
    use shared_types::{hash_bytes, Pubkey};

    #[test]
    fn test_round_numbers_increase_strictly_within_a_term() {
        let mut driver = ChainDriver::new(test_config(), 5);
        let mut seen = vec![driver.current().round_number];

        for _ in 0..3 {
            for i in 1..=5 {
                driver.publish_value(i).unwrap();
            }
            driver.terminate_round(1).unwrap();
            let round = driver.current();
            assert_eq!(round.term_number, 1);
            seen.push(round.round_number);
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_counters_accumulate_across_rounds() {
        let mut driver = ChainDriver::new(test_config(), 5);
        for _ in 0..2 {
            for i in 1..=5 {
                driver.publish_value(i).unwrap();
            }
            driver.terminate_round(1).unwrap();
        }

        let round = driver.current();
        // One value block per round each, plus the terminator's own block.
        assert_eq!(round.get_miner(&pubkey(1)).unwrap().produced_blocks, 4);
        for i in 2..=5 {
            assert_eq!(round.get_miner(&pubkey(i)).unwrap().produced_blocks, 2);
            assert_eq!(round.get_miner(&pubkey(i)).unwrap().missed_time_slots, 0);
        }
    }

    #[test]
    fn test_absent_miners_accrue_missed_slots() {
        let mut driver = ChainDriver::new(test_config(), 5);
        driver.publish_value(1).unwrap();
        driver.publish_value(2).unwrap();
        driver.terminate_round(1).unwrap();

        let round = driver.current();
        assert_eq!(round.get_miner(&pubkey(2)).unwrap().missed_time_slots, 0);
        for i in 3..=5 {
            assert_eq!(round.get_miner(&pubkey(i)).unwrap().missed_time_slots, 1);
        }
    }

    #[test]
    fn test_next_round_orders_follow_derived_final_orders() {
        let mut driver = ChainDriver::new(test_config(), 5);
        for i in 1..=5 {
            driver.publish_value(i).unwrap();
        }
        let closing = driver.current();
        driver.terminate_round(1).unwrap();

        let next = driver.current();
        assert!(next.orders_are_well_formed());
        for slot in closing.miners.values() {
            if slot.final_order_of_next_round != 0 {
                assert_eq!(
                    next.get_miner(&slot.pubkey).unwrap().order,
                    slot.final_order_of_next_round
                );
            }
        }
    }

    #[test]
    fn test_commit_reveal_chain_is_enforced_across_rounds() {
        let mut driver = ChainDriver::new(test_config(), 5);
        for i in 1..=5 {
            driver.publish_value(i).unwrap();
        }
        driver.terminate_round(1).unwrap();

        // A reveal that does not hash to the round-1 commitment.
        let err = driver
            .publish_triple(1, Some(hash_bytes(b"forged-preimage")), hash_bytes(&in_value(1, 2)), 0)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::StructuralMismatch(_)));

        // The honest reveal goes through.
        driver.publish_value(1).unwrap();
        assert!(driver
            .current()
            .get_miner(&pubkey(1))
            .unwrap()
            .has_published_value());
    }

    #[test]
    fn test_term_change_installs_victors_and_resets_counters() {
        let config = ConsensusConfig {
            // Term 1 ends one interval after genesis: every slot from the
            // second onwards is past the boundary.
            term_period_ms: INTERVAL,
            ..test_config()
        };
        let mut driver = ChainDriver::new(config, 5);
        let victors: Vec<Pubkey> = (1u8..=5).map(pubkey).collect();
        driver.election.set_victories(victors.clone());

        for i in 1..=5 {
            driver.publish_value(i).unwrap();
        }
        let closing = driver.current();
        driver.terminate_term(2, &victors).unwrap();

        let round = driver.current();
        assert_eq!(round.term_number, 2);
        assert_eq!(round.round_number, closing.round_number + 1);
        assert!(round.is_miner_list_just_changed);
        assert!(round
            .miners
            .values()
            .all(|m| m.produced_blocks == 0 && m.missed_time_slots == 0));

        // The ending term was snapshotted with its closing statistics.
        let snapshots = driver.election.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].term_number, 1);
        assert_eq!(snapshots[0].mined_blocks[&pubkey(2)], 2);
        assert_eq!(driver.treasury.releases(), vec![1]);
    }

    #[test]
    fn test_chain_survives_term_change_and_keeps_producing() {
        let config = ConsensusConfig {
            term_period_ms: INTERVAL,
            ..test_config()
        };
        let mut driver = ChainDriver::new(config, 5);
        let victors: Vec<Pubkey> = (1u8..=5).map(pubkey).collect();
        driver.election.set_victories(victors.clone());

        for i in 1..=5 {
            driver.publish_value(i).unwrap();
        }
        driver.terminate_term(2, &victors).unwrap();

        // The new term's first round accepts values like any other round.
        for i in 1..=5 {
            driver.publish_value(i).unwrap();
        }
        driver.terminate_round(1).unwrap();

        let round = driver.current();
        assert_eq!(round.term_number, 2);
        assert!(!round.is_miner_list_just_changed);
        assert!(round.orders_are_well_formed());
    }
}
