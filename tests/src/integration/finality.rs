//! Irreversible-height advancement across round transitions.
//!
//! A height becomes irreversible when a supermajority of the miners that
//! published values this round reported it (or better) in the previous
//! round. These flows check that the cursor advances exactly then, and
//! never moves backwards.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;

    /// Every miner publishes and carries a finality claim equal to its id.
    fn publish_all_with_claims(driver: &mut ChainDriver, n: u8) {
        for i in 1..=n {
            driver.publish_value_with_implied(i, i as u64).unwrap();
        }
    }

    #[test]
    fn test_lib_advances_once_reports_have_supermajority_backing() {
        let mut driver = ChainDriver::new(test_config(), 5);

        // Round 1: claims are recorded but there is no earlier round to
        // back them, so the cursor stays put.
        publish_all_with_claims(&mut driver, 5);
        driver.terminate_round(1).unwrap();
        assert_eq!(driver.current().confirmed_irreversible_block_height, 0);

        // Round 2: the five producers back the round-1 claims [1..5].
        // threshold(5) = 4, so the 4th-highest claim, height 2, is final.
        publish_all_with_claims(&mut driver, 5);
        driver.terminate_round(1).unwrap();

        let round = driver.current();
        assert_eq!(round.confirmed_irreversible_block_height, 2);
        assert_eq!(round.confirmed_irreversible_block_round_number, 1);
    }

    #[test]
    fn test_lib_stalls_below_supermajority() {
        let mut driver = ChainDriver::new(test_config(), 5);
        publish_all_with_claims(&mut driver, 5);
        driver.terminate_round(1).unwrap();

        // Only three of five publish in round 2: no supermajority of
        // reporters, no progress.
        for i in 1..=3 {
            driver.publish_value_with_implied(i, i as u64).unwrap();
        }
        driver.terminate_round(1).unwrap();
        assert_eq!(driver.current().confirmed_irreversible_block_height, 0);
    }

    #[test]
    fn test_lib_never_regresses() {
        let mut driver = ChainDriver::new(test_config(), 5);
        let mut last = 0;
        for _ in 0..4 {
            publish_all_with_claims(&mut driver, 5);
            driver.terminate_round(1).unwrap();
            let confirmed = driver.current().confirmed_irreversible_block_height;
            assert!(confirmed >= last);
            last = confirmed;
        }
        assert_eq!(last, 2);
    }

    #[test]
    fn test_growing_claims_move_the_cursor_forward() {
        let mut driver = ChainDriver::new(test_config(), 5);

        publish_all_with_claims(&mut driver, 5);
        driver.terminate_round(1).unwrap();

        // Round 2: everyone raises its claim by five; the round-1 claims
        // still decide this transition.
        publish_all_with_claims_at(&mut driver, 5, 5);
        driver.terminate_round(1).unwrap();
        assert_eq!(driver.current().confirmed_irreversible_block_height, 2);

        // Round 3: the round-2 claims [6..10] take over.
        publish_all_with_claims_at(&mut driver, 5, 5);
        driver.terminate_round(1).unwrap();
        assert_eq!(driver.current().confirmed_irreversible_block_height, 7);
    }

    fn publish_all_with_claims_at(driver: &mut ChainDriver, n: u8, offset: u64) {
        for i in 1..=n {
            driver
                .publish_value_with_implied(i, i as u64 + offset)
                .unwrap();
        }
    }
}
