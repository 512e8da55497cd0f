//! In-memory treasury adapter.

use parking_lot::RwLock;

use crate::ports::TreasuryGateway;

/// Records donations and releases; can be told to fail for fault-path tests.
#[derive(Default)]
pub struct InMemoryTreasury {
    donations: RwLock<Vec<u64>>,
    releases: RwLock<Vec<u64>>,
    fail_next: RwLock<bool>,
}

impl InMemoryTreasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn donations(&self) -> Vec<u64> {
        self.donations.read().clone()
    }

    pub fn releases(&self) -> Vec<u64> {
        self.releases.read().clone()
    }

    /// Make the next call return an error.
    pub fn fail_next_call(&self) {
        *self.fail_next.write() = true;
    }

    fn take_failure(&self) -> bool {
        std::mem::take(&mut *self.fail_next.write())
    }
}

impl TreasuryGateway for InMemoryTreasury {
    fn donate(&self, amount: u64) -> Result<(), String> {
        if self.take_failure() {
            return Err("treasury unavailable".into());
        }
        self.donations.write().push(amount);
        Ok(())
    }

    fn release(&self, period_number: u64) -> Result<(), String> {
        if self.take_failure() {
            return Err("treasury unavailable".into());
        }
        self.releases.write().push(period_number);
        Ok(())
    }
}
