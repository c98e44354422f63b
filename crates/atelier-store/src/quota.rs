use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::collaborators::QuotaTracker;
use crate::error::Result;
use crate::types::QuotaDecision;

/// In-process quota counting generations for the lifetime of a session
#[derive(Debug)]
pub struct SessionQuota {
    limit: u32,
    used: AtomicU32,
}

impl SessionQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }
}

#[async_trait]
impl QuotaTracker for SessionQuota {
    async fn can_use(&self) -> Result<QuotaDecision> {
        if self.remaining() == 0 {
            return Ok(QuotaDecision::deny(format!(
                "session limit of {} generations reached",
                self.limit
            )));
        }
        Ok(QuotaDecision::allow())
    }

    async fn record_usage(&self) -> Result<()> {
        self.used.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
