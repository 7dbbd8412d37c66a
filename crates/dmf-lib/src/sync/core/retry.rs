use anyhow::Result;
use std::time::Duration;

/// Raised when an action keeps failing past its retry allowance
#[derive(Debug, thiserror::Error)]
#[error("Giving up after {attempts} attempt(s) (local retry limit {local_limit}): {last_error}")]
pub struct RetryLimitExceeded {
    pub attempts: u32,
    pub local_limit: u32,
    pub last_error: String,
}

/// Bounded retries with an overall budget shared by every call on one instance.
///
/// The budget counts re-attempts, never first attempts: one unit is spent
/// each time a failed action is run again, whether or not it later succeeds.
/// A failure is final once the call has used `local_max_retries` re-attempts
/// or the budget is at zero.
#[derive(Debug, Clone)]
pub struct RetryLogic {
    remaining: u32,
}

impl RetryLogic {
    pub fn new(overall_retries: u32) -> Self {
        Self {
            remaining: overall_retries,
        }
    }

    /// Re-attempts still available to this instance
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Run `action` until it succeeds. Returns the number of re-attempts used.
    /// Sleeps `retry_delay` on the calling thread between attempts.
    pub fn retry_action<F>(
        &mut self,
        mut action: F,
        local_max_retries: u32,
        retry_delay: Duration,
    ) -> Result<u32, RetryLimitExceeded>
    where
        F: FnMut() -> Result<()>,
    {
        let mut retries = 0;
        loop {
            match action() {
                Ok(()) => return Ok(retries),
                Err(err) => {
                    if retries >= local_max_retries || self.remaining == 0 {
                        log::error!(
                            "Action failed after {} attempt(s), giving up: {:#}",
                            retries + 1,
                            err
                        );
                        return Err(RetryLimitExceeded {
                            attempts: retries + 1,
                            local_limit: local_max_retries,
                            last_error: format!("{:#}", err),
                        });
                    }
                    self.remaining -= 1;
                    retries += 1;
                    log::warn!(
                        "Action failed (attempt {}/{}): {:#}. Retrying in {:?}...",
                        retries,
                        local_max_retries + 1,
                        err,
                        retry_delay
                    );
                    if !retry_delay.is_zero() {
                        std::thread::sleep(retry_delay);
                    }
                }
            }
        }
    }
}
