//! Step scheduling.
//!
//! A scheduler only proposes; the orchestrator validates every proposal against the current state
//! before anything runs.

use crate::error::SchedulerError;
use crate::orchestrator::state::{RunContext, StepChoice};

#[async_trait::async_trait]
pub trait Scheduler: Send + Sync {
    /// Short name for logs ("fixed", "llm").
    fn name(&self) -> &str;

    async fn decide_next_step(&self, ctx: &RunContext<'_>) -> Result<StepChoice, SchedulerError>;
}

/// Reference scheduler: always proposes the single legal step for the current state.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedScheduler;

#[async_trait::async_trait]
impl Scheduler for FixedScheduler {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn decide_next_step(&self, ctx: &RunContext<'_>) -> Result<StepChoice, SchedulerError> {
        ctx.state
            .expected_step()
            .ok_or_else(|| SchedulerError::Unavailable("run is already finalized".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::state::Run;

    #[tokio::test]
    async fn fixed_scheduler_starts_with_business_verification() {
        let run = Run::new("00445790");
        let step = FixedScheduler.decide_next_step(&run.context()).await.unwrap();
        assert_eq!(step, StepChoice::VerifyBusiness);
    }
}
