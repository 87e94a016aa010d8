use crate::error::Result;
use crate::strategy::{SearchStrategy, StepContext, StepOutcome};

/// Pure random search: one uniformly random point per unit of work.
#[derive(Debug, Clone, Default)]
pub struct RandomSearch;

impl RandomSearch {
    pub fn new() -> Self {
        Self
    }
}

impl SearchStrategy for RandomSearch {
    fn initialise(&mut self, _context: &mut StepContext<'_>) -> Result<()> {
        Ok(())
    }

    fn next_unit_of_work(&mut self, context: &mut StepContext<'_>) -> Result<StepOutcome> {
        // Drawn on every node so the streams stay aligned, evaluated only by the owner.
        let candidate = context
            .rng
            .uniform_point(context.bounds.lower(), context.bounds.upper());
        if context.partition.owns(context.iteration) {
            context.evaluate(&candidate)?;
        }
        Ok(StepOutcome::Continue)
    }
}
