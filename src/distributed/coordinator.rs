use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::wire::Sample;
use super::Communicator;
use crate::algorithm::{
    AlgorithmState, Incumbent, OptimisationAlgorithm, OptimisationResult, Synchroniser,
};
use crate::error::{OptimisationError, Result};
use crate::problem::{OptimisationProblem, ProblemConfiguration};
use crate::rng::RandomNumberGenerator;
use crate::strategy::Partition;

/// When the nodes of a distributed run exchange their incumbents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReductionSchedule {
    /// After every unit of work. Every node sees the global incumbent at all
    /// times, and all nodes stop after the same iteration.
    #[default]
    EveryUnitOfWork,
    /// Once, after the loop. Nodes run independently and may stop on their own
    /// clocks.
    EndOfRun,
}

/// What rank 0 sends to everybody before the first iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SynchronisationPayload {
    problem: ProblemConfiguration,
    seed: u64,
}

/// Runs one [`OptimisationAlgorithm`] per node and keeps their incumbents in
/// agreement.
///
/// Before the first iteration rank 0 broadcasts its problem configuration and
/// seed, and every other node adopts them. During the run the nodes split the
/// work by rank:
///
/// - Sampling strategies walk through the same candidates on every node and
///   evaluate index `i` on the node with `rank == i % number_of_nodes`.
/// - Population strategies evolve the individuals they own by the same rule.
/// - Trajectory strategies follow one trajectory per node on a random stream
///   derived from the rank.
///
/// Incumbents are combined by keeping the better one, ties going to the lower
/// rank, so every node ends up with the identical result.
#[derive(Debug)]
pub struct DistributedCoordinator<C> {
    communicator: C,
    algorithm: OptimisationAlgorithm,
    schedule: ReductionSchedule,
}

impl<C: Communicator> DistributedCoordinator<C> {
    pub fn new(communicator: C, algorithm: OptimisationAlgorithm) -> Self {
        Self {
            communicator,
            algorithm,
            schedule: ReductionSchedule::default(),
        }
    }

    pub fn with_reduction_schedule(mut self, schedule: ReductionSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn set_reduction_schedule(&mut self, schedule: ReductionSchedule) {
        self.schedule = schedule;
    }

    pub fn reduction_schedule(&self) -> ReductionSchedule {
        self.schedule
    }

    pub fn rank(&self) -> usize {
        self.communicator.rank()
    }

    pub fn number_of_nodes(&self) -> usize {
        self.communicator.number_of_nodes()
    }

    pub fn algorithm(&self) -> &OptimisationAlgorithm {
        &self.algorithm
    }

    pub fn algorithm_mut(&mut self) -> &mut OptimisationAlgorithm {
        &mut self.algorithm
    }

    pub fn into_parts(self) -> (C, OptimisationAlgorithm) {
        (self.communicator, self.algorithm)
    }

    /// Synchronises `problem` with rank 0 and optimises it on every node.
    ///
    /// Every node of the cluster must call this together.
    ///
    /// # Errors
    ///
    /// Besides the errors of [`OptimisationAlgorithm::optimise`]:
    ///
    /// - `Communication` if a peer disappears or sends something malformed.
    /// - `Serialization` if the broadcast configuration cannot be decoded.
    /// - `Configuration` if a node cannot adopt the broadcast configuration.
    pub fn optimise(&mut self, problem: &mut OptimisationProblem) -> Result<OptimisationResult> {
        if self.algorithm.state() != AlgorithmState::NotStarted {
            return Err(OptimisationError::Configuration(format!(
                "The algorithm on rank {} is {:?}; call reset() before optimising again",
                self.rank(),
                self.algorithm.state()
            )));
        }

        self.synchronise(problem)?;
        let mut reduction = Reduction {
            communicator: &mut self.communicator,
            schedule: self.schedule,
        };
        self.algorithm.run(problem, &mut reduction)
    }

    fn synchronise(&mut self, problem: &mut OptimisationProblem) -> Result<()> {
        let rank = self.rank();
        let payload = if rank == 0 {
            let payload = SynchronisationPayload {
                problem: problem.configuration()?,
                seed: self
                    .algorithm
                    .options()
                    .get_seed()
                    .unwrap_or_else(RandomNumberGenerator::entropy_seed),
            };
            let bytes = serde_json::to_vec(&payload)?;
            self.communicator.broadcast(0, Some(bytes))?;
            payload
        } else {
            let bytes = self.communicator.broadcast(0, None)?;
            let payload: SynchronisationPayload = serde_json::from_slice(&bytes)?;
            // A problem that already matches keeps its caches from an earlier run.
            if problem.configuration().ok().as_ref() != Some(&payload.problem) {
                problem.apply_configuration(payload.problem.clone())?;
            }
            payload
        };

        self.algorithm.set_seed(payload.seed);
        info!(
            rank,
            number_of_nodes = self.number_of_nodes(),
            seed = payload.seed,
            "Synchronised the problem configuration"
        );
        Ok(())
    }
}

/// Combines the incumbents of all nodes through the communicator.
struct Reduction<'a, C> {
    communicator: &'a mut C,
    schedule: ReductionSchedule,
}

impl<C: Communicator> Reduction<'_, C> {
    /// Replaces `incumbent` with the global best and returns `true` if any node
    /// wants to stop.
    fn reduce(&mut self, incumbent: &mut Incumbent, wants_to_stop: bool) -> Result<bool> {
        let local = Sample {
            wants_to_stop,
            evaluation: incumbent.evaluation(),
            parameter: incumbent.parameter().to_vec(),
        };
        let gathered = self.communicator.all_gather(&local.encode())?;

        let mut must_stop = false;
        let mut best: Option<Sample> = None;
        for bytes in &gathered {
            let sample = Sample::decode(bytes)?;
            must_stop |= sample.wants_to_stop;
            // Strictly better only, so ties stay with the lower rank.
            let replaces = best
                .as_ref()
                .map_or(true, |b| sample.evaluation.is_better_than(&b.evaluation));
            if replaces {
                best = Some(sample);
            }
        }

        if let Some(best) = best {
            if best.evaluation != incumbent.evaluation() || best.parameter != incumbent.parameter() {
                trace!(
                    rank = self.communicator.rank(),
                    objective_value = best.evaluation.objective_value,
                    "Adopted a better incumbent from a peer"
                );
            }
            incumbent.replace(best.parameter, best.evaluation);
        }
        Ok(must_stop)
    }
}

impl<C: Communicator> Synchroniser for Reduction<'_, C> {
    fn partition(&self) -> Partition {
        Partition::new(self.communicator.rank(), self.communicator.number_of_nodes())
    }

    fn is_clock_local(&self) -> bool {
        self.schedule == ReductionSchedule::EndOfRun
    }

    fn after_unit_of_work(&mut self, incumbent: &mut Incumbent, wants_to_stop: bool) -> Result<bool> {
        match self.schedule {
            ReductionSchedule::EveryUnitOfWork => self.reduce(incumbent, wants_to_stop),
            ReductionSchedule::EndOfRun => Ok(wants_to_stop),
        }
    }

    fn after_run(&mut self, incumbent: &mut Incumbent) -> Result<()> {
        if self.schedule == ReductionSchedule::EndOfRun {
            self.reduce(incumbent, true)?;
            debug!(rank = self.communicator.rank(), "Combined the final incumbents");
        }
        Ok(())
    }
}
