pub mod algorithm;
pub mod caching;
pub mod distributed;
pub mod error;
pub mod problem;
pub mod rng;
pub mod strategy;

// Re-export commonly used types for convenience
pub use algorithm::{
    AlgorithmOptions, AlgorithmState, LogLevel, OptimisationAlgorithm, OptimisationResult,
};
pub use distributed::{Communicator, DistributedCoordinator, LocalCluster, ReductionSchedule, TcpCommunicator};
pub use error::{OptimisationError, OptionExt, Result, ResultExt};
pub use problem::{Bounds, Evaluation, OptimisationProblem};
pub use strategy::Strategy;
