//! # Distributed optimisation
//!
//! Several nodes cooperate on one problem. Every node owns its own copy of the
//! problem (user functions included) and its own caches; only the problem
//! configuration, the seed and the incumbents travel between nodes.
//!
//! A node talks to its peers through a [`Communicator`]. Two transports ship
//! with the crate:
//!
//! - [`LocalCluster`] hands out [`ChannelCommunicator`]s, one per thread of the
//!   same process.
//! - [`TcpCommunicator`] connects one process per node through a full mesh of
//!   TCP streams.
//!
//! The [`DistributedCoordinator`] runs an
//! [`OptimisationAlgorithm`](crate::algorithm::OptimisationAlgorithm) on every
//! node and keeps the incumbents in agreement.
//!
//! ```rust
//! use std::thread;
//!
//! use bbopt::algorithm::{AlgorithmOptions, OptimisationAlgorithm};
//! use bbopt::distributed::{DistributedCoordinator, LocalCluster};
//! use bbopt::problem::{Bounds, OptimisationProblem};
//! use bbopt::strategy::RandomSearch;
//!
//! let handles: Vec<_> = LocalCluster::new(2)
//!     .unwrap()
//!     .into_iter()
//!     .map(|communicator| {
//!         thread::spawn(move || {
//!             let mut problem = OptimisationProblem::with_bounds(
//!                 Bounds::uniform(2, -5.0, 5.0).unwrap(),
//!                 |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>(),
//!             );
//!             let options = AlgorithmOptions::builder()
//!                 .maximal_number_of_iterations(50)
//!                 .seed(9)
//!                 .build();
//!             let algorithm = OptimisationAlgorithm::new(RandomSearch::new(), options);
//!             let mut coordinator = DistributedCoordinator::new(communicator, algorithm);
//!             coordinator.optimise(&mut problem).unwrap()
//!         })
//!     })
//!     .collect();
//!
//! let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
//! assert_eq!(results[0].best_parameter, results[1].best_parameter);
//! ```

pub mod channel;
pub mod coordinator;
pub mod tcp;
pub(crate) mod wire;

pub use channel::{ChannelCommunicator, LocalCluster};
pub use coordinator::{DistributedCoordinator, ReductionSchedule};
pub use tcp::TcpCommunicator;

use crate::error::{OptimisationError, OptionExt, Result};

/// Message passing between the nodes of a distributed run.
///
/// Nodes are numbered `0..number_of_nodes()`. Messages between two nodes
/// arrive in the order they were sent. The collectives have default
/// implementations built on [`send`](Self::send) and [`receive`](Self::receive);
/// every node must call them in the same order.
pub trait Communicator {
    /// This node's rank.
    fn rank(&self) -> usize;

    fn number_of_nodes(&self) -> usize;

    /// Sends one message to `destination` without waiting for it to be received.
    fn send(&mut self, destination: usize, message: &[u8]) -> Result<()>;

    /// Blocks until the next message from `source` arrives.
    fn receive(&mut self, source: usize) -> Result<Vec<u8>>;

    /// Distributes `message` from `root` to every node.
    ///
    /// The root passes `Some(message)`, everybody else `None`. The root sends
    /// the length first and the content second; receivers check that both
    /// agree.
    fn broadcast(&mut self, root: usize, message: Option<Vec<u8>>) -> Result<Vec<u8>> {
        ensure_rank(root, self.number_of_nodes())?;

        if self.rank() == root {
            let message = message.ok_or_else_optimisation(|| {
                OptimisationError::Communication(
                    "The root of a broadcast must provide a message".to_string(),
                )
            })?;
            let length = (message.len() as u64).to_le_bytes();
            for destination in (0..self.number_of_nodes()).filter(|&d| d != root) {
                self.send(destination, &length)?;
                self.send(destination, &message)?;
            }
            return Ok(message);
        }

        let header = self.receive(root)?;
        let length = <[u8; 8]>::try_from(header.as_slice())
            .map(u64::from_le_bytes)
            .map_err(|_| {
                OptimisationError::Communication(format!(
                    "Expected an 8 byte length from rank {}, got {} bytes",
                    root,
                    header.len()
                ))
            })?;
        let message = self.receive(root)?;
        if message.len() as u64 != length {
            return Err(OptimisationError::Communication(format!(
                "Rank {} announced {} bytes but sent {}",
                root,
                length,
                message.len()
            )));
        }
        Ok(message)
    }

    /// Exchanges one message between all nodes.
    ///
    /// Returns every node's message indexed by rank, this node's own included.
    fn all_gather(&mut self, message: &[u8]) -> Result<Vec<Vec<u8>>> {
        let rank = self.rank();
        let number_of_nodes = self.number_of_nodes();
        for destination in (0..number_of_nodes).filter(|&d| d != rank) {
            self.send(destination, message)?;
        }
        (0..number_of_nodes)
            .map(|source| {
                if source == rank {
                    Ok(message.to_vec())
                } else {
                    self.receive(source)
                }
            })
            .collect()
    }
}

pub(crate) fn ensure_rank(rank: usize, number_of_nodes: usize) -> Result<()> {
    if rank >= number_of_nodes {
        return Err(OptimisationError::Communication(format!(
            "Rank {} does not exist in a cluster of {} nodes",
            rank, number_of_nodes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn run_on_cluster<T, F>(number_of_nodes: usize, node: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(ChannelCommunicator) -> T + Send + Sync + Copy + 'static,
    {
        let handles: Vec<_> = LocalCluster::new(number_of_nodes)
            .unwrap()
            .into_iter()
            .map(|communicator| thread::spawn(move || node(communicator)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn test_broadcast_reaches_every_node() {
        let received = run_on_cluster(3, |mut communicator| {
            let message = (communicator.rank() == 1).then(|| b"configuration".to_vec());
            communicator.broadcast(1, message).unwrap()
        });
        assert!(received.iter().all(|m| m == b"configuration"));
    }

    #[test]
    fn test_all_gather_orders_by_rank() {
        let gathered = run_on_cluster(4, |mut communicator| {
            let message = vec![communicator.rank() as u8; 2];
            communicator.all_gather(&message).unwrap()
        });
        let expected: Vec<Vec<u8>> = (0..4u8).map(|r| vec![r; 2]).collect();
        assert!(gathered.iter().all(|g| *g == expected));
    }

    #[test]
    fn test_root_without_message_fails() {
        let mut nodes = LocalCluster::new(1).unwrap().into_iter();
        let mut communicator = nodes.next().unwrap();
        assert!(matches!(
            communicator.broadcast(0, None),
            Err(OptimisationError::Communication(_))
        ));
        assert!(communicator.broadcast(3, Some(Vec::new())).is_err());
    }

    #[test]
    fn test_wrong_length_is_detected() {
        let mut nodes = LocalCluster::new(2).unwrap().into_communicators();
        let mut receiver = nodes.pop().unwrap();
        let mut root = nodes.pop().unwrap();
        root.send(1, &5u64.to_le_bytes()).unwrap();
        root.send(1, b"abc").unwrap();
        assert!(matches!(
            receiver.broadcast(0, None),
            Err(OptimisationError::Communication(_))
        ));
    }
}
