use std::sync::mpsc::{channel, Receiver, Sender};

use tracing::trace;

use super::{ensure_rank, Communicator};
use crate::error::{OptimisationError, Result};

/// An in-process cluster: one node per thread, connected by channels.
///
/// ```rust
/// use bbopt::distributed::{Communicator, LocalCluster};
///
/// let nodes = LocalCluster::new(4).unwrap().into_communicators();
/// assert_eq!(nodes[2].rank(), 2);
/// assert_eq!(nodes[2].number_of_nodes(), 4);
/// ```
#[derive(Debug)]
pub struct LocalCluster {
    communicators: Vec<ChannelCommunicator>,
}

impl LocalCluster {
    /// Wires up `number_of_nodes` communicators, every pair with a channel in
    /// each direction.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty cluster.
    pub fn new(number_of_nodes: usize) -> Result<Self> {
        if number_of_nodes == 0 {
            return Err(OptimisationError::Configuration(
                "A cluster needs at least one node".to_string(),
            ));
        }

        let mut senders: Vec<Vec<Sender<Vec<u8>>>> = (0..number_of_nodes)
            .map(|_| Vec::with_capacity(number_of_nodes))
            .collect();
        let mut receivers: Vec<Vec<Receiver<Vec<u8>>>> = (0..number_of_nodes)
            .map(|_| Vec::with_capacity(number_of_nodes))
            .collect();
        for source in 0..number_of_nodes {
            for destination in 0..number_of_nodes {
                let (sender, receiver) = channel();
                senders[source].push(sender);
                receivers[destination].push(receiver);
            }
        }

        let communicators = senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ChannelCommunicator {
                rank,
                senders,
                receivers,
            })
            .collect();
        Ok(Self { communicators })
    }

    pub fn len(&self) -> usize {
        self.communicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communicators.is_empty()
    }

    /// Returns the communicators ordered by rank.
    pub fn into_communicators(self) -> Vec<ChannelCommunicator> {
        self.communicators
    }
}

impl IntoIterator for LocalCluster {
    type Item = ChannelCommunicator;
    type IntoIter = std::vec::IntoIter<ChannelCommunicator>;

    fn into_iter(self) -> Self::IntoIter {
        self.communicators.into_iter()
    }
}

/// A node of a [`LocalCluster`].
///
/// Sending never blocks. Receiving from a node whose communicator has been
/// dropped fails with a communication error once its pending messages are
/// consumed.
#[derive(Debug)]
pub struct ChannelCommunicator {
    rank: usize,
    /// `senders[d]` delivers to node `d`.
    senders: Vec<Sender<Vec<u8>>>,
    /// `receivers[s]` holds the messages from node `s`.
    receivers: Vec<Receiver<Vec<u8>>>,
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn number_of_nodes(&self) -> usize {
        self.senders.len()
    }

    fn send(&mut self, destination: usize, message: &[u8]) -> Result<()> {
        ensure_rank(destination, self.number_of_nodes())?;
        trace!(rank = self.rank, destination, bytes = message.len(), "Sending");
        self.senders[destination]
            .send(message.to_vec())
            .map_err(|_| {
                OptimisationError::Communication(format!(
                    "Rank {} has left the cluster",
                    destination
                ))
            })
    }

    fn receive(&mut self, source: usize) -> Result<Vec<u8>> {
        ensure_rank(source, self.number_of_nodes())?;
        let message = self.receivers[source].recv().map_err(|_| {
            OptimisationError::Communication(format!("Rank {} has left the cluster", source))
        })?;
        trace!(rank = self.rank, source, bytes = message.len(), "Received");
        Ok(message)
    }
}
