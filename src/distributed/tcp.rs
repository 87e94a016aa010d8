use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{ensure_rank, Communicator};
use crate::error::{OptimisationError, Result, ResultExt};

/// How long a node keeps retrying to reach a peer that is not listening yet.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);
/// Upper limit for a single frame, to reject garbage lengths before allocating.
const MAXIMAL_FRAME_LENGTH: u64 = 1 << 32;

/// One process per node, connected through a full mesh of TCP streams.
///
/// Every node listens on its own address. Node `r` connects to every node
/// with a lower rank and introduces itself with its rank, then accepts the
/// connections of the nodes with a higher rank. Messages are framed with a
/// `u64` little-endian length.
///
/// [`all_gather`](Communicator::all_gather) writes to the peers on a second
/// thread while it reads, so messages of any size up to the frame limit are
/// exchanged without every node blocking on a full socket buffer.
#[derive(Debug)]
pub struct TcpCommunicator {
    rank: usize,
    /// `streams[r]` is the connection to node `r`; `None` for this node.
    streams: Vec<Option<TcpStream>>,
}

impl TcpCommunicator {
    /// Binds `addresses[rank]` and connects to the other nodes.
    pub fn connect(rank: usize, addresses: &[SocketAddr]) -> Result<Self> {
        ensure_rank(rank, addresses.len())?;
        let listener = TcpListener::bind(addresses[rank])
            .context(format!("Failed to bind {} for rank {}", addresses[rank], rank))?;
        Self::from_listener(rank, listener, addresses)
    }

    /// Connects to the other nodes, accepting the higher ranks on `listener`.
    ///
    /// `addresses` lists the listening address of every node by rank; the
    /// entry of this node is not used.
    pub fn from_listener(rank: usize, listener: TcpListener, addresses: &[SocketAddr]) -> Result<Self> {
        let number_of_nodes = addresses.len();
        ensure_rank(rank, number_of_nodes)?;
        let mut streams: Vec<Option<TcpStream>> = (0..number_of_nodes).map(|_| None).collect();

        for (peer, &address) in addresses.iter().enumerate().take(rank) {
            let mut stream = connect_with_retry(address)
                .context(format!("Failed to connect rank {} to rank {} at {}", rank, peer, address))?;
            stream.set_nodelay(true)?;
            stream.write_all(&(rank as u64).to_le_bytes())?;
            debug!(rank, peer, %address, "Connected");
            streams[peer] = Some(stream);
        }

        for _ in rank + 1..number_of_nodes {
            let (mut stream, address) = listener.accept()?;
            stream.set_nodelay(true)?;
            let mut introduction = [0; 8];
            stream.read_exact(&mut introduction)?;
            let peer = usize::try_from(u64::from_le_bytes(introduction)).unwrap_or(usize::MAX);
            if peer <= rank || peer >= number_of_nodes || streams[peer].is_some() {
                return Err(OptimisationError::Communication(format!(
                    "Rank {} got an unexpected introduction as rank {} from {}",
                    rank, peer, address
                )));
            }
            debug!(rank, peer, %address, "Accepted");
            streams[peer] = Some(stream);
        }

        Ok(Self { rank, streams })
    }

    fn stream(&mut self, peer: usize) -> Result<&mut TcpStream> {
        ensure_rank(peer, self.streams.len())?;
        let rank = self.rank;
        self.streams[peer].as_mut().ok_or_else(|| {
            OptimisationError::Communication(format!("Rank {} cannot message itself", rank))
        })
    }
}

fn connect_with_retry(address: SocketAddr) -> io::Result<TcpStream> {
    let deadline = Instant::now() + CONNECT_TIMEOUT;
    loop {
        match TcpStream::connect(address) {
            Ok(stream) => return Ok(stream),
            Err(error) if Instant::now() < deadline => {
                trace!(%address, %error, "Peer not reachable yet");
                thread::sleep(CONNECT_RETRY_INTERVAL);
            }
            Err(error) => return Err(error),
        }
    }
}

fn write_frame(stream: &mut TcpStream, destination: usize, message: &[u8]) -> Result<()> {
    stream
        .write_all(&(message.len() as u64).to_le_bytes())
        .and_then(|_| stream.write_all(message))
        .map_err(closed_by(destination))
}

/// Turns a closed connection into a communication error.
fn closed_by(peer: usize) -> impl FnOnce(io::Error) -> OptimisationError {
    move |error| match error.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => OptimisationError::Communication(format!(
            "Rank {} closed the connection",
            peer
        )),
        _ => OptimisationError::Io(error),
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn number_of_nodes(&self) -> usize {
        self.streams.len()
    }

    fn send(&mut self, destination: usize, message: &[u8]) -> Result<()> {
        let stream = self.stream(destination)?;
        write_frame(stream, destination, message)
    }

    fn receive(&mut self, source: usize) -> Result<Vec<u8>> {
        let stream = self.stream(source)?;
        let mut header = [0; 8];
        stream.read_exact(&mut header).map_err(closed_by(source))?;

        let length = u64::from_le_bytes(header);
        if length > MAXIMAL_FRAME_LENGTH {
            return Err(OptimisationError::Communication(format!(
                "Rank {} announced a frame of {} bytes",
                source, length
            )));
        }
        let mut message = vec![0; length as usize];
        stream.read_exact(&mut message).map_err(closed_by(source))?;
        Ok(message)
    }

    fn all_gather(&mut self, message: &[u8]) -> Result<Vec<Vec<u8>>> {
        let rank = self.rank;
        let mut writers = Vec::with_capacity(self.streams.len().saturating_sub(1));
        for (peer, stream) in self.streams.iter().enumerate() {
            if let Some(stream) = stream {
                writers.push((peer, stream.try_clone()?));
            }
        }

        thread::scope(|scope| {
            let writer = scope.spawn(move || {
                writers
                    .iter_mut()
                    .try_for_each(|(peer, stream)| write_frame(stream, *peer, message))
            });

            let received: Result<Vec<Vec<u8>>> = (0..self.streams.len())
                .map(|source| {
                    if source == rank {
                        Ok(message.to_vec())
                    } else {
                        self.receive(source)
                    }
                })
                .collect();
            let written = writer.join().unwrap_or_else(|_| {
                Err(OptimisationError::Communication(format!(
                    "Rank {} lost its writer thread",
                    rank
                )))
            });
            written.and(received)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_mesh(number_of_nodes: usize) -> Vec<TcpCommunicator> {
        let listeners: Vec<TcpListener> = (0..number_of_nodes)
            .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
            .collect();
        let addresses: Vec<SocketAddr> = listeners.iter().map(|l| l.local_addr().unwrap()).collect();

        let handles: Vec<_> = listeners
            .into_iter()
            .enumerate()
            .map(|(rank, listener)| {
                let addresses = addresses.clone();
                thread::spawn(move || TcpCommunicator::from_listener(rank, listener, &addresses).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn test_frames_arrive_intact() {
        let mut nodes = local_mesh(2);
        let mut second = nodes.pop().unwrap();
        let mut first = nodes.pop().unwrap();

        first.send(1, b"hello").unwrap();
        first.send(1, b"").unwrap();
        assert_eq!(second.receive(0).unwrap(), b"hello");
        assert_eq!(second.receive(0).unwrap(), b"");

        second.send(0, &[7; 1000]).unwrap();
        assert_eq!(first.receive(1).unwrap(), vec![7; 1000]);
    }

    #[test]
    fn test_all_gather_exchanges_messages_larger_than_socket_buffers() {
        const LENGTH: usize = 8 << 20;
        let handles: Vec<_> = local_mesh(3)
            .into_iter()
            .map(|mut node| {
                thread::spawn(move || {
                    let message = vec![node.rank() as u8 + 1; LENGTH];
                    node.all_gather(&message).unwrap()
                })
            })
            .collect();

        for handle in handles {
            let gathered = handle.join().unwrap();
            assert_eq!(gathered.len(), 3);
            for (rank, message) in gathered.iter().enumerate() {
                assert_eq!(message.len(), LENGTH);
                assert!(message.iter().all(|&byte| byte == rank as u8 + 1));
            }
        }
    }

    #[test]
    fn test_closed_peer_is_a_communication_error() {
        let mut nodes = local_mesh(2);
        drop(nodes.pop());
        let mut first = nodes.pop().unwrap();
        assert!(matches!(
            first.receive(1),
            Err(OptimisationError::Communication(_))
        ));
    }

    #[test]
    fn test_messaging_itself_is_rejected() {
        let mut node = local_mesh(1).remove(0);
        assert_eq!(node.number_of_nodes(), 1);
        assert!(node.send(0, b"").is_err());
    }
}
