//! Background reply receiver for the UDP gateway
//!
//! One thread blocks on the gateway socket and forwards parsed device replies
//! through a bounded channel. The main cycle drains the channel in
//! `check_connection`, so connection state is only ever touched from one
//! thread. Datagrams that fail the header check, carry an unknown type or are
//! shorter than their declared payload are dropped here.

use super::super::constants::{HEADER_SIZE, MAX_DATAGRAM_SIZE};
use super::super::header::{FrameHeader, MessageType};
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Parsed device → host message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReply {
    /// Answer to a hostname query, with the address it came from and when
    /// the receiver thread picked it up
    Hostname {
        peer: SocketAddr,
        hostname: String,
        received_at: Instant,
    },
    /// Debug mode flag reported by the device
    DebugMode(bool),
}

/// Parse one datagram; `None` for anything that is not a well-formed reply
pub fn parse_reply(
    datagram: &[u8],
    peer: SocketAddr,
    received_at: Instant,
) -> Option<DeviceReply> {
    let header = FrameHeader::decode(datagram);
    let kind = header.kind()?;
    let payload = datagram.get(HEADER_SIZE..header.total_len())?;

    match kind {
        MessageType::DeviceHostname => {
            let hostname = String::from_utf8_lossy(payload)
                .trim_end_matches('\0')
                .to_string();
            Some(DeviceReply::Hostname {
                peer,
                hostname,
                received_at,
            })
        }
        MessageType::DeviceDebugMode => payload.first().map(|&b| DeviceReply::DebugMode(b > 0)),
        _ => None,
    }
}

/// Owner of the receiver thread and the consuming end of its channel
pub struct ReplyReceiver {
    replies: Receiver<DeviceReply>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReplyReceiver {
    /// Start receiving on `socket`.
    ///
    /// `poll` becomes the socket read timeout and bounds how long `shutdown`
    /// waits for the thread.
    pub fn spawn(socket: UdpSocket, queue_depth: usize, poll: Duration) -> Result<Self> {
        socket.set_read_timeout(Some(poll))?;

        let (tx, replies) = bounded(queue_depth);
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("ovr-udp-receiver".to_string())
            .spawn(move || receive_loop(socket, tx, thread_shutdown))
            .map_err(|e| Error::Other(format!("Failed to spawn UDP receiver thread: {}", e)))?;

        Ok(Self {
            replies,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Next queued reply, without blocking
    pub fn try_recv(&self) -> Option<DeviceReply> {
        self.replies.try_recv().ok()
    }

    /// Wait up to `timeout` for the next reply
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DeviceReply> {
        self.replies.recv_timeout(timeout).ok()
    }

    /// Stop the thread and wait for it
    pub fn shutdown(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| Error::ThreadPanic)?;
        }
        Ok(())
    }
}

impl Drop for ReplyReceiver {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("UDP receiver shutdown: {}", e);
        }
    }
}

fn receive_loop(socket: UdpSocket, tx: Sender<DeviceReply>, shutdown: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        let (n, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                // ICMP port-unreachable surfaces here on some platforms
                log::trace!("UDP receive error: {}", e);
                thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        let Some(reply) = parse_reply(&buf[..n], peer, Instant::now()) else {
            log::trace!("Dropped {} byte datagram from {}", n, peer);
            continue;
        };

        match tx.try_send(reply) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("Reply queue full, dropping reply"),
            Err(TrySendError::Disconnected(_)) => break,
        }
    }

    log::debug!("UDP receiver thread exiting");
}
