//! WiFi (UDP) gateway
//!
//! # Discovery
//!
//! While no peer is known, every maintenance pass broadcasts a hostname query
//! (carrying our receive port) to each local subnet, or unicasts it to the
//! configured `discovery_targets`. The first reply whose hostname matches the
//! configured one becomes the peer and is asked for its debug mode.
//!
//! # Liveness
//!
//! One contact timer starts when the gateway is created and is restarted only
//! by a matching hostname reply, stamped with the time the receiver thread
//! picked it up. Until the timer runs past `connection_timeout_ms` the gateway
//! reports available (discovery pending or peer alive); after that the peer is
//! forgotten and the gateway stays unavailable until a device answers again.
//!
//! Once connected, the query is unicast to the peer every pass and only
//! replies from that peer refresh the timer.

mod receiver;

pub use receiver::{parse_reply, DeviceReply, ReplyReceiver};

use super::packet::{debug_mode_request, hostname_request, UdpPacket};
use crate::config::{DeviceConfig, UdpConfig};
use crate::core::gateway::{CommandBatch, ConnectionStatus, DeviceGateway};
use crate::core::types::OdorantCommand;
use crate::error::{Error, Result};
use crate::net;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

/// UDP gateway
pub struct UdpGateway {
    hostname: String,
    device_port: u16,
    timeout: Duration,
    discovery_targets: Option<Vec<Ipv4Addr>>,

    socket: Option<UdpSocket>,
    receiver: Option<ReplyReceiver>,

    peer: Option<SocketAddr>,
    // Gateway creation, or the last matching reply
    last_contact: Instant,
    newly_connected: bool,
    debug_mode: bool,

    packet: UdpPacket,
    batch: CommandBatch,
}

impl UdpGateway {
    /// Bind the gateway socket and start the reply receiver
    pub fn new(device: &DeviceConfig, udp: &UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;

        let receiver = ReplyReceiver::spawn(
            socket.try_clone()?,
            udp.reply_queue_depth,
            Duration::from_millis(udp.receive_poll_ms),
        )?;

        log::debug!("UDP gateway listening on {}", socket.local_addr()?);

        Ok(Self {
            hostname: device.hostname.clone(),
            device_port: udp.device_port,
            timeout: Duration::from_millis(udp.connection_timeout_ms),
            discovery_targets: udp.discovery_targets.clone(),
            socket: Some(socket),
            receiver: Some(receiver),
            peer: None,
            last_contact: Instant::now(),
            newly_connected: false,
            debug_mode: false,
            packet: UdpPacket::with_capacity(0),
            batch: CommandBatch::new(0),
        })
    }

    /// Address of the connected device
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Local port device replies are sent to
    pub fn local_port(&self) -> Option<u16> {
        self.socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .map(|addr| addr.port())
    }

    fn send_to(&self, bytes: &[u8], target: SocketAddr) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;
        let sent = socket.send_to(bytes, target)?;
        if sent != bytes.len() {
            return Err(Error::Other(format!(
                "short send to {}: {} of {} bytes",
                target,
                sent,
                bytes.len()
            )));
        }
        Ok(())
    }

    fn query_hostname(&self, target: SocketAddr) {
        let Some(port) = self.local_port() else {
            return;
        };
        if let Err(e) = self.send_to(&hostname_request(port), target) {
            log::trace!("Hostname query to {} failed: {}", target, e);
        }
    }

    fn discovery_addresses(&self) -> Vec<Ipv4Addr> {
        if let Some(ref targets) = self.discovery_targets {
            return targets.clone();
        }
        net::broadcast_addresses().unwrap_or_else(|e| {
            log::debug!("Interface enumeration failed: {}", e);
            vec![Ipv4Addr::BROADCAST]
        })
    }

    fn handle_reply(&mut self, reply: DeviceReply) {
        match reply {
            DeviceReply::Hostname {
                peer,
                hostname,
                received_at,
            } => {
                if hostname != self.hostname {
                    return;
                }
                if self.peer.is_some_and(|current| current != peer) {
                    log::trace!("Ignoring hostname reply from {}", peer);
                    return;
                }
                self.last_contact = self.last_contact.max(received_at);
                if self.peer.is_none() {
                    log::info!("Device found via WiFi at {}", peer);
                    self.peer = Some(peer);
                    self.newly_connected = true;
                    if let Err(e) = self.send_to(&debug_mode_request(), peer) {
                        log::debug!("Debug mode query to {} failed: {}", peer, e);
                    }
                }
            }
            DeviceReply::DebugMode(enabled) => {
                if enabled != self.debug_mode {
                    log::info!("Device debug mode {}", if enabled { "on" } else { "off" });
                }
                self.debug_mode = enabled;
            }
        }
    }

    fn drain_replies(&mut self) {
        while let Some(reply) = self.receiver.as_ref().and_then(ReplyReceiver::try_recv) {
            self.handle_reply(reply);
        }
    }

    fn expire(&mut self) {
        if let Some(peer) = self.peer.take() {
            log::warn!("WiFi device at {} timed out", peer);
        }
        self.newly_connected = false;
    }
}

impl DeviceGateway for UdpGateway {
    fn begin_connect(&mut self) {
        if self.socket.is_none() {
            return;
        }

        match self.peer {
            Some(peer) => self.query_hostname(peer),
            None => {
                for address in self.discovery_addresses() {
                    let target = SocketAddrV4::new(address, self.device_port);
                    self.query_hostname(target.into());
                }
            }
        }
    }

    fn check_connection(&mut self) -> bool {
        if self.socket.is_none() {
            return false;
        }
        self.drain_replies();

        if self.last_contact.elapsed() <= self.timeout {
            return true;
        }
        self.expire();
        false
    }

    fn connect(&mut self) -> bool {
        if self.socket.is_none() {
            return false;
        }

        let targets: Vec<SocketAddr> = match (self.hostname.as_str(), self.device_port)
            .to_socket_addrs()
        {
            Ok(addrs) => addrs.filter(SocketAddr::is_ipv4).collect(),
            Err(e) => {
                log::debug!("Cannot resolve {}: {}", self.hostname, e);
                return false;
            }
        };

        for target in &targets {
            self.query_hostname(*target);
        }

        let deadline = Instant::now() + self.timeout;
        while !self.is_connected() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let Some(reply) = self
                .receiver
                .as_ref()
                .and_then(|r| r.recv_timeout(deadline - now))
            else {
                break;
            };
            self.handle_reply(reply);
        }

        self.is_connected()
    }

    fn init(&mut self, max_commands_per_packet: usize) {
        self.packet = UdpPacket::with_capacity(max_commands_per_packet);
        self.batch.set_capacity(self.packet.max_commands());
    }

    fn add_command(&mut self, command: OdorantCommand) {
        self.batch.push(command);
    }

    fn add_commands(&mut self, commands: Vec<OdorantCommand>) {
        let count = commands.len();
        if !self.batch.extend_exact(commands) {
            log::debug!(
                "Dropped batch of {} commands ({} queued, capacity {})",
                count,
                self.batch.len(),
                self.batch.capacity()
            );
        }
    }

    fn remove_command(&mut self, slot: u8) {
        self.batch.remove_slot(slot);
    }

    fn clear_commands(&mut self) {
        self.batch.clear();
    }

    fn has_commands_to_send(&self) -> bool {
        !self.batch.is_empty()
    }

    fn send_commands(&mut self) -> bool {
        let Some(peer) = self.peer else {
            return false;
        };

        self.packet.set_odorant_commands(self.batch.as_slice());
        if let Err(e) = self.send_to(self.packet.as_bytes(), peer) {
            log::debug!("Send to {} failed: {}", peer, e);
            return false;
        }

        for command in self.batch.as_slice() {
            log::trace!("{}", command.to_csv());
        }
        true
    }

    fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    fn label(&self) -> &'static str {
        "WiFi"
    }

    fn pending(&self) -> &[OdorantCommand] {
        self.batch.as_slice()
    }

    fn dispose(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            if let Err(e) = receiver.shutdown() {
                log::error!("UDP receiver shutdown: {}", e);
            }
        }
        self.socket = None;
        self.peer = None;
        self.batch.clear();
    }

    fn debug_mode(&self) -> Option<bool> {
        Some(self.debug_mode)
    }

    fn maintain(&mut self) -> ConnectionStatus {
        self.begin_connect();
        if !self.check_connection() {
            return ConnectionStatus::Unavailable;
        }
        if std::mem::take(&mut self.newly_connected) {
            ConnectionStatus::Established
        } else {
            ConnectionStatus::Maintained
        }
    }
}

impl Drop for UdpGateway {
    fn drop(&mut self) {
        self.dispose();
    }
}
