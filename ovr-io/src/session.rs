//! Per-cycle session driver
//!
//! A [`Session`] owns the gateways (in order of preference), the command
//! aggregator and the maintenance timer. The host calls [`Session::submit`]
//! from its producers and [`Session::tick`] once per cycle.

use crate::aggregator::{Admission, CommandAggregator, CommandFilter};
use crate::config::AppConfig;
use crate::core::gateway::{ConnectionStatus, DeviceGateway};
use crate::core::types::OdorantCommand;
use crate::devices::create_gateways;
use crate::error::Result;
use std::time::Duration;

pub struct Session {
    gateways: Vec<Box<dyn DeviceGateway>>,
    active: Option<usize>,
    aggregator: CommandAggregator,
    max_commands: usize,
    maintain_interval: Duration,
    until_maintain: Duration,
}

impl Session {
    /// Session over explicit gateways (first = most preferred)
    pub fn new(
        config: &AppConfig,
        gateways: Vec<Box<dyn DeviceGateway>>,
        filter: Option<Box<dyn CommandFilter>>,
    ) -> Self {
        let max_commands = config.device.max_commands();
        let mut aggregator = CommandAggregator::new(max_commands);
        aggregator.set_filter(filter);

        Self {
            gateways,
            active: None,
            aggregator,
            max_commands,
            maintain_interval: Duration::from_millis(config.session.maintain_interval_ms),
            until_maintain: Duration::from_millis(config.session.initial_maintain_delay_ms),
        }
    }

    /// Session over the gateways named in `session.transports`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(config, create_gateways(config)?, None))
    }

    /// Queue a command for the next send
    pub fn submit(&mut self, command: OdorantCommand) -> Admission {
        self.aggregator.add(command)
    }

    /// Global admission switch
    pub fn set_active(&mut self, active: bool) {
        self.aggregator.set_active(active);
    }

    pub fn is_active(&self) -> bool {
        self.aggregator.is_active()
    }

    pub fn max_commands(&self) -> usize {
        self.max_commands
    }

    /// Commands waiting for the next tick
    pub fn pending(&self) -> &[OdorantCommand] {
        self.aggregator.commands()
    }

    /// Label of the gateway commands currently go to
    pub fn active_label(&self) -> Option<&'static str> {
        self.active_gateway().map(|g| g.label())
    }

    /// Debug mode reported by the device over the active transport
    pub fn device_debug_mode(&self) -> Option<bool> {
        self.active_gateway().and_then(|g| g.debug_mode())
    }

    /// Whether a transport reported a device at the last maintenance pass
    pub fn is_device_available(&self) -> bool {
        self.active.is_some()
    }

    /// Advance the session by `elapsed`.
    ///
    /// Runs connection maintenance when due, then hands this cycle's commands
    /// to the active gateway. Returns whether a packet went out.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        self.until_maintain = self.until_maintain.saturating_sub(elapsed);
        if self.until_maintain.is_zero() {
            self.maintain();
            self.until_maintain = self.maintain_interval;
        }

        self.aggregator.update_filter();
        let commands = self.aggregator.drain();

        let Some(index) = self.active else {
            return false;
        };
        let gateway = &mut self.gateways[index];

        gateway.add_commands(commands);
        let sent = gateway.has_commands_to_send() && gateway.send_commands();
        gateway.clear_commands();
        sent
    }

    /// One maintenance pass over the gateways in preference order.
    ///
    /// The first gateway that reports a device becomes active; it is
    /// (re)initialised when it differs from the previous one or has just
    /// connected.
    pub fn maintain(&mut self) -> bool {
        let previous = self.active;
        self.active = None;

        for (index, gateway) in self.gateways.iter_mut().enumerate() {
            let status = gateway.maintain();
            if !status.is_available() {
                continue;
            }

            if previous != Some(index) || status == ConnectionStatus::Established {
                gateway.init(self.max_commands);
                log::info!(
                    "Using {} transport ({} commands per packet)",
                    gateway.label(),
                    self.max_commands
                );
            }
            self.active = Some(index);
            break;
        }

        if self.active.is_none() && previous.is_some() {
            log::warn!("No device reachable, dropping commands until one reconnects");
        }
        self.active.is_some()
    }

    fn active_gateway(&self) -> Option<&dyn DeviceGateway> {
        self.active.map(|i| self.gateways[i].as_ref())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for gateway in &mut self.gateways {
            gateway.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Algorithm;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        inits: Vec<usize>,
        sent: Vec<Vec<u8>>,
        disposed: bool,
    }

    /// Gateway replaying a fixed sequence of maintenance outcomes
    struct ScriptedGateway {
        label: &'static str,
        script: VecDeque<ConnectionStatus>,
        batch: Vec<OdorantCommand>,
        calls: Arc<Mutex<Calls>>,
    }

    impl ScriptedGateway {
        fn boxed(
            label: &'static str,
            script: &[ConnectionStatus],
        ) -> (Box<dyn DeviceGateway>, Arc<Mutex<Calls>>) {
            let calls = Arc::new(Mutex::new(Calls::default()));
            let gateway = ScriptedGateway {
                label,
                script: script.iter().copied().collect(),
                batch: Vec::new(),
                calls: Arc::clone(&calls),
            };
            (Box::new(gateway), calls)
        }
    }

    impl DeviceGateway for ScriptedGateway {
        fn begin_connect(&mut self) {}
        fn check_connection(&mut self) -> bool {
            true
        }
        fn connect(&mut self) -> bool {
            true
        }
        fn init(&mut self, max: usize) {
            self.calls.lock().inits.push(max);
        }
        fn add_command(&mut self, command: OdorantCommand) {
            self.batch.push(command);
        }
        fn remove_command(&mut self, slot: u8) {
            self.batch.retain(|c| c.slot() != slot);
        }
        fn clear_commands(&mut self) {
            self.batch.clear();
        }
        fn has_commands_to_send(&self) -> bool {
            !self.batch.is_empty()
        }
        fn send_commands(&mut self) -> bool {
            let slots = self.batch.iter().map(|c| c.slot()).collect();
            self.calls.lock().sent.push(slots);
            true
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn label(&self) -> &'static str {
            self.label
        }
        fn pending(&self) -> &[OdorantCommand] {
            &self.batch
        }
        fn dispose(&mut self) {
            self.calls.lock().disposed = true;
        }
        fn maintain(&mut self) -> ConnectionStatus {
            self.script
                .pop_front()
                .unwrap_or(ConnectionStatus::Unavailable)
        }
    }

    use ConnectionStatus::{Established, Maintained, Unavailable};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.session.initial_maintain_delay_ms = 0;
        config.session.maintain_interval_ms = 100;
        config
    }

    fn cmd(slot: u8, intensity: u16) -> OdorantCommand {
        OdorantCommand::new("odor", slot, Algorithm::Burst, intensity)
    }

    #[test]
    fn test_prefers_first_available_gateway() {
        let (usb, usb_calls) = ScriptedGateway::boxed("USB", &[Unavailable, Established]);
        let (wifi, wifi_calls) = ScriptedGateway::boxed("WiFi", &[Established, Maintained]);
        let mut session = Session::new(&config(), vec![usb, wifi], None);

        assert!(session.maintain());
        assert_eq!(session.active_label(), Some("WiFi"));
        assert_eq!(wifi_calls.lock().inits, vec![9]);

        // USB comes back and takes over; WiFi is not consulted
        assert!(session.maintain());
        assert_eq!(session.active_label(), Some("USB"));
        assert_eq!(usb_calls.lock().inits, vec![9]);
    }

    #[test]
    fn test_init_only_on_change_or_reconnect() {
        let (wifi, calls) =
            ScriptedGateway::boxed("WiFi", &[Established, Maintained, Maintained, Established]);
        let mut session = Session::new(&config(), vec![wifi], None);

        for _ in 0..4 {
            session.maintain();
        }
        assert_eq!(calls.lock().inits.len(), 2);
    }

    #[test]
    fn test_tick_sends_aggregated_batch() {
        let (wifi, calls) = ScriptedGateway::boxed("WiFi", &[Established]);
        let mut session = Session::new(&config(), vec![wifi], None);

        session.submit(cmd(2, 100));
        session.submit(cmd(2, 50));
        session.submit(cmd(0, 10));
        assert!(session.tick(Duration::from_millis(10)));

        assert_eq!(calls.lock().sent, vec![vec![2, 0]]);
        assert!(session.pending().is_empty());

        // Nothing submitted: nothing sent
        assert!(!session.tick(Duration::from_millis(10)));
        assert_eq!(calls.lock().sent.len(), 1);
    }

    #[test]
    fn test_no_device_drops_commands() {
        let (usb, calls) = ScriptedGateway::boxed("USB", &[Unavailable]);
        let mut session = Session::new(&config(), vec![usb], None);

        session.submit(cmd(1, 10));
        assert!(!session.tick(Duration::from_millis(10)));
        assert!(!session.is_device_available());
        assert!(session.pending().is_empty());
        assert!(calls.lock().sent.is_empty());
    }

    #[test]
    fn test_maintenance_interval() {
        let mut config = config();
        config.session.initial_maintain_delay_ms = 50;
        let (wifi, _calls) =
            ScriptedGateway::boxed("WiFi", &[Established, Unavailable, Unavailable]);
        let mut session = Session::new(&config, vec![wifi], None);

        session.tick(Duration::from_millis(40));
        assert!(!session.is_device_available());
        session.tick(Duration::from_millis(10));
        assert!(session.is_device_available());

        // Previous outcome holds until the next maintenance point
        session.tick(Duration::from_millis(99));
        assert!(session.is_device_available());
        session.tick(Duration::from_millis(1));
        assert!(!session.is_device_available());
    }

    #[test]
    fn test_inactive_session_rejects_submissions() {
        let (wifi, _calls) = ScriptedGateway::boxed("WiFi", &[]);
        let mut session = Session::new(&config(), vec![wifi], None);
        session.set_active(false);
        assert_eq!(session.submit(cmd(0, 10)), Admission::Rejected);
        assert!(!session.is_active());
    }

    #[test]
    fn test_debug_mode_follows_active_gateway() {
        let (usb, _calls) = ScriptedGateway::boxed("USB", &[Established]);
        let mut session = Session::new(&config(), vec![usb], None);
        assert_eq!(session.device_debug_mode(), None);
        session.maintain();
        // Scripted gateways keep the trait default
        assert_eq!(session.device_debug_mode(), None);
    }

    #[test]
    fn test_drop_disposes_gateways() {
        let (usb, calls) = ScriptedGateway::boxed("USB", &[]);
        drop(Session::new(&config(), vec![usb], None));
        assert!(calls.lock().disposed);
    }
}
