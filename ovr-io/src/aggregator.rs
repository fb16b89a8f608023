//! Per-cycle odorant command aggregation
//!
//! Producers submit commands at any rate; once per cycle the session drains
//! the set and hands it to the active gateway. Between drains the set:
//!
//! - holds at most `max_commands` entries (the device's recharge budget)
//! - never holds two commands for the same slot; a repeat averages intensities
//! - ignores zero-intensity commands and anything the admission filter blocks

use crate::core::types::OdorantCommand;

/// External admission filter (slot/name blacklist).
///
/// The session calls [`CommandFilter::update`] once per cycle before draining.
pub trait CommandFilter: Send {
    /// Refresh filter state
    fn update(&mut self) {}

    fn blocks_slot(&self, slot: u8) -> bool;

    fn blocks_name(&self, name: &str) -> bool;
}

/// What happened to a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Appended as a new slot
    Inserted,
    /// Merged into the existing command for its slot
    Averaged,
    /// Dropped (inactive, filtered, full, or zero intensity)
    Rejected,
}

/// Insertion-ordered, slot-unique command set
pub struct CommandAggregator {
    commands: Vec<OdorantCommand>,
    max_commands: usize,
    active: bool,
    filter: Option<Box<dyn CommandFilter>>,
}

impl CommandAggregator {
    pub fn new(max_commands: usize) -> Self {
        Self {
            commands: Vec::with_capacity(max_commands),
            max_commands,
            active: true,
            filter: None,
        }
    }

    /// Attach an admission filter
    pub fn with_filter(mut self, filter: Box<dyn CommandFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn set_filter(&mut self, filter: Option<Box<dyn CommandFilter>>) {
        self.filter = filter;
    }

    pub fn max_commands(&self) -> usize {
        self.max_commands
    }

    /// Global admission switch; while off every `add` is rejected
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Submit a command for this cycle
    pub fn add(&mut self, command: OdorantCommand) -> Admission {
        if !self.active || self.is_filtered(&command) {
            return Admission::Rejected;
        }

        if self.commands.len() >= self.max_commands || command.intensity() == 0 {
            return Admission::Rejected;
        }

        if let Some(existing) = self
            .commands
            .iter_mut()
            .find(|c| c.slot() == command.slot())
        {
            let mean = (existing.intensity() as u32 + command.intensity() as u32) / 2;
            existing.set_intensity(mean as u16);
            return Admission::Averaged;
        }

        self.commands.push(command);
        Admission::Inserted
    }

    /// Take this cycle's commands, leaving the set empty
    pub fn drain(&mut self) -> Vec<OdorantCommand> {
        std::mem::replace(&mut self.commands, Vec::with_capacity(self.max_commands))
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Let the filter refresh itself
    pub fn update_filter(&mut self) {
        if let Some(filter) = self.filter.as_mut() {
            filter.update();
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[OdorantCommand] {
        &self.commands
    }

    fn is_filtered(&self, command: &OdorantCommand) -> bool {
        self.filter
            .as_ref()
            .is_some_and(|f| f.blocks_slot(command.slot()) || f.blocks_name(command.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Algorithm;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cmd(slot: u8, intensity: u16) -> OdorantCommand {
        OdorantCommand::new(format!("odor{}", slot), slot, Algorithm::Burst, intensity)
    }

    struct Blacklist {
        slots: Vec<u8>,
        names: Vec<String>,
        updates: Arc<AtomicUsize>,
    }

    impl CommandFilter for Blacklist {
        fn update(&mut self) {
            self.updates.fetch_add(1, Ordering::Relaxed);
        }

        fn blocks_slot(&self, slot: u8) -> bool {
            self.slots.contains(&slot)
        }

        fn blocks_name(&self, name: &str) -> bool {
            self.names.iter().any(|n| n == name)
        }
    }

    #[test]
    fn test_duplicate_slot_is_averaged() {
        let mut agg = CommandAggregator::new(9);
        assert_eq!(agg.add(cmd(2, 100)), Admission::Inserted);
        assert_eq!(agg.add(cmd(2, 50)), Admission::Averaged);

        assert_eq!(agg.len(), 1);
        assert_eq!(agg.commands()[0].slot(), 2);
        assert_eq!(agg.commands()[0].intensity(), 75);
    }

    #[test]
    fn test_average_rounds_down_without_overflow() {
        let mut agg = CommandAggregator::new(9);
        agg.add(cmd(1, u16::MAX));
        agg.add(cmd(1, u16::MAX - 2));
        assert_eq!(agg.commands()[0].intensity(), u16::MAX - 1);

        agg.add(cmd(3, 3));
        agg.add(cmd(3, 4));
        assert_eq!(agg.commands()[1].intensity(), 3);
    }

    #[test]
    fn test_zero_intensity_rejected() {
        let mut agg = CommandAggregator::new(9);
        assert_eq!(agg.add(cmd(0, 0)), Admission::Rejected);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let mut agg = CommandAggregator::new(2);
        agg.add(cmd(0, 10));
        agg.add(cmd(1, 10));
        assert_eq!(agg.add(cmd(2, 10)), Admission::Rejected);
        // A full set rejects duplicates too
        assert_eq!(agg.add(cmd(0, 30)), Admission::Rejected);
        assert_eq!(agg.commands()[0].intensity(), 10);
    }

    #[test]
    fn test_inactive_rejects_everything() {
        let mut agg = CommandAggregator::new(9);
        agg.set_active(false);
        assert_eq!(agg.add(cmd(0, 10)), Admission::Rejected);
        agg.set_active(true);
        assert_eq!(agg.add(cmd(0, 10)), Admission::Inserted);
    }

    #[test]
    fn test_filter_blocks_slot_and_name() {
        let updates = Arc::new(AtomicUsize::new(0));
        let mut agg = CommandAggregator::new(9).with_filter(Box::new(Blacklist {
            slots: vec![4],
            names: vec!["odor7".to_string()],
            updates: Arc::clone(&updates),
        }));

        assert_eq!(agg.add(cmd(4, 10)), Admission::Rejected);
        assert_eq!(agg.add(cmd(7, 10)), Admission::Rejected);
        assert_eq!(agg.add(cmd(5, 10)), Admission::Inserted);

        agg.update_filter();
        assert_eq!(updates.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_drain_preserves_order_and_clears() {
        let mut agg = CommandAggregator::new(9);
        agg.add(cmd(5, 10));
        agg.add(cmd(1, 20));
        agg.add(cmd(3, 30));

        let drained = agg.drain();
        let slots: Vec<u8> = drained.iter().map(|c| c.slot()).collect();
        assert_eq!(slots, vec![5, 1, 3]);
        assert!(agg.is_empty());
    }
}
