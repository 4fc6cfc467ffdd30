//! Decorative activity feed shown beside the simulation.
//!
//! RULE: the feed is cosmetic. It draws from its own stream slot and
//! never reads or writes simulation state, so enabling it changes no
//! wager, balance or chart.

use crate::{
    rng::{RngBank, StreamRng, StreamSlot},
    types::{ms_to_ticks, Tick},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled:     bool,
    pub interval_ms: u64,
    /// Chance that a given interval posts anything.
    pub probability: f64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true, interval_ms: 6_000, probability: 0.6 }
    }
}

impl NotificationSettings {
    pub fn interval(&self) -> Tick {
        ms_to_ticks(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub username: String,
    pub message:  String,
    /// Two decimal places, within [10.00, 60.00).
    pub profit:   f64,
}

/// Deterministic notification text from curated pools.
pub struct NotificationGenerator;

impl NotificationGenerator {
    pub fn generate(rng: &mut StreamRng) -> Notification {
        let names = Self::usernames();
        let messages = Self::messages();
        let username = names[rng.index_below(names.len())];
        let message = messages[rng.index_below(messages.len())];
        let cents = (rng.next_f64() * 5_000.0).floor();
        Notification {
            username: username.to_string(),
            message:  message.to_string(),
            profit:   cents / 100.0 + 10.0,
        }
    }

    fn usernames() -> &'static [&'static str] {
        &[
            "João", "Maria", "Pedro", "Ana", "Lucas", "Julia", "Mateus",
            "Beatriz", "Rafael", "Lara", "Gustavo", "Sofia", "Carlos", "Camila",
            "Fernando", "Amanda", "Eduardo", "Larissa", "Roberto", "Mariana",
        ]
    }

    fn messages() -> &'static [&'static str] {
        &["just closed a profitable operation!"]
    }
}

/// Rolls the feed once per interval. Each roll reads a fresh salted
/// stream, so the sequence is fixed by the seed alone.
#[derive(Debug, Clone)]
pub struct NotificationFeed {
    settings: NotificationSettings,
    bank:     RngBank,
    rolled:   u64,
}

impl NotificationFeed {
    pub fn new(settings: NotificationSettings, bank: RngBank) -> Self {
        Self { settings, bank, rolled: 0 }
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// `None` when this interval stays quiet.
    pub fn roll(&mut self) -> Option<Notification> {
        let mut rng = self.bank.for_stream(StreamSlot::Notification, self.rolled);
        self.rolled += 1;
        if rng.next_f64() < self.settings.probability {
            Some(NotificationGenerator::generate(&mut rng))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let bank = RngBank::new(12345);
        let a = NotificationGenerator::generate(&mut bank.for_stream(StreamSlot::Notification, 1));
        let b = NotificationGenerator::generate(&mut bank.for_stream(StreamSlot::Notification, 1));
        assert_eq!(a, b, "Same seed should produce the same notification");
    }

    #[test]
    fn generates_valid_notifications() {
        let mut rng = RngBank::new(12345).for_stream(StreamSlot::Notification, 0);
        for _ in 0..200 {
            let n = NotificationGenerator::generate(&mut rng);
            assert!(NotificationGenerator::usernames().contains(&n.username.as_str()));
            assert!(!n.message.is_empty());
            assert!((10.0..60.0).contains(&n.profit), "profit {} out of range", n.profit);
            let cents = n.profit * 100.0;
            assert!((cents - cents.round()).abs() < 1e-6, "profit {} not in cents", n.profit);
        }
    }

    #[test]
    fn probability_bounds_are_respected() {
        let quiet = NotificationSettings { probability: 0.0, ..Default::default() };
        let mut feed = NotificationFeed::new(quiet, RngBank::new(3));
        assert!((0..100).all(|_| feed.roll().is_none()));

        let loud = NotificationSettings { probability: 1.0, ..Default::default() };
        let mut feed = NotificationFeed::new(loud, RngBank::new(3));
        assert!((0..100).all(|_| feed.roll().is_some()));
    }

    #[test]
    fn default_feed_posts_most_intervals() {
        let mut feed = NotificationFeed::new(NotificationSettings::default(), RngBank::new(77));
        let posted = (0..1_000).filter(|_| feed.roll().is_some()).count();
        assert!((500..700).contains(&posted), "posted {posted} of 1000");
    }
}
