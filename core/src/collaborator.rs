//! Seams to the presentation layer.
//!
//! The engine owns none of these. Each is optional and receives data
//! only; nothing a collaborator does can feed back into a result.

use crate::{
    event::SimEvent,
    market::MarketPoint,
    notification::Notification,
    operation::CueKind,
    snapshot::SimSnapshot,
    types::Amount,
};

/// Subscription to everything the engine publishes.
pub trait SimObserver: Send {
    fn on_event(&mut self, _event: &SimEvent) {}
    fn on_snapshot(&mut self, _snapshot: &SimSnapshot) {}
}

pub trait CuePlayer: Send {
    fn play(&mut self, cue: CueKind);
}

pub trait ChartRenderer: Send {
    fn render(&mut self, series: &[MarketPoint]);
}

/// Invoked once per completed simulation, never before.
pub trait CompletionTarget: Send {
    fn on_simulation_completed(&mut self, final_balance: Amount);
}

pub trait NotificationSink: Send {
    fn post(&mut self, notification: &Notification);
}

#[derive(Default)]
pub struct Collaborators {
    pub observers:     Vec<Box<dyn SimObserver>>,
    pub cue_player:    Option<Box<dyn CuePlayer>>,
    pub chart:         Option<Box<dyn ChartRenderer>>,
    pub completion:    Option<Box<dyn CompletionTarget>>,
    pub notifications: Option<Box<dyn NotificationSink>>,
}

impl Collaborators {
    pub(crate) fn dispatch_event(&mut self, event: &SimEvent) {
        match event {
            SimEvent::SeriesUpdated { points, .. } => {
                if let Some(chart) = self.chart.as_mut() {
                    chart.render(points);
                }
            }
            SimEvent::ResultRevealed { cue, .. } => {
                if let Some(player) = self.cue_player.as_mut() {
                    player.play(*cue);
                }
            }
            SimEvent::SimulationCompleted { final_balance, .. } => {
                if let Some(target) = self.completion.as_mut() {
                    target.on_simulation_completed(*final_balance);
                }
            }
            SimEvent::NotificationPosted { notification, .. } => {
                if let Some(sink) = self.notifications.as_mut() {
                    sink.post(notification);
                }
            }
            _ => {}
        }
        for observer in &mut self.observers {
            observer.on_event(event);
        }
    }

    pub(crate) fn dispatch_snapshot(&mut self, snapshot: &SimSnapshot) {
        for observer in &mut self.observers {
            observer.on_snapshot(snapshot);
        }
    }
}
