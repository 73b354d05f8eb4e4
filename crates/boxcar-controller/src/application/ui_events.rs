//! UI control events and the bus that fans them out to the drive states.
//!
//! A control surface (the console in the binary, or a phone app's touch
//! buttons) publishes [`UiEvent`]s on a [`UiEventBus`].  Each drive state holds
//! its own [`UiEventSubscriber`] and drains it once per tick.
//!
//! The bus is a `tokio::sync::broadcast` channel wrapped in a cloneable
//! handle.  It is passed by value into every drive state; there is no global
//! bus.

use boxcar_core::Command;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

/// Default number of events a slow subscriber may fall behind before it
/// starts losing the oldest ones.
pub const DEFAULT_UI_BUS_CAPACITY: usize = 64;

/// A button press or slider change on a control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Left,
    Right,
    Forward,
    Backward,
    Stop,
    /// The autonomous-mode switch was flipped on (`true`) or off (`false`).
    AutoMode(bool),
    /// The speed slider moved to this value.
    Speed(u8),
}

impl UiEvent {
    /// The engine command this event maps to, if it maps to one directly.
    ///
    /// `Stop` and `AutoMode` change the drive mode instead of sending a
    /// command, so they return `None`.
    pub fn command(self) -> Option<Command> {
        match self {
            UiEvent::Left => Some(Command::Left),
            UiEvent::Right => Some(Command::Right),
            UiEvent::Forward => Some(Command::Forward),
            UiEvent::Backward => Some(Command::Backward),
            UiEvent::Speed(speed) => Some(Command::SetSpeed(speed)),
            UiEvent::Stop | UiEvent::AutoMode(_) => None,
        }
    }

    /// `true` for the four movement buttons.
    pub fn is_directional(self) -> bool {
        matches!(
            self,
            UiEvent::Left | UiEvent::Right | UiEvent::Forward | UiEvent::Backward
        )
    }
}

/// Cloneable publisher handle for [`UiEvent`]s.
#[derive(Debug, Clone)]
pub struct UiEventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl Default for UiEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_UI_BUS_CAPACITY)
    }
}

impl UiEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `event` to every current subscriber.
    ///
    /// Returns the number of subscribers that will see it.  Publishing with
    /// no subscribers is not an error; the event is simply dropped.
    pub fn publish(&self, event: UiEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Creates a subscriber that sees every event published from now on.
    pub fn subscribe(&self) -> UiEventSubscriber {
        UiEventSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a [`UiEventBus`].
#[derive(Debug)]
pub struct UiEventSubscriber {
    rx: broadcast::Receiver<UiEvent>,
}

impl UiEventSubscriber {
    /// Returns every event received since the last call, oldest first,
    /// without waiting.
    ///
    /// If the subscriber fell behind, the lost events are logged and the
    /// remaining ones are still returned.
    pub fn drain(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("UI subscriber lagged; {skipped} event(s) lost");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }
}
