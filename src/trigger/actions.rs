//! Injected action handlers
//!
//! The engine does not beep, write files or touch a UI itself. Whoever owns
//! the engine registers one callback per [`TriggerAction`]; actions without a
//! registered handler are ignored.

use crate::trigger::types::{TriggerAction, TriggerEvent};

/// Callback invoked when a trigger with the matching action fires
pub type ActionHandler = Box<dyn FnMut(&TriggerEvent) + Send>;

/// One optional handler slot per action kind
#[derive(Default)]
pub struct ActionHandlers {
    visual: Option<ActionHandler>,
    audio: Option<ActionHandler>,
    log: Option<ActionHandler>,
    pause: Option<ActionHandler>,
    highlight: Option<ActionHandler>,
}

impl ActionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for an action
    pub fn set<F>(&mut self, action: TriggerAction, handler: F)
    where
        F: FnMut(&TriggerEvent) + Send + 'static,
    {
        *self.slot_mut(action) = Some(Box::new(handler));
    }

    /// Remove the handler for an action
    pub fn unset(&mut self, action: TriggerAction) {
        *self.slot_mut(action) = None;
    }

    pub fn is_set(&self, action: TriggerAction) -> bool {
        match action {
            TriggerAction::VisualAlert => self.visual.is_some(),
            TriggerAction::AudioAlert => self.audio.is_some(),
            TriggerAction::LogToFile => self.log.is_some(),
            TriggerAction::PauseCapture => self.pause.is_some(),
            TriggerAction::HighlightMessage => self.highlight.is_some(),
        }
    }

    /// Invoke the handler for `action`, if any. Returns whether one ran.
    pub fn dispatch(&mut self, action: TriggerAction, event: &TriggerEvent) -> bool {
        match self.slot_mut(action) {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    fn slot_mut(&mut self, action: TriggerAction) -> &mut Option<ActionHandler> {
        match action {
            TriggerAction::VisualAlert => &mut self.visual,
            TriggerAction::AudioAlert => &mut self.audio,
            TriggerAction::LogToFile => &mut self.log,
            TriggerAction::PauseCapture => &mut self.pause,
            TriggerAction::HighlightMessage => &mut self.highlight,
        }
    }
}

impl std::fmt::Debug for ActionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<_> = TriggerAction::ALL
            .into_iter()
            .filter(|a| self.is_set(*a))
            .collect();
        f.debug_struct("ActionHandlers")
            .field("registered", &registered)
            .finish()
    }
}
