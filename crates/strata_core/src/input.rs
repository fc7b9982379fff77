//! Input edge events
//!
//! Device drivers are outside the runtime. The engine only needs to tell the
//! input layer when a tick batch starts and ends, through [`InputDevice`].

use std::collections::HashMap;

/// Hooks the engine calls on the input layer
pub trait InputDevice: Send {
    /// Called once before a tick batch: consume pending mouse motion
    fn release_move_event(&mut self);
    /// Called after every tick: age edge events into steady states
    fn clear_inputs(&mut self);
}

/// State of one input
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputStatus {
    #[default]
    Inactive,
    JustActivated,
    Active,
    JustReleased,
}

impl InputStatus {
    pub fn is_down(self) -> bool {
        matches!(self, InputStatus::JustActivated | InputStatus::Active)
    }
}

/// Keyboard/mouse state fed by a platform layer
#[derive(Debug, Default)]
pub struct InputEvents {
    inputs: HashMap<String, InputStatus>,
    text: String,
    pending_motion: (f64, f64),
    motion: (f64, f64),
    clears: u64,
}

impl InputEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a press of `input` (a key or button name)
    pub fn press(&mut self, input: &str) {
        let status = self.inputs.entry(input.to_string()).or_default();
        if !status.is_down() {
            *status = InputStatus::JustActivated;
        }
    }

    pub fn release(&mut self, input: &str) {
        if let Some(status) = self.inputs.get_mut(input) {
            if status.is_down() {
                *status = InputStatus::JustReleased;
            }
        }
    }

    pub fn status(&self, input: &str) -> InputStatus {
        self.inputs.get(input).copied().unwrap_or_default()
    }

    /// Append typed text for this tick
    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Accumulate raw mouse motion until the next tick batch
    pub fn process_mouse_motion(&mut self, dx: f64, dy: f64) {
        self.pending_motion.0 += dx;
        self.pending_motion.1 += dy;
    }

    /// Mouse motion visible to logic during the current batch
    pub fn mouse_motion(&self) -> (f64, f64) {
        self.motion
    }

    /// Number of times edge events were cleared
    pub fn clear_count(&self) -> u64 {
        self.clears
    }
}

impl InputDevice for InputEvents {
    fn release_move_event(&mut self) {
        self.motion = std::mem::take(&mut self.pending_motion);
    }

    fn clear_inputs(&mut self) {
        self.inputs.retain(|_, status| {
            match *status {
                InputStatus::JustActivated => *status = InputStatus::Active,
                InputStatus::JustReleased => *status = InputStatus::Inactive,
                _ => {}
            }
            *status != InputStatus::Inactive
        });
        self.text.clear();
        self.motion = (0.0, 0.0);
        self.clears += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_is_edge_then_steady() {
        let mut input = InputEvents::new();
        input.press("space");
        assert_eq!(input.status("space"), InputStatus::JustActivated);

        input.clear_inputs();
        assert_eq!(input.status("space"), InputStatus::Active);

        input.press("space");
        assert_eq!(input.status("space"), InputStatus::Active);
    }

    #[test]
    fn test_release_clears_after_tick() {
        let mut input = InputEvents::new();
        input.press("w");
        input.clear_inputs();
        input.release("w");
        assert_eq!(input.status("w"), InputStatus::JustReleased);

        input.clear_inputs();
        assert_eq!(input.status("w"), InputStatus::Inactive);
        assert_eq!(input.clear_count(), 2);
    }

    #[test]
    fn test_motion_released_per_batch() {
        let mut input = InputEvents::new();
        input.process_mouse_motion(3.0, -1.0);
        input.process_mouse_motion(1.0, 0.0);
        assert_eq!(input.mouse_motion(), (0.0, 0.0));

        input.release_move_event();
        assert_eq!(input.mouse_motion(), (4.0, -1.0));

        input.clear_inputs();
        assert_eq!(input.mouse_motion(), (0.0, 0.0));
    }

    #[test]
    fn test_text_cleared() {
        let mut input = InputEvents::new();
        input.push_text("ab");
        assert_eq!(input.text(), "ab");
        input.clear_inputs();
        assert!(input.text().is_empty());
    }
}
