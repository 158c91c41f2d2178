// src/input_system.rs
//! Keyboard state for the orbit camera and the culling-path toggle.
//!
//! Arrow keys orbit, W/S zoom, G switches between CPU and GPU culling.

use std::collections::HashSet;

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::camera::OrbitInput;

#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    path_toggles: u32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a winit keyboard event.
    pub fn handle_event(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(code) = event.physical_key {
            self.handle_key(code, event.state, event.repeat);
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, state: ElementState, repeat: bool) {
        match state {
            ElementState::Pressed => {
                if code == KeyCode::KeyG && !repeat {
                    self.path_toggles += 1;
                }
                self.held.insert(code);
            }
            ElementState::Released => {
                self.held.remove(&code);
            }
        }
    }

    /// Drop held keys, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.held.clear();
    }

    #[inline]
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.held.contains(&code)
    }

    fn axis(&self, negative: KeyCode, positive: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.is_held(negative) {
            value -= 1.0;
        }
        if self.is_held(positive) {
            value += 1.0;
        }
        value
    }

    pub fn orbit_input(&self) -> OrbitInput {
        OrbitInput {
            yaw: self.axis(KeyCode::ArrowLeft, KeyCode::ArrowRight),
            pitch: self.axis(KeyCode::ArrowDown, KeyCode::ArrowUp),
            zoom: self.axis(KeyCode::KeyS, KeyCode::KeyW),
        }
    }

    /// True if G was pressed an odd number of times since the last call.
    pub fn take_path_toggle(&mut self) -> bool {
        let toggled = self.path_toggles % 2 == 1;
        self.path_toggles = 0;
        toggled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_map_to_axes() {
        let mut input = InputState::new();
        input.handle_key(KeyCode::ArrowRight, ElementState::Pressed, false);
        input.handle_key(KeyCode::KeyS, ElementState::Pressed, false);
        assert_eq!(
            input.orbit_input(),
            OrbitInput {
                yaw: 1.0,
                pitch: 0.0,
                zoom: -1.0
            }
        );

        input.handle_key(KeyCode::ArrowLeft, ElementState::Pressed, false);
        assert_eq!(input.orbit_input().yaw, 0.0);

        input.handle_key(KeyCode::ArrowRight, ElementState::Released, false);
        input.handle_key(KeyCode::KeyS, ElementState::Released, false);
        assert_eq!(input.orbit_input().yaw, -1.0);
        assert_eq!(input.orbit_input().zoom, 0.0);

        input.clear();
        assert_eq!(input.orbit_input(), OrbitInput::default());
    }

    #[test]
    fn toggle_ignores_repeats_and_pairs() {
        let mut input = InputState::new();
        input.handle_key(KeyCode::KeyG, ElementState::Pressed, false);
        input.handle_key(KeyCode::KeyG, ElementState::Pressed, true);
        assert!(input.take_path_toggle());
        assert!(!input.take_path_toggle());

        input.handle_key(KeyCode::KeyG, ElementState::Pressed, false);
        input.handle_key(KeyCode::KeyG, ElementState::Released, false);
        input.handle_key(KeyCode::KeyG, ElementState::Pressed, false);
        assert!(!input.take_path_toggle());
    }
}
