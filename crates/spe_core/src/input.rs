//! Keyboard state tracking that turns held-key snapshots into press/release
//! events.
//!
//! The frame driver feeds either raw key transitions (`key_down` / `key_up`)
//! or a whole held-key set per tick (`apply_held`); listeners only ever see
//! the returned events. Only real transitions produce a `KeyEvent`: pressing
//! a key that is already down is a no-op, so listeners never see a repeated
//! press without a release in between.

use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Left,
    Right,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub direction: KeyDirection,
}

impl KeyEvent {
    pub fn press(key: Key) -> Self {
        Self {
            key,
            direction: KeyDirection::Press,
        }
    }

    pub fn release(key: Key) -> Self {
        Self {
            key,
            direction: KeyDirection::Release,
        }
    }

    pub fn is_press(&self) -> bool {
        self.direction == KeyDirection::Press
    }
}

pub struct InputState {
    held: HashSet<Key>,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
        }
    }

    pub fn key_down(&mut self, key: Key) -> Option<KeyEvent> {
        if self.held.insert(key) {
            return Some(KeyEvent::press(key));
        }
        None
    }

    pub fn key_up(&mut self, key: Key) -> Option<KeyEvent> {
        if self.held.remove(&key) {
            return Some(KeyEvent::release(key));
        }
        None
    }

    /// Make `keys` the held set, returning the transitions in a stable
    /// order: releases first, then presses, each sorted by key.
    pub fn apply_held(&mut self, keys: &HashSet<Key>) -> Vec<KeyEvent> {
        let mut released: Vec<Key> = self.held.difference(keys).copied().collect();
        let mut pressed: Vec<Key> = keys.difference(&self.held).copied().collect();
        released.sort();
        pressed.sort();

        let mut events = Vec::with_capacity(released.len() + pressed.len());
        events.extend(released.into_iter().filter_map(|key| self.key_up(key)));
        events.extend(pressed.into_iter().filter_map(|key| self.key_down(key)));
        events
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}
