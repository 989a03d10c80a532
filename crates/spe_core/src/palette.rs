//! Indexed-colour palettes shared by sprites.
//!
//! A palette maps a single-character key (conventionally a hex digit `0`-`f`)
//! to an RGBA colour. Keys missing from a palette decode to fully transparent
//! pixels, so a sprite can leave holes simply by using an unmapped key.

use image::Rgba;
use std::collections::BTreeMap;

/// Conventional upper bound on palette size; one key per hex digit.
pub const MAX_PALETTE_COLOURS: usize = 16;

/// Keys assigned to imported colours, in slot order.
pub const PALETTE_SLOTS: [char; MAX_PALETTE_COLOURS] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    entries: BTreeMap<char, Rgba<u8>>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: char, colour: Rgba<u8>) -> Option<Rgba<u8>> {
        self.entries.insert(key, colour)
    }

    pub fn get(&self, key: char) -> Option<Rgba<u8>> {
        self.entries.get(&key).copied()
    }

    /// Colour for `key`, or transparent when the key is unmapped.
    pub fn colour_or_transparent(&self, key: char) -> Rgba<u8> {
        self.get(key).unwrap_or(TRANSPARENT)
    }

    /// Reverse lookup used by asset import.
    pub fn key_for(&self, colour: Rgba<u8>) -> Option<char> {
        self.entries
            .iter()
            .find(|(_, c)| **c == colour)
            .map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, Rgba<u8>)> + '_ {
        self.entries.iter().map(|(k, c)| (*k, *c))
    }
}

impl FromIterator<(char, Rgba<u8>)> for Palette {
    fn from_iter<T: IntoIterator<Item = (char, Rgba<u8>)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[(char, [u8; 4]); N]> for Palette {
    fn from(entries: [(char, [u8; 4]); N]) -> Self {
        entries
            .into_iter()
            .map(|(key, rgba)| (key, Rgba(rgba)))
            .collect()
    }
}
