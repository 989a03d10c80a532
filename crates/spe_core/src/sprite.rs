//! 16x16 indexed-colour sprites and the compositing capability they share
//! with sprite groups.
//!
//! A sprite is stored as 32 scanline words. Printed as zero-padded lowercase
//! hex, each word yields 8 palette keys, one per pixel. Words are consumed in
//! pairs: the even word is the left half of a pixel row, the following odd
//! word the right half, so word `i` lands on row `i / 2`.

use image::{imageops, RgbaImage};
use std::rc::Rc;

use crate::palette::Palette;

pub const SPRITE_SIZE: u32 = 16;
pub const SCANLINE_COUNT: usize = 32;

const PIXELS_PER_WORD: usize = 8;

/// Anything that can be painted at a position and reports its pixel size.
pub trait Compositable {
    /// Blend onto `canvas` with its top-left corner at (`target_x`, `target_y`).
    fn render(&self, canvas: &mut RgbaImage, target_x: i32, target_y: i32, mirrored: bool);
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

#[derive(Debug, Clone)]
pub struct Sprite {
    palette: Rc<Palette>,
    scanlines: [u32; SCANLINE_COUNT],
    upright: RgbaImage,
    mirrored: RgbaImage,
}

impl Sprite {
    pub fn new(palette: Rc<Palette>, scanlines: &[u32]) -> Result<Self, String> {
        let scanlines: [u32; SCANLINE_COUNT] = scanlines.try_into().map_err(|_| {
            format!(
                "Sprite validation failed: expected {} scanline words, got {}",
                SCANLINE_COUNT,
                scanlines.len()
            )
        })?;

        let upright = decode_image(&palette, &scanlines, false);
        let mirrored = decode_image(&palette, &scanlines, true);
        Ok(Self {
            palette,
            scanlines,
            upright,
            mirrored,
        })
    }

    /// Build a sprite from 16 rows of 16 hex-digit palette keys.
    pub fn from_rows(palette: Rc<Palette>, rows: &[&str]) -> Result<Self, String> {
        let scanlines = encode_rows(rows)?;
        Self::new(palette, &scanlines)
    }

    pub fn palette(&self) -> &Rc<Palette> {
        &self.palette
    }

    pub fn scanlines(&self) -> &[u32; SCANLINE_COUNT] {
        &self.scanlines
    }

    /// Palette key at every pixel, indexed `[y][x]`.
    pub fn pixel_keys(&self, mirrored: bool) -> [[char; 16]; 16] {
        decode_keys(&self.scanlines, mirrored)
    }

    /// The decoded 16x16 scratch image for one orientation.
    pub fn image(&self, mirrored: bool) -> &RgbaImage {
        if mirrored {
            &self.mirrored
        } else {
            &self.upright
        }
    }
}

impl Compositable for Sprite {
    fn render(&self, canvas: &mut RgbaImage, target_x: i32, target_y: i32, mirrored: bool) {
        let size = SPRITE_SIZE as i64;
        let (x, y) = (target_x as i64, target_y as i64);
        if x + size <= 0
            || y + size <= 0
            || x >= canvas.width() as i64
            || y >= canvas.height() as i64
        {
            return;
        }

        imageops::overlay(canvas, self.image(mirrored), x, y);
    }

    fn width(&self) -> u32 {
        SPRITE_SIZE
    }

    fn height(&self) -> u32 {
        SPRITE_SIZE
    }
}

fn decode_keys(scanlines: &[u32; SCANLINE_COUNT], mirrored: bool) -> [[char; 16]; 16] {
    let mut keys = [['0'; 16]; 16];
    for (i, word) in scanlines.iter().enumerate() {
        let y = i / 2;
        let x_offset = if i % 2 == 1 { PIXELS_PER_WORD } else { 0 };
        for (x, key) in format!("{word:08x}").chars().enumerate() {
            let mut x_pos = x_offset + x;
            if mirrored {
                x_pos = 15 - x_pos;
            }
            keys[y][x_pos] = key;
        }
    }
    keys
}

fn decode_image(palette: &Palette, scanlines: &[u32; SCANLINE_COUNT], mirrored: bool) -> RgbaImage {
    let keys = decode_keys(scanlines, mirrored);
    RgbaImage::from_fn(SPRITE_SIZE, SPRITE_SIZE, |x, y| {
        palette.colour_or_transparent(keys[y as usize][x as usize])
    })
}

/// Encode 16 rows of 16 hex-digit keys into 32 scanline words.
pub fn encode_rows(rows: &[&str]) -> Result<Vec<u32>, String> {
    if rows.len() != SPRITE_SIZE as usize {
        return Err(format!(
            "Sprite validation failed: expected {} pixel rows, got {}",
            SPRITE_SIZE,
            rows.len()
        ));
    }

    let mut scanlines = Vec::with_capacity(SCANLINE_COUNT);
    for (y, row) in rows.iter().enumerate() {
        if row.len() != SPRITE_SIZE as usize || !row.is_ascii() {
            return Err(format!(
                "Sprite validation failed: row {} must be {} hex digits, got '{}'",
                y, SPRITE_SIZE, row
            ));
        }
        let (left, right) = row.split_at(PIXELS_PER_WORD);
        for half in [left, right] {
            let word = u32::from_str_radix(half, 16).map_err(|e| {
                format!("Sprite validation failed: row {} is not hex ('{}'): {e}", y, row)
            })?;
            scanlines.push(word);
        }
    }
    Ok(scanlines)
}
