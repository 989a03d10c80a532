//! Sprite sheet loading and frame reference resolution.
//!
//! The sheet packer (spe_sheet_packer) outputs a JSON file holding one palette
//! and a grid of 16x16 sprites encoded as scanline words. Scenes refer to
//! frames by string:
//!
//! - `"<sheet_id>"` is the whole sheet as one sprite group
//! - `"<sheet_id>@<column>,<row>"` is a single cell
//!
//! `SpriteRegistry::resolve` is the lookup used while building levels.

use image::Rgba;
use serde::Deserialize;
use spe_core::palette::MAX_PALETTE_COLOURS;
use spe_core::{Compositable, Palette, Sprite, SpriteGroup, SCANLINE_COUNT};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Deserialize, Clone)]
pub struct SheetFile {
    pub version: String,
    pub sheet_id: String,
    pub columns: u32,
    pub rows: u32,
    pub palette: BTreeMap<String, [u8; 4]>,
    pub sprites: Vec<SheetSprite>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetSprite {
    pub column: u32,
    pub row: u32,
    pub scanlines: Vec<String>,
}

/// A decoded sheet: every cell as a sprite, plus the whole grid as a group.
#[derive(Debug, Clone)]
pub struct SpriteSheet {
    pub sheet_id: String,
    pub group: Rc<SpriteGroup>,
}

impl SpriteSheet {
    pub fn cell(&self, column: u32, row: u32) -> Option<Rc<Sprite>> {
        self.group.cell(column, row).cloned()
    }
}

pub fn load_sheet_from_path(path: &Path) -> Result<SpriteSheet, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read sprite sheet {}: {e}", path.display()))?;
    let sheet: SheetFile = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse sprite sheet {}: {e}", path.display()))?;
    validate_sheet(&sheet)?;
    build_sheet(&sheet)
}

fn validate_sheet(sheet: &SheetFile) -> Result<(), String> {
    if sheet.version != "0.1" {
        return Err(format!(
            "Sheet validation failed: unsupported version '{}'",
            sheet.version
        ));
    }
    if sheet.sheet_id.is_empty() {
        return Err("Sheet validation failed: sheet_id is empty".to_string());
    }
    if sheet.sheet_id.contains('@') {
        return Err(format!(
            "Sheet validation failed: sheet_id '{}' must not contain '@'",
            sheet.sheet_id
        ));
    }
    if sheet.columns == 0 || sheet.rows == 0 {
        return Err("Sheet validation failed: columns/rows must be > 0".to_string());
    }
    let expected = sheet.columns as usize * sheet.rows as usize;
    if sheet.sprites.len() != expected {
        return Err(format!(
            "Sheet validation failed: {}x{} sheet requires {} sprites, not {}",
            sheet.columns,
            sheet.rows,
            expected,
            sheet.sprites.len()
        ));
    }
    if sheet.palette.len() > MAX_PALETTE_COLOURS {
        return Err(format!(
            "Sheet validation failed: palette has {} colours (max {})",
            sheet.palette.len(),
            MAX_PALETTE_COLOURS
        ));
    }
    for key in sheet.palette.keys() {
        if key.chars().count() != 1 {
            return Err(format!(
                "Sheet validation failed: palette key '{}' must be a single character",
                key
            ));
        }
    }

    let mut cells = HashSet::new();
    for sprite in &sheet.sprites {
        if sprite.column >= sheet.columns || sprite.row >= sheet.rows {
            return Err(format!(
                "Sheet validation failed: sprite cell ({},{}) is outside the {}x{} grid",
                sprite.column, sprite.row, sheet.columns, sheet.rows
            ));
        }
        if !cells.insert((sprite.column, sprite.row)) {
            return Err(format!(
                "Sheet validation failed: duplicate sprite cell ({},{})",
                sprite.column, sprite.row
            ));
        }
        if sprite.scanlines.len() != SCANLINE_COUNT {
            return Err(format!(
                "Sheet validation failed: sprite ({},{}) has {} scanlines, expected {}",
                sprite.column,
                sprite.row,
                sprite.scanlines.len(),
                SCANLINE_COUNT
            ));
        }
        for scanline in &sprite.scanlines {
            if scanline.len() != 8 || !scanline.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!(
                    "Sheet validation failed: sprite ({},{}) scanline '{}' is not 8 hex digits",
                    sprite.column, sprite.row, scanline
                ));
            }
        }
    }

    let mut unmapped: Vec<char> = sheet
        .sprites
        .iter()
        .flat_map(|sprite| sprite.scanlines.iter())
        .flat_map(|scanline| scanline.chars())
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| !sheet.palette.keys().any(|key| key.starts_with(*c)))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if !unmapped.is_empty() {
        unmapped.sort();
        log::warn!(
            "Sheet '{}' uses palette keys {:?} with no colour. They will render transparent.",
            sheet.sheet_id,
            unmapped
        );
    }

    Ok(())
}

fn build_sheet(sheet: &SheetFile) -> Result<SpriteSheet, String> {
    let palette: Palette = sheet
        .palette
        .iter()
        .filter_map(|(key, rgba)| key.chars().next().map(|c| (c, Rgba(*rgba))))
        .collect();
    let palette = Rc::new(palette);

    let mut ordered: Vec<&SheetSprite> = sheet.sprites.iter().collect();
    ordered.sort_by_key(|sprite| (sprite.row, sprite.column));

    let mut sprites = Vec::with_capacity(ordered.len());
    for sprite in ordered {
        let words = sprite
            .scanlines
            .iter()
            .map(|line| u32::from_str_radix(line, 16))
            .collect::<Result<Vec<u32>, _>>()
            .map_err(|e| {
                format!(
                    "Sheet '{}' sprite ({},{}) has an invalid scanline: {e}",
                    sheet.sheet_id, sprite.column, sprite.row
                )
            })?;
        let decoded = Sprite::new(palette.clone(), &words)
            .map_err(|e| format!("Sheet '{}': {e}", sheet.sheet_id))?;
        sprites.push(Rc::new(decoded));
    }

    let group = SpriteGroup::new(sheet.columns, sheet.rows, sprites)
        .map_err(|e| format!("Sheet '{}': {e}", sheet.sheet_id))?;
    Ok(SpriteSheet {
        sheet_id: sheet.sheet_id.clone(),
        group: Rc::new(group),
    })
}

/// Registry over every loaded sheet, keyed by `sheet_id`.
#[derive(Debug, Clone, Default)]
pub struct SpriteRegistry {
    sheets: HashMap<String, SpriteSheet>,
}

impl SpriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a second sheet with an id that is already registered.
    pub fn add_sheet(&mut self, sheet: SpriteSheet) -> Result<(), String> {
        if self.sheets.contains_key(&sheet.sheet_id) {
            return Err(format!("Duplicate sheet_id '{}'", sheet.sheet_id));
        }
        log::debug!(
            "Registered sheet '{}' ({}x{})",
            sheet.sheet_id,
            sheet.group.columns(),
            sheet.group.rows()
        );
        self.sheets.insert(sheet.sheet_id.clone(), sheet);
        Ok(())
    }

    pub fn sheet(&self, sheet_id: &str) -> Option<&SpriteSheet> {
        self.sheets.get(sheet_id)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn resolve(&self, reference: &str) -> Option<Rc<dyn Compositable>> {
        match reference.split_once('@') {
            None => {
                let group = self.sheets.get(reference)?.group.clone();
                Some(group as Rc<dyn Compositable>)
            }
            Some((sheet_id, cell)) => {
                let (column, row) = cell.split_once(',')?;
                let column = column.trim().parse::<u32>().ok()?;
                let row = row.trim().parse::<u32>().ok()?;
                let sprite = self.sheets.get(sheet_id)?.cell(column, row)?;
                Some(sprite as Rc<dyn Compositable>)
            }
        }
    }

    pub fn resolve_frames(&self, references: &[String]) -> Result<Vec<Rc<dyn Compositable>>, String> {
        references
            .iter()
            .map(|reference| {
                self.resolve(reference)
                    .ok_or_else(|| format!("Unknown sprite reference '{}'", reference))
            })
            .collect()
    }
}
