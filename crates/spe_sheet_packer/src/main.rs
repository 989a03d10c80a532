use image::{Rgba, RgbaImage};
use serde::Serialize;
use spe_core::palette::{Palette, MAX_PALETTE_COLOURS, PALETTE_SLOTS, TRANSPARENT};
use spe_core::sprite::encode_rows;
use spe_core::SPRITE_SIZE;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const SHEET_VERSION: &str = "0.1";

#[derive(Debug, Serialize)]
struct SheetFile {
    version: String,
    sheet_id: String,
    columns: u32,
    rows: u32,
    palette: BTreeMap<String, [u8; 4]>,
    sprites: Vec<SheetSprite>,
}

#[derive(Debug, Serialize)]
struct SheetSprite {
    column: u32,
    row: u32,
    scanlines: Vec<String>,
}

fn usage() -> String {
    "Usage: cargo run -p spe_sheet_packer -- <input.png> <output.sheet.json> [sheet_id]\nExample: cargo run -p spe_sheet_packer -- art/hero.png assets/sheets/hero.sheet.json hero".to_string()
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        return Err(usage());
    }

    let input_path = PathBuf::from(&args[1]);
    let output_path = PathBuf::from(&args[2]);
    let sheet_id = match args.get(3) {
        Some(id) => id.clone(),
        None => default_sheet_id(&input_path)?,
    };

    let image = image::open(&input_path)
        .map_err(|e| format!("Failed to open '{}': {e}", input_path.display()))?
        .to_rgba8();
    let sheet = pack_sheet(&image, &sheet_id)?;

    let json = serde_json::to_string_pretty(&sheet)
        .map_err(|e| format!("Failed to serialize sheet '{}': {e}", sheet_id))?;
    let json_tmp = temporary_output_path(&output_path);
    fs::write(&json_tmp, json)
        .map_err(|e| format!("Failed to write '{}': {e}", json_tmp.display()))?;
    promote_temporary_file(&json_tmp, &output_path)?;

    log::info!(
        "Packed {} ({}x{} cells, {} colours) into sheet '{}' at {}",
        input_path.display(),
        sheet.columns,
        sheet.rows,
        sheet.palette.len(),
        sheet.sheet_id,
        output_path.display()
    );
    Ok(())
}

fn default_sheet_id(input_path: &Path) -> Result<String, String> {
    input_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            format!(
                "Cannot derive a sheet_id from '{}'; pass one explicitly",
                input_path.display()
            )
        })
}

fn pack_sheet(image: &RgbaImage, sheet_id: &str) -> Result<SheetFile, String> {
    if sheet_id.is_empty() || sheet_id.contains('@') {
        return Err(format!(
            "Invalid sheet_id '{}': must be non-empty and must not contain '@'",
            sheet_id
        ));
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || width % SPRITE_SIZE != 0 || height % SPRITE_SIZE != 0 {
        return Err(format!(
            "Image is {}x{}; both dimensions must be non-zero multiples of {}",
            width, height, SPRITE_SIZE
        ));
    }

    let palette = build_palette(image)?;
    let columns = width / SPRITE_SIZE;
    let rows = height / SPRITE_SIZE;

    let mut sprites = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let scanlines = encode_cell(image, &palette, column, row)?;
            sprites.push(SheetSprite {
                column,
                row,
                scanlines: scanlines.iter().map(|word| format!("{word:08x}")).collect(),
            });
        }
    }

    Ok(SheetFile {
        version: SHEET_VERSION.to_string(),
        sheet_id: sheet_id.to_string(),
        columns,
        rows,
        palette: palette
            .iter()
            .map(|(key, colour)| (key.to_string(), colour.0))
            .collect(),
        sprites,
    })
}

/// Fully transparent pixels all share one colour.
fn normalize(colour: Rgba<u8>) -> Rgba<u8> {
    if colour[3] == 0 {
        TRANSPARENT
    } else {
        colour
    }
}

/// Assign palette keys `0`..`f` to colours in first-seen, row-major order.
fn build_palette(image: &RgbaImage) -> Result<Palette, String> {
    let mut palette = Palette::new();
    for (x, y, pixel) in image.enumerate_pixels() {
        let colour = normalize(*pixel);
        if palette.key_for(colour).is_some() {
            continue;
        }
        let Some(&slot) = PALETTE_SLOTS.get(palette.len()) else {
            return Err(format!(
                "Image uses more than {} colours; colour {:?} first appears at ({}, {})",
                MAX_PALETTE_COLOURS, colour.0, x, y
            ));
        };
        palette.insert(slot, colour);
    }
    Ok(palette)
}

fn encode_cell(
    image: &RgbaImage,
    palette: &Palette,
    column: u32,
    row: u32,
) -> Result<Vec<u32>, String> {
    let mut pixel_rows = Vec::with_capacity(SPRITE_SIZE as usize);
    for y in 0..SPRITE_SIZE {
        let mut keys = String::with_capacity(SPRITE_SIZE as usize);
        for x in 0..SPRITE_SIZE {
            let colour = normalize(*image.get_pixel(column * SPRITE_SIZE + x, row * SPRITE_SIZE + y));
            let key = palette.key_for(colour).ok_or_else(|| {
                format!("Colour {:?} missing from palette in cell {},{}", colour.0, column, row)
            })?;
            keys.push(key);
        }
        pixel_rows.push(keys);
    }
    let rows: Vec<&str> = pixel_rows.iter().map(String::as_str).collect();
    encode_rows(&rows).map_err(|e| format!("Cell {},{}: {e}", column, row))
}

fn temporary_output_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("output");
    path.with_file_name(format!("{file_name}.tmp"))
}

fn promote_temporary_file(temp_path: &Path, final_path: &Path) -> Result<(), String> {
    if final_path.exists() {
        fs::remove_file(final_path).map_err(|e| {
            format!(
                "Failed to replace existing output '{}': {e}",
                final_path.display()
            )
        })?;
    }
    fs::rename(temp_path, final_path).map_err(|e| {
        format!(
            "Failed to move temporary output '{}' -> '{}': {e}",
            temp_path.display(),
            final_path.display()
        )
    })
}
