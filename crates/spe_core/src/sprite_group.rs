//! Rectangular grids of sprites that behave as one larger sprite.

use image::RgbaImage;
use std::rc::Rc;

use crate::sprite::{Compositable, Sprite, SPRITE_SIZE};

/// A `columns` x `rows` grid of sprites, stored row-major.
#[derive(Debug, Clone)]
pub struct SpriteGroup {
    columns: u32,
    rows: u32,
    sprites: Vec<Rc<Sprite>>,
}

impl SpriteGroup {
    pub fn new(columns: u32, rows: u32, sprites: Vec<Rc<Sprite>>) -> Result<Self, String> {
        let expected = columns as usize * rows as usize;
        if sprites.len() != expected {
            return Err(format!(
                "Sprite group validation failed: {}x{} group requires {} sprites, not {}",
                columns,
                rows,
                expected,
                sprites.len()
            ));
        }
        Ok(Self {
            columns,
            rows,
            sprites,
        })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn sprites(&self) -> &[Rc<Sprite>] {
        &self.sprites
    }

    pub fn cell(&self, column: u32, row: u32) -> Option<&Rc<Sprite>> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.sprites.get((row * self.columns + column) as usize)
    }
}

impl Compositable for SpriteGroup {
    /// Cells are drawn in storage order. When mirrored, each row is walked
    /// right-to-left so the first cell of a row lands in the last column, and
    /// every cell is itself mirrored: the group flips as one rigid image.
    fn render(&self, canvas: &mut RgbaImage, target_x: i32, target_y: i32, mirrored: bool) {
        let mut cells = self.sprites.iter();
        for row in 0..self.rows {
            for step in 0..self.columns {
                let column = if mirrored {
                    self.columns - 1 - step
                } else {
                    step
                };
                let Some(sprite) = cells.next() else {
                    return;
                };
                sprite.render(
                    canvas,
                    target_x + (column * SPRITE_SIZE) as i32,
                    target_y + (row * SPRITE_SIZE) as i32,
                    mirrored,
                );
            }
        }
    }

    fn width(&self) -> u32 {
        self.columns * SPRITE_SIZE
    }

    fn height(&self) -> u32 {
        self.rows * SPRITE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Palette;
    use crate::sprite::SCANLINE_COUNT;
    use image::Rgba;

    fn palette() -> Rc<Palette> {
        Rc::new(Palette::from([
            ('1', [255, 0, 0, 255]),
            ('2', [0, 255, 0, 255]),
            ('3', [0, 0, 255, 255]),
            ('4', [255, 255, 0, 255]),
            ('5', [0, 255, 255, 255]),
            ('6', [255, 0, 255, 255]),
        ]))
    }

    /// A sprite with a single keyed pixel in its top-left corner.
    fn corner_sprite(key: u32) -> Rc<Sprite> {
        let mut scanlines = vec![0u32; SCANLINE_COUNT];
        scanlines[0] = key << 28;
        Rc::new(Sprite::new(palette(), &scanlines).expect("valid sprite"))
    }

    fn three_by_two() -> SpriteGroup {
        let sprites = (1..=6).map(corner_sprite).collect();
        SpriteGroup::new(3, 2, sprites).expect("valid group")
    }

    #[test]
    fn new_rejects_mismatched_sprite_count() {
        let sprites = (1..=5).map(corner_sprite).collect();
        let err = SpriteGroup::new(3, 2, sprites).expect_err("5 sprites for 3x2 should fail");
        assert!(err.contains("requires 6 sprites, not 5"));
    }

    #[test]
    fn size_is_grid_times_sprite_size() {
        let group = three_by_two();
        assert_eq!(group.width(), 48);
        assert_eq!(group.height(), 32);
        assert_eq!(group.columns(), 3);
        assert_eq!(group.rows(), 2);
    }

    #[test]
    fn cell_uses_row_major_order() {
        let group = three_by_two();
        let cell = group.cell(0, 1).expect("cell exists");
        assert!(Rc::ptr_eq(cell, &group.sprites()[3]));
        assert!(group.cell(3, 0).is_none());
        assert!(group.cell(0, 2).is_none());
    }

    #[test]
    fn render_matches_rendering_each_cell_at_its_offset() {
        let group = three_by_two();
        let mut grouped = RgbaImage::new(64, 48);
        group.render(&mut grouped, 5, 7, false);

        let mut manual = RgbaImage::new(64, 48);
        for row in 0..2u32 {
            for column in 0..3u32 {
                let sprite = group.cell(column, row).expect("cell exists");
                sprite.render(
                    &mut manual,
                    5 + (column * 16) as i32,
                    7 + (row * 16) as i32,
                    false,
                );
            }
        }
        assert_eq!(grouped, manual);
    }

    #[test]
    fn mirrored_render_reverses_column_order() {
        let group = three_by_two();
        let mut grouped = RgbaImage::new(48, 32);
        group.render(&mut grouped, 0, 0, true);

        let mut manual = RgbaImage::new(48, 32);
        for row in 0..2u32 {
            for column in 0..3u32 {
                let sprite = group.cell(column, row).expect("cell exists");
                let mirrored_column = 2 - column;
                sprite.render(
                    &mut manual,
                    (mirrored_column * 16) as i32,
                    (row * 16) as i32,
                    true,
                );
            }
        }
        assert_eq!(grouped, manual);

        // The first cell's corner pixel ends up at the far right edge.
        assert_eq!(grouped.get_pixel(47, 0), &Rgba([255, 0, 0, 255]));
        // And the first cell of the second row likewise.
        assert_eq!(grouped.get_pixel(47, 16), &Rgba([255, 255, 0, 255]));
    }

    #[test]
    fn mirrored_group_is_reflection_of_upright_group() {
        let group = three_by_two();
        let mut upright = RgbaImage::new(48, 32);
        let mut mirrored = RgbaImage::new(48, 32);
        group.render(&mut upright, 0, 0, false);
        group.render(&mut mirrored, 0, 0, true);
        for y in 0..32 {
            for x in 0..48 {
                assert_eq!(upright.get_pixel(x, y), mirrored.get_pixel(47 - x, y));
            }
        }
    }
}
