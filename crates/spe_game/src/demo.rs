//! Built-in demo level, used when no scene file is given.
//!
//! All art is drawn procedurally into hex-key rows and decoded through the
//! same sprite path as sheet files.

use image::Rgba;
use spe_core::{AnimationSeries, Compositable, GameObject, Level, Palette, Sprite, SpriteGroup};
use std::collections::HashMap;
use std::rc::Rc;

use crate::behaviour::{self, Behaviour, DEFAULT_MAX_SCROLL_X};

const SKY: Rgba<u8> = Rgba([126, 192, 238, 255]);
const TILE: f64 = 16.0;
const FLOOR_TILES: u32 = 80;
const CLOUD_COUNT: u32 = 8;

pub const PLAYER_NAME: &str = "player";
pub const PLAYER_START: (f64, f64) = (20.0, 16.0);

/// Leg stride per frame of the 8-frame walk cycle.
const WALK_STRIDES: [i32; 8] = [-3, -2, 0, 2, 3, 2, 0, -2];

pub fn demo_level() -> Result<Level, String> {
    let art = DemoArt::new()?;
    let mut level = Level::new(SKY, 1.0).with_before_paint(behaviour::camera_follow(DEFAULT_MAX_SCROLL_X));

    for i in 0..CLOUD_COUNT {
        // One cloud per 150px with a fixed jitter.
        let x = (i * 150 + 10 + (i * 37) % 90) as f64;
        let y = (150 + (i * 23) % 50) as f64;
        level.add_object(GameObject::still(format!("cloud_{i}"), art.cloud.clone()).with_position(x, y));
    }

    for i in 0..FLOOR_TILES {
        if (25..=28).contains(&i) {
            continue;
        }
        let y = if (49..=54).contains(&i) { 40.0 } else { 0.0 };
        level.add_object(floor_tile(&art, format!("floor_{i}"), i as f64 * TILE, y));
    }
    for i in 58..62 {
        level.add_object(floor_tile(&art, format!("platform_{i}"), i as f64 * TILE, 85.0));
    }

    level.add_object(Behaviour::Powerup.apply(
        GameObject::still("powerup", art.powerup.clone()).with_position(950.0, 170.0),
    ));

    let player = GameObject::new(PLAYER_NAME, "standing", art.character_states()?)?
        .with_position(PLAYER_START.0, PLAYER_START.1)
        .with_mass(0.4)
        .with_velocity(2.0, 0.0);
    level.add_object(Behaviour::Player.apply(player));

    log::info!("Built demo level with {} objects", level.len());
    Ok(level)
}

fn floor_tile(art: &DemoArt, name: String, x: f64, y: f64) -> GameObject {
    GameObject::still(name, art.floor.clone())
        .floor()
        .interactive(true)
        .with_position(x, y)
}

struct DemoArt {
    cloud: Rc<dyn Compositable>,
    floor: Rc<dyn Compositable>,
    powerup: Rc<dyn Compositable>,
    character: Rc<Palette>,
}

impl DemoArt {
    fn new() -> Result<Self, String> {
        let cloud_palette = Rc::new(Palette::from([('1', [255, 255, 255, 255])]));
        let floor_palette = Rc::new(Palette::from([
            ('0', [51, 101, 71, 255]),
            ('1', [120, 82, 48, 255]),
            ('2', [162, 199, 88, 255]),
            ('3', [84, 56, 34, 255]),
        ]));
        let powerup_palette = Rc::new(Palette::from([
            ('1', [255, 203, 91, 255]),
            ('2', [214, 120, 30, 255]),
            ('3', [255, 255, 255, 255]),
        ]));
        let character = Rc::new(Palette::from([
            ('1', [0, 0, 0, 255]),
            ('2', [227, 156, 118, 255]),
            ('3', [196, 48, 48, 255]),
            ('4', [46, 70, 160, 255]),
            ('5', [97, 56, 53, 255]),
        ]));

        Ok(Self {
            cloud: draw(&cloud_palette, 3, 2, cloud_pixel)?,
            floor: draw(&floor_palette, 1, 1, floor_pixel)?,
            powerup: draw(&powerup_palette, 1, 1, powerup_pixel)?,
            character,
        })
    }

    fn character_states(&self) -> Result<HashMap<String, AnimationSeries>, String> {
        let pose = |stride: i32, leg_length: u32| {
            draw(&self.character, 2, 3, move |x, y| character_pixel(x, y, stride, leg_length))
        };

        let walk = WALK_STRIDES
            .iter()
            .map(|&stride| pose(stride, 12))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(HashMap::from([
            ("standing".to_string(), AnimationSeries::new(vec![pose(0, 12)?], 1)?),
            ("moving".to_string(), AnimationSeries::new(walk, 2)?),
            ("jumping".to_string(), AnimationSeries::new(vec![pose(2, 8)?], 1)?),
            ("landing".to_string(), AnimationSeries::new(vec![pose(4, 10)?], 1)?),
        ]))
    }
}

/// Paint a `columns` x `rows` group by asking `pixel` for the key at every
/// image coordinate (Y down).
fn draw(
    palette: &Rc<Palette>,
    columns: u32,
    rows: u32,
    pixel: impl Fn(u32, u32) -> char,
) -> Result<Rc<dyn Compositable>, String> {
    let mut sprites = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let lines: Vec<String> = (0..16)
                .map(|y| (0..16).map(|x| pixel(column * 16 + x, row * 16 + y)).collect())
                .collect();
            let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
            sprites.push(Rc::new(Sprite::from_rows(palette.clone(), &lines)?));
        }
    }
    Ok(Rc::new(SpriteGroup::new(columns, rows, sprites)?))
}

fn within_ellipse(x: u32, y: u32, cx: f64, cy: f64, rx: f64, ry: f64) -> bool {
    let dx = (x as f64 + 0.5 - cx) / rx;
    let dy = (y as f64 + 0.5 - cy) / ry;
    dx * dx + dy * dy <= 1.0
}

fn cloud_pixel(x: u32, y: u32) -> char {
    let puffs = [
        (12.0, 20.0, 10.0, 8.0),
        (24.0, 14.0, 12.0, 11.0),
        (36.0, 20.0, 10.0, 8.0),
        (24.0, 24.0, 20.0, 6.0),
    ];
    if puffs
        .iter()
        .any(|&(cx, cy, rx, ry)| within_ellipse(x, y, cx, cy, rx, ry))
    {
        '1'
    } else {
        '0'
    }
}

fn floor_pixel(x: u32, y: u32) -> char {
    match y {
        0 if x % 5 == 2 => '0',
        0..=2 => '2',
        3 => '0',
        _ if (x * 7 + y * 3) % 11 == 0 => '3',
        _ => '1',
    }
}

fn powerup_pixel(x: u32, y: u32) -> char {
    if within_ellipse(x, y, 6.0, 6.0, 1.5, 1.5) {
        '3'
    } else if within_ellipse(x, y, 8.0, 8.0, 5.5, 5.5) {
        '1'
    } else if within_ellipse(x, y, 8.0, 8.0, 7.0, 7.0) {
        '2'
    } else {
        '0'
    }
}

/// 32x48 figure: head, shirt, two legs offset by `stride`.
fn character_pixel(x: u32, y: u32, stride: i32, leg_length: u32) -> char {
    if within_ellipse(x, y, 16.0, 10.0, 7.0, 7.0) {
        return if within_ellipse(x, y, 16.0, 10.0, 6.0, 6.0) {
            '2'
        } else {
            '1'
        };
    }
    if (10..22).contains(&x) && (17..33).contains(&y) {
        return '3';
    }

    let leg_top = 33;
    let shoe_top = leg_top + leg_length;
    if y < leg_top || y >= shoe_top + 3 {
        return '0';
    }
    let x = x as i32;
    let on_leg = |left: i32| (left..left + 4).contains(&x);
    if on_leg(11 - stride) || on_leg(17 + stride) {
        if y < shoe_top {
            '4'
        } else {
            '5'
        }
    } else {
        '0'
    }
}
