//! Frame-counter driven animation series and deterministic frame selection.
//!
//! An animation series is a list of compositable frames plus a cycle rate.
//! Frame choice is a pure function of the game's target frame rate and its
//! current frame counter (which runs 1..=rate and wraps), so it uses integer
//! arithmetic only and never consults wall-clock time. The resulting cycle is
//! quantised to the frame rate: it repeats every `rate` engine frames.

use std::fmt;
use std::rc::Rc;

use crate::sprite::Compositable;

/// The frame-rate context an object borrows from its level's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub target_frame_rate: u32,
    pub current_frame: u32,
}

/// A named state's frames, e.g. the "moving" cycle of a character.
#[derive(Clone)]
pub struct AnimationSeries {
    frames: Vec<Rc<dyn Compositable>>,
    cycles_per_second: u32,
}

impl AnimationSeries {
    pub fn new(frames: Vec<Rc<dyn Compositable>>, cycles_per_second: u32) -> Result<Self, String> {
        if frames.is_empty() {
            return Err("Animation validation failed: series has no frames".to_string());
        }
        if cycles_per_second == 0 {
            return Err(
                "Animation validation failed: cycles_per_second must be > 0".to_string(),
            );
        }
        Ok(Self {
            frames,
            cycles_per_second,
        })
    }

    /// A one-frame series; selection always yields this frame.
    pub fn still(frame: Rc<dyn Compositable>) -> Self {
        Self {
            frames: vec![frame],
            cycles_per_second: 1,
        }
    }

    pub fn frames(&self) -> &[Rc<dyn Compositable>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn cycles_per_second(&self) -> u32 {
        self.cycles_per_second
    }

    /// Index of the frame to show. Without timing the first frame is used.
    pub fn frame_index(&self, timing: Option<FrameTiming>) -> usize {
        match timing {
            Some(timing) => select_frame_index(
                timing.target_frame_rate,
                self.cycles_per_second,
                self.frames.len(),
                timing.current_frame,
            ),
            None => 0,
        }
    }

    pub fn frame(&self, timing: Option<FrameTiming>) -> &dyn Compositable {
        self.frames[self.frame_index(timing)].as_ref()
    }
}

impl fmt::Debug for AnimationSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationSeries")
            .field("frames", &self.frames.len())
            .field("cycles_per_second", &self.cycles_per_second)
            .finish()
    }
}

/// Pick the series index for `current_frame`.
///
/// Each virtual frame `0..target_frame_rate` advances a step counter; every
/// `(target_frame_rate / cycles_per_second) / frame_count` steps the index
/// moves on, wrapping at `frame_count`. The index held when the virtual frame
/// equals `current_frame` is returned. A step size of zero pins index 0, as
/// does a `current_frame` outside the virtual range.
pub fn select_frame_index(
    target_frame_rate: u32,
    cycles_per_second: u32,
    frame_count: usize,
    current_frame: u32,
) -> usize {
    if frame_count == 0 || cycles_per_second == 0 {
        return 0;
    }

    let frames_per_step = (target_frame_rate / cycles_per_second) as usize / frame_count;
    let mut step = 0usize;
    let mut index = 0usize;

    for virtual_frame in 0..target_frame_rate {
        step += 1;
        if step == frames_per_step {
            step = 0;
            index += 1;
        }
        if index >= frame_count {
            index = 0;
        }
        if virtual_frame == current_frame {
            return index;
        }
    }

    0
}
