//! Interpolated frames that advance open execution bars between recomputes.
//!
//! A scene is computed at `now`. Until the next recompute, the renderer steps
//! through one frame per horizontal pixel of the interval: frame `k` moves the
//! open end of every animatable bar, and the now-marker, to
//! `now + k * (interval / interval_px)`. A new scene supersedes the sequence.

use serde::Serialize;
use std::time::Duration;

use super::interval::saturating_add;
use super::layout::Scene;
use crate::model::Timestamp;

/// One animation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationFrame {
    /// Pixel offset from the scene's `now`, starting at 1.
    pub index: u32,
    pub now: Timestamp,
    /// `(bar index, new end)` for every animatable bar.
    pub bar_ends: Vec<(usize, Timestamp)>,
}

impl AnimationFrame {
    /// Move the animated elements of `scene` to this frame.
    pub fn apply_to(&self, scene: &mut Scene) {
        for &(index, end) in &self.bar_ends {
            if let Some(bar) = scene.bars.get_mut(index) {
                bar.end = end;
            }
        }
        scene.now_marker.at = self.now;
    }
}

/// The finite frame sequence derived from one scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationClock {
    /// Identifies the scene the frames belong to.
    pub generation: u64,
    /// Wall time between consecutive frames.
    #[serde(with = "humantime_serde")]
    pub frame_period: Duration,
    pub frames: Vec<AnimationFrame>,
}

impl AnimationClock {
    pub fn new(scene: &Scene, generation: u64) -> Self {
        let step = scene.interval.per_pixel(scene.interval_px);
        let frame_period = step.to_std().unwrap_or_default();

        let frames = (1..scene.interval_px)
            .map(|k| {
                let at = saturating_add(scene.now, step * k as i32);
                AnimationFrame {
                    index: k,
                    now: at,
                    bar_ends: scene
                        .animatable_bar_indices
                        .iter()
                        .filter_map(|&i| scene.bars.get(i).map(|bar| (i, at.max(bar.start))))
                        .collect(),
                }
            })
            .collect();

        Self {
            generation,
            frame_period,
            frames,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame to show `elapsed` after the scene was computed, or `None`
    /// before the first step. Past the end the last frame holds.
    pub fn frame_at(&self, elapsed: Duration) -> Option<&AnimationFrame> {
        if self.frame_period.is_zero() {
            return None;
        }
        let step = (elapsed.as_nanos() / self.frame_period.as_nanos()) as usize;
        if step == 0 {
            return None;
        }
        self.frames.get(step - 1).or_else(|| self.frames.last())
    }
}
