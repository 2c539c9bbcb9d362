// src/tracking/kalman.rs
//
// Constant-velocity Kalman filter over an entity's centre point, plus the
// arena that owns one filter per live entity.
//
// State: [x, y, vx, vy] in pixels and pixels/frame.
// Measurement: [x, y] (region centre).
// Transition: x_{k+1} = F * x_k + w,  F = [[I₂, I₂], [0₂, I₂]]
//
// Filters are stored outside the entities in a slot vector with a free list
// and an id → slot index. Evicting an entity frees its slot in the same call,
// so a slot can never be read through a stale id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::types::Point;

// ============================================================================
// 4×4 MATRIX MATH (inline, no external dependency)
// ============================================================================
//
// Only multiply, add, transpose and a 2×2 inversion for the innovation
// covariance are needed. Everything is stack-allocated.

/// 4×4 matrix stored row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Mat4([f32; 16]);

impl Mat4 {
    const ZERO: Self = Self([0.0; 16]);

    fn identity() -> Self {
        Self::diagonal(1.0)
    }

    fn diagonal(v: f32) -> Self {
        let mut m = Self::ZERO;
        for i in 0..4 {
            m.0[i * 4 + i] = v;
        }
        m
    }

    #[inline]
    fn get(&self, r: usize, c: usize) -> f32 {
        self.0[r * 4 + c]
    }

    #[inline]
    fn set(&mut self, r: usize, c: usize, v: f32) {
        self.0[r * 4 + c] = v;
    }

    fn mul(&self, rhs: &Mat4) -> Mat4 {
        let mut out = Mat4::ZERO;
        for i in 0..4 {
            for j in 0..4 {
                let mut sum = 0.0f32;
                for k in 0..4 {
                    sum += self.get(i, k) * rhs.get(k, j);
                }
                out.set(i, j, sum);
            }
        }
        out
    }

    fn add(&self, rhs: &Mat4) -> Mat4 {
        let mut out = Mat4::ZERO;
        for i in 0..16 {
            out.0[i] = self.0[i] + rhs.0[i];
        }
        out
    }

    fn transpose(&self) -> Mat4 {
        let mut out = Mat4::ZERO;
        for i in 0..4 {
            for j in 0..4 {
                out.set(i, j, self.get(j, i));
            }
        }
        out
    }

    fn mul_vec(&self, v: &[f32; 4]) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (0..4).map(|j| self.get(i, j) * v[j]).sum();
        }
        out
    }
}

/// 2×2 matrix for the innovation covariance S.
#[derive(Debug, Clone, Copy)]
struct Mat2([f32; 4]);

impl Mat2 {
    /// Returns None if singular.
    fn invert(&self) -> Option<Self> {
        let [a, b, c, d] = self.0;
        let det = a * d - b * c;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Mat2([d * inv_det, -b * inv_det, -c * inv_det, a * inv_det]))
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Diagonal process noise per frame
    pub process_noise: f32,
    /// Diagonal measurement noise (px²)
    pub measurement_noise: f32,
    /// Initial covariance diagonal
    pub initial_covariance: f32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.03,
            measurement_noise: 1.0,
            initial_covariance: 1.0,
        }
    }
}

// ============================================================================
// FILTER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ConstantVelocityFilter {
    /// State vector [x, y, vx, vy]
    x: [f32; 4],
    /// State covariance
    p: Mat4,
    q: Mat4,
    f: Mat4,
    r: f32,
}

impl ConstantVelocityFilter {
    /// Filter seeded at `center` with zero velocity.
    pub fn new(center: Point, config: &KalmanConfig) -> Self {
        let mut f = Mat4::identity();
        f.set(0, 2, 1.0);
        f.set(1, 3, 1.0);
        Self {
            x: [center.x, center.y, 0.0, 0.0],
            p: Mat4::diagonal(config.initial_covariance),
            q: Mat4::diagonal(config.process_noise),
            f,
            r: config.measurement_noise,
        }
    }

    /// Advance one frame and return the predicted centre.
    pub fn predict(&mut self) -> Point {
        self.x = self.f.mul_vec(&self.x);
        // P = F * P * F' + Q
        self.p = self.f.mul(&self.p).mul(&self.f.transpose()).add(&self.q);
        self.position()
    }

    /// Fold in a measured centre.
    pub fn correct(&mut self, measured: Point) {
        // H = [I₂ | 0₂], so H*P*H' is the top-left 2×2 block of P.
        let s = Mat2([
            self.p.get(0, 0) + self.r,
            self.p.get(0, 1),
            self.p.get(1, 0),
            self.p.get(1, 1) + self.r,
        ]);
        let Some(s_inv) = s.invert() else {
            warn!("Kalman: singular innovation covariance, skipping correction");
            return;
        };

        // K = P * H' * S⁻¹ (4×2); P * H' is the first two columns of P.
        let mut k = [[0.0f32; 2]; 4];
        for (i, row) in k.iter_mut().enumerate() {
            let (p0, p1) = (self.p.get(i, 0), self.p.get(i, 1));
            row[0] = p0 * s_inv.0[0] + p1 * s_inv.0[2];
            row[1] = p0 * s_inv.0[1] + p1 * s_inv.0[3];
        }

        let innovation = [measured.x - self.x[0], measured.y - self.x[1]];
        for (i, row) in k.iter().enumerate() {
            self.x[i] += row[0] * innovation[0] + row[1] * innovation[1];
        }

        // P = (I - K*H) * P
        let mut i_kh = Mat4::identity();
        for (i, row) in k.iter().enumerate() {
            i_kh.set(i, 0, i_kh.get(i, 0) - row[0]);
            i_kh.set(i, 1, i_kh.get(i, 1) - row[1]);
        }
        self.p = i_kh.mul(&self.p);
    }

    pub fn position(&self) -> Point {
        Point::new(self.x[0], self.x[1])
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.x[2], self.x[3])
    }
}

// ============================================================================
// ARENA
// ============================================================================

#[derive(Debug)]
struct Slot {
    id: u32,
    filter: ConstantVelocityFilter,
}

/// Id-indexed filter storage: slot vector, free list and id → slot map.
#[derive(Debug, Default)]
pub struct FilterArena {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: HashMap<u32, usize>,
}

impl FilterArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a filter for `id`, reusing a freed slot when one exists.
    /// Replaces any filter already stored for the id.
    pub fn insert(&mut self, id: u32, filter: ConstantVelocityFilter) {
        if let Some(&slot) = self.index.get(&id) {
            self.slots[slot] = Some(Slot { id, filter });
            return;
        }
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(Slot { id, filter });
                slot
            }
            None => {
                self.slots.push(Some(Slot { id, filter }));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
    }

    pub fn remove(&mut self, id: u32) -> Option<ConstantVelocityFilter> {
        let slot = self.index.remove(&id)?;
        let removed = self.slots[slot].take();
        self.free.push(slot);
        removed.map(|s| s.filter)
    }

    pub fn get(&self, id: u32) -> Option<&ConstantVelocityFilter> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_ref().map(|s| &s.filter)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut ConstantVelocityFilter> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_mut().map(|s| &mut s.filter)
    }

    /// Predict every live filter once. Returns (id, predicted centre) pairs.
    pub fn predict_all(&mut self) -> HashMap<u32, Point> {
        self.slots
            .iter_mut()
            .flatten()
            .map(|slot| (slot.id, slot.filter.predict()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total slots allocated, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.index.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stationary_measurements_keep_position() {
        let cfg = KalmanConfig::default();
        let mut kf = ConstantVelocityFilter::new(Point::new(100.0, 50.0), &cfg);
        for _ in 0..20 {
            kf.predict();
            kf.correct(Point::new(100.0, 50.0));
        }
        let p = kf.position();
        assert!((p.x - 100.0).abs() < 1e-3 && (p.y - 50.0).abs() < 1e-3);
        let (vx, vy) = kf.velocity();
        assert!(vx.abs() < 1e-3 && vy.abs() < 1e-3);
    }

    #[test]
    fn test_constant_motion_learns_velocity() {
        let cfg = KalmanConfig::default();
        let mut kf = ConstantVelocityFilter::new(Point::new(0.0, 0.0), &cfg);
        for step in 1..=40 {
            kf.predict();
            kf.correct(Point::new(2.0 * step as f32, 0.0));
        }
        let (vx, _) = kf.velocity();
        assert!((vx - 2.0).abs() < 0.2, "velocity should converge to 2, got {}", vx);
        let predicted = kf.predict();
        assert!((predicted.x - 82.0).abs() < 1.5, "prediction {}", predicted.x);
    }

    #[test]
    fn test_arena_reuses_freed_slots() {
        let cfg = KalmanConfig::default();
        let mut arena = FilterArena::new();
        arena.insert(1, ConstantVelocityFilter::new(Point::new(0.0, 0.0), &cfg));
        arena.insert(2, ConstantVelocityFilter::new(Point::new(10.0, 0.0), &cfg));
        assert_eq!(arena.len(), 2);

        assert!(arena.remove(1).is_some());
        assert!(arena.get(1).is_none(), "removed id must not resolve");
        assert!(arena.remove(1).is_none());

        arena.insert(3, ConstantVelocityFilter::new(Point::new(20.0, 0.0), &cfg));
        assert_eq!(arena.capacity(), 2, "slot of id 1 should be reused");
        assert_eq!(arena.get(3).map(|f| f.position().x), Some(20.0));
        assert_eq!(arena.get(2).map(|f| f.position().x), Some(10.0));
    }

    #[test]
    fn test_predict_all_touches_every_live_filter() {
        let cfg = KalmanConfig::default();
        let mut arena = FilterArena::new();
        for id in 1..=3 {
            arena.insert(id, ConstantVelocityFilter::new(Point::new(id as f32, 0.0), &cfg));
        }
        arena.remove(2);
        let predictions = arena.predict_all();
        assert_eq!(predictions.len(), 2);
        assert!(predictions.contains_key(&1) && predictions.contains_key(&3));
    }
}
