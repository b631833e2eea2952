//! Fixed-cadence timers and blended force values
//!
//! Every steering force is recomputed on its own interval. Between updates the
//! value glides from where it was toward the last computed target.

use glam::Vec3;

use super::math::slerp_vector;

/// Interpolation used while a force blends toward its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Component-wise linear blend
    Lerp,
    /// Rotate the direction, blend the magnitude
    Slerp,
}

/// Fixed-interval timer driven by frame delta time.
///
/// Starts due: the first `tick` always fires.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval: f32,
    elapsed: f32,
}

impl Cadence {
    /// Create a cadence firing every `interval` seconds
    #[must_use]
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            elapsed: interval,
        }
    }

    /// Accumulate `dt`. Returns true (and resets) once the interval has elapsed.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        if self.elapsed < self.interval {
            return false;
        }
        self.elapsed = 0.0;
        true
    }

    /// Update interval in seconds
    #[must_use]
    pub fn interval(&self) -> f32 {
        self.interval
    }
}

/// A steering force with its own update cadence and blend.
#[derive(Debug, Clone)]
pub struct TimedForce {
    current: Vec3,
    cadence: Cadence,
    blend_duration: f32,
    blend_elapsed: f32,
    mode: BlendMode,
    from: Vec3,
    target: Vec3,
}

impl TimedForce {
    /// Create a force recomputed every `update_interval` seconds that blends
    /// over `blend_duration` seconds.
    #[must_use]
    pub fn new(update_interval: f32, blend_duration: f32, mode: BlendMode) -> Self {
        Self {
            current: Vec3::ZERO,
            cadence: Cadence::new(update_interval),
            blend_duration,
            blend_elapsed: blend_duration,
            mode,
            from: Vec3::ZERO,
            target: Vec3::ZERO,
        }
    }

    /// Current force value
    #[inline]
    #[must_use]
    pub fn current(&self) -> Vec3 {
        self.current
    }

    /// True when the blend toward the last target is still running
    #[must_use]
    pub fn is_blending(&self) -> bool {
        self.blend_elapsed < self.blend_duration
    }

    /// Advance time.
    ///
    /// Returns true when a new value should be computed. Otherwise the
    /// in-progress blend is advanced by `dt`.
    pub fn should_update(&mut self, dt: f32) -> bool {
        if self.cadence.tick(dt) {
            return true;
        }
        self.advance_blend(dt);
        false
    }

    /// Start blending from the current value toward `target`.
    pub fn set_target(&mut self, target: Vec3) {
        if self.blend_duration <= 0.0 {
            self.set_immediate(target);
            return;
        }
        self.from = self.current;
        self.target = target;
        self.blend_elapsed = 0.0;
    }

    /// Jump straight to `value`, cancelling any blend.
    pub fn set_immediate(&mut self, value: Vec3) {
        self.current = value;
        self.from = value;
        self.target = value;
        self.blend_elapsed = self.blend_duration;
    }

    fn advance_blend(&mut self, dt: f32) {
        if self.blend_elapsed >= self.blend_duration {
            return;
        }
        self.blend_elapsed += dt;
        let t = (self.blend_elapsed / self.blend_duration).clamp(0.0, 1.0);
        self.current = match self.mode {
            BlendMode::Lerp => self.from.lerp(self.target, t),
            BlendMode::Slerp => slerp_vector(self.from, self.target, t),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.05;

    #[test]
    fn test_cadence_fires_first_then_on_interval() {
        let mut cadence = Cadence::new(0.1);
        assert!(cadence.tick(DT));
        assert!(!cadence.tick(DT));
        assert!(cadence.tick(DT));
        assert!(!cadence.tick(0.02));
    }

    #[test]
    fn test_set_immediate_snaps() {
        let mut force = TimedForce::new(0.1, 0.3, BlendMode::Lerp);
        force.set_immediate(Vec3::X);
        assert_eq!(force.current(), Vec3::X);
        assert!(!force.is_blending());
    }

    #[test]
    fn test_lerp_blend_reaches_target() {
        let mut force = TimedForce::new(1.0, 0.2, BlendMode::Lerp);
        assert!(force.should_update(DT));
        force.set_immediate(Vec3::X);
        force.set_target(Vec3::ZERO);

        assert!(!force.should_update(0.1));
        assert!((force.current() - Vec3::X * 0.5).length() < 1e-5);

        assert!(!force.should_update(0.1));
        assert!(force.current().length() < 1e-5);
        assert!(!force.is_blending());
    }

    #[test]
    fn test_slerp_blend_keeps_unit_length() {
        let mut force = TimedForce::new(1.0, 0.4, BlendMode::Slerp);
        assert!(force.should_update(DT));
        force.set_immediate(Vec3::X);
        force.set_target(Vec3::Z);

        assert!(!force.should_update(0.2));
        let mid = force.current();
        assert!((mid.length() - 1.0).abs() < 1e-4);
        assert!((mid.x - mid.z).abs() < 1e-4);
    }

    #[test]
    fn test_no_blend_on_update_tick() {
        let mut force = TimedForce::new(0.1, 0.3, BlendMode::Lerp);
        assert!(force.should_update(DT));
        force.set_target(Vec3::X);
        // Interval elapses: the caller recomputes, the blend does not advance
        assert!(!force.should_update(0.05));
        let after_blend = force.current();
        assert!(force.should_update(0.05));
        assert_eq!(force.current(), after_blend);
    }
}
