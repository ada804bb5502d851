//! Time based interpolation of a single animated property.
//!
//! A [`Tween`] is either idle at a value or animating from one value to a
//! target. Requesting a new target while animating replaces the running
//! animation: it restarts from the value reached so far, so repeated requests
//! converge on the latest target instead of queueing up.

use instant::Duration;

/// Maps linear progress `t` in `0..=1` to eased progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Easing {
    Linear,
    /// Quadratic deceleration.
    Power1Out,
    /// Cubic deceleration.
    Power2Out,
    /// Quartic deceleration, fast start and a long soft landing.
    Power3Out,
    Power3InOut,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Power1Out => 1.0 - (1.0 - t).powi(2),
            Easing::Power2Out => 1.0 - (1.0 - t).powi(3),
            Easing::Power3Out => 1.0 - (1.0 - t).powi(4),
            Easing::Power3InOut => {
                if t < 0.5 {
                    8.0 * t.powi(4)
                } else {
                    1.0 - 8.0 * (1.0 - t).powi(4)
                }
            }
        }
    }
}

/// Values a [`Tween`] can blend between.
pub trait Interpolate: Copy {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for cgmath::Vector2<f32> {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TweenState<T> {
    Idle(T),
    Animating {
        from: T,
        to: T,
        elapsed: Duration,
        duration: Duration,
        easing: Easing,
    },
}

#[derive(Clone, Debug)]
pub struct Tween<T: Interpolate> {
    state: TweenState<T>,
}

impl<T: Interpolate> Tween<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: TweenState::Idle(value),
        }
    }

    pub fn state(&self) -> &TweenState<T> {
        &self.state
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, TweenState::Animating { .. })
    }

    /// The value at the current point of the animation.
    pub fn value(&self) -> T {
        match self.state {
            TweenState::Idle(value) => value,
            TweenState::Animating {
                from,
                to,
                elapsed,
                duration,
                easing,
            } => from.lerp(to, easing.apply(progress(elapsed, duration))),
        }
    }

    /// Starts animating towards `target`, superseding any running animation.
    pub fn to(&mut self, target: T, duration: Duration, easing: Easing) {
        let from = self.value();
        self.state = if duration.is_zero() {
            TweenState::Idle(target)
        } else {
            TweenState::Animating {
                from,
                to: target,
                elapsed: Duration::ZERO,
                duration,
                easing,
            }
        };
    }

    /// Moves the animation forward by `dt` and returns the new value.
    pub fn advance(&mut self, dt: Duration) -> T {
        let finished = match &mut self.state {
            TweenState::Animating {
                to,
                elapsed,
                duration,
                ..
            } => {
                *elapsed += dt;
                (*elapsed >= *duration).then_some(*to)
            }
            TweenState::Idle(_) => None,
        };
        if let Some(target) = finished {
            self.state = TweenState::Idle(target);
        }
        self.value()
    }
}

fn progress(elapsed: Duration, duration: Duration) -> f32 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 5] = [
        Easing::Linear,
        Easing::Power1Out,
        Easing::Power2Out,
        Easing::Power3Out,
        Easing::Power3InOut,
    ];

    #[test]
    fn easings_start_at_zero_and_end_at_one() {
        for easing in ALL {
            assert_eq!(easing.apply(0.0), 0.0, "{:?}", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{:?}", easing);
        }
    }

    #[test]
    fn easings_are_monotonic() {
        for easing in ALL {
            let mut last = 0.0;
            for step in 1..=100 {
                let value = easing.apply(step as f32 / 100.0);
                assert!(value >= last, "{:?} decreased at step {}", easing, step);
                last = value;
            }
        }
    }

    #[test]
    fn power3_out_decelerates() {
        let early = Easing::Power3Out.apply(0.1) - Easing::Power3Out.apply(0.0);
        let late = Easing::Power3Out.apply(1.0) - Easing::Power3Out.apply(0.9);
        assert!(early > late * 100.0);
        assert!((Easing::Power3Out.apply(0.5) - 0.9375).abs() < 1e-6);
    }

    #[test]
    fn finished_tween_is_idle_at_target() {
        let mut tween = Tween::new(0.0_f32);
        tween.to(2.0, Duration::from_millis(100), Easing::Power3Out);
        assert!(tween.is_animating());
        let halfway = tween.advance(Duration::from_millis(50));
        assert!(halfway > 1.0 && halfway < 2.0);
        let end = tween.advance(Duration::from_millis(80));
        assert_eq!(end, 2.0);
        assert_eq!(*tween.state(), TweenState::Idle(2.0));
    }

    #[test]
    fn retarget_starts_from_the_current_value() {
        let mut tween = Tween::new(0.0_f32);
        tween.to(1.0, Duration::from_secs(1), Easing::Linear);
        tween.advance(Duration::from_millis(250));
        tween.to(-1.0, Duration::from_secs(1), Easing::Linear);
        match *tween.state() {
            TweenState::Animating { from, to, elapsed, .. } => {
                assert!((from - 0.25).abs() < 1e-6);
                assert_eq!(to, -1.0);
                assert_eq!(elapsed, Duration::ZERO);
            }
            TweenState::Idle(_) => panic!("tween should be animating"),
        }
    }

    #[test]
    fn zero_duration_jumps_to_target() {
        let mut tween = Tween::new(cgmath::Vector2::new(0.0_f32, 0.0));
        tween.to(cgmath::Vector2::new(1.0, 2.0), Duration::ZERO, Easing::Linear);
        assert!(!tween.is_animating());
        assert_eq!(tween.value(), cgmath::Vector2::new(1.0, 2.0));
    }
}
