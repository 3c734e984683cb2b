//! Fly-to animations.

use std::time::Duration;

use orbis_geom::Location;
use web_time::Instant;

use crate::error::Result;
use crate::navigate::{Navigator, validate_look_at, validate_range};

/// A fly-to from one camera to a new look-at location and range.
#[derive(Debug, Clone)]
pub(super) struct Animation {
    start: Instant,
    duration: Duration,
    from_look_at: Location,
    to_look_at: Location,
    from_range: f64,
    to_range: f64,
    /// Range at the midpoint, raised above both ends for long flights.
    peak_range: f64,
}

impl Animation {
    /// Look-at and range at `now`, and whether the animation has finished.
    fn sample(&self, now: Instant) -> (Location, f64, bool) {
        let elapsed = now.saturating_duration_since(self.start);
        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.to_look_at, self.to_range, true);
        }

        let t = smootherstep(elapsed.as_secs_f64() / self.duration.as_secs_f64());
        let look_at = self.from_look_at.interpolate_great_circle(self.to_look_at, t);
        let range = if t < 0.5 {
            lerp(self.from_range, self.peak_range, t * 2.0)
        } else {
            lerp(self.peak_range, self.to_range, t * 2.0 - 1.0)
        };
        (look_at, range, false)
    }
}

fn smootherstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl Navigator {
    /// Start flying to `look_at` at `range` over `duration`.
    ///
    /// Heading and tilt are kept. Replaces any running animation; a zero
    /// duration jumps on the next [`Navigator::update`].
    pub fn animate_to(&self, look_at: Location, range: f64, duration: Duration) -> Result<()> {
        let to_look_at = validate_look_at(look_at)?;
        let to_range = validate_range(&self.config, range)?;

        let mut inner = self.lock();
        let from = inner.camera;
        let distance = from.look_at.great_circle_distance(to_look_at).to_radians()
            * self.globe.equatorial_radius();
        let peak_range = self.clamp_range(from.range.max(to_range).max(distance * 0.5));

        tracing::debug!(
            from = ?from.look_at,
            to = ?to_look_at,
            range = to_range,
            ?duration,
            "starting fly-to animation"
        );
        inner.animation = Some(Animation {
            start: Instant::now(),
            duration,
            from_look_at: from.look_at,
            to_look_at,
            from_range: from.range,
            to_range,
            peak_range,
        });
        drop(inner);
        self.request_redraw();
        Ok(())
    }

    /// Advance the running animation to `now`.
    ///
    /// Returns whether an animation is still running afterwards.
    pub fn update(&self, now: Instant) -> bool {
        let running = {
            let mut inner = self.lock();
            let Some((look_at, range, finished)) =
                inner.animation.as_ref().map(|animation| animation.sample(now))
            else {
                return false;
            };
            inner.camera.look_at = look_at;
            inner.camera.range = range;
            if finished {
                inner.animation = None;
                tracing::debug!("fly-to animation finished");
            }
            !finished
        };
        self.request_redraw();
        running
    }

    /// Cancel the running animation, leaving the camera where it is.
    pub fn stop_animations(&self) {
        self.lock().animation = None;
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.lock().animation.is_some()
    }
}
