//! Mouse, trackpad and keyboard input for the navigator.
//!
//! Bevy reports per-frame deltas; the navigator's gesture handlers take
//! values accumulated since the gesture began, so drags and trackpad
//! gestures are tracked here and replayed as gesture phases.

use std::time::Duration;

use bevy::ecs::message::MessageReader;
use bevy::input::gestures::{PinchGesture, RotationGesture};
use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy_egui::input::{egui_wants_any_keyboard_input, egui_wants_any_pointer_input};
use glam::DVec2;
use orbis::navigate::{GesturePhase, Navigator};
use orbis_geom::Location;

use crate::globe::GlobeView;
use crate::launch_params::LaunchParams;

/// Pixels per line for line-based scroll wheels.
const PIXELS_PER_LINE: f64 = 40.0;
/// Duration of the fly-home animation.
const HOME_DURATION: Duration = Duration::from_secs(3);

/// Plugin for globe input handling.
pub struct GlobeInputPlugin;

impl Plugin for GlobeInputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GestureTracker>().add_systems(
            Update,
            (
                mouse_drag.run_if(not(egui_wants_any_pointer_input)),
                mouse_wheel.run_if(not(egui_wants_any_pointer_input)),
                trackpad_gestures,
                keyboard_shortcuts.run_if(not(egui_wants_any_keyboard_input)),
            ),
        );
    }
}

/// Gestures in progress and their accumulated values.
#[derive(Resource, Default)]
struct GestureTracker {
    pan: Option<DVec2>,
    secondary: Option<DVec2>,
    pinch: Option<f64>,
    rotation: Option<f64>,
}

/// Drive a drag gesture from a mouse button.
///
/// Returns the updated accumulated translation, or `None` once the button
/// is released.
fn track_drag(
    pressed: bool,
    total: Option<DVec2>,
    delta: DVec2,
    handle: impl Fn(GesturePhase, DVec2),
) -> Option<DVec2> {
    match (total, pressed) {
        (None, true) => {
            handle(GesturePhase::Began, DVec2::ZERO);
            Some(DVec2::ZERO)
        }
        (Some(total), true) => {
            if delta == DVec2::ZERO {
                return Some(total);
            }
            let total = total + delta;
            handle(GesturePhase::Changed, total);
            Some(total)
        }
        (Some(total), false) => {
            handle(GesturePhase::Ended, total);
            None
        }
        (None, false) => None,
    }
}

/// Left drag pans; right drag turns and tilts.
#[allow(clippy::needless_pass_by_value)]
fn mouse_drag(
    mouse: Res<ButtonInput<MouseButton>>,
    mut motion: MessageReader<MouseMotion>,
    mut tracker: ResMut<GestureTracker>,
    globe: Option<Res<GlobeView>>,
) {
    let delta: Vec2 = motion.read().map(|m| m.delta).sum();
    let Some(globe) = globe else {
        return;
    };
    let navigator: &Navigator = globe.window.navigator();
    // The viewport tracks the window's logical size, so motion deltas are
    // already in viewport pixels.
    let delta = delta.as_dvec2();

    tracker.pan = track_drag(
        mouse.pressed(MouseButton::Left),
        tracker.pan,
        delta,
        |phase, translation| navigator.handle_pan(phase, translation),
    );
    tracker.secondary = track_drag(
        mouse.pressed(MouseButton::Right),
        tracker.secondary,
        delta,
        |phase, translation| navigator.handle_secondary_drag(phase, translation),
    );
}

/// Scroll to zoom.
#[allow(clippy::needless_pass_by_value)]
fn mouse_wheel(mut wheel: MessageReader<MouseWheel>, globe: Option<Res<GlobeView>>) {
    let delta: f64 = wheel
        .read()
        .map(|event| match event.unit {
            MouseScrollUnit::Line => f64::from(event.y) * PIXELS_PER_LINE,
            MouseScrollUnit::Pixel => f64::from(event.y),
        })
        .sum();
    if delta == 0.0 {
        return;
    }
    if let Some(globe) = globe {
        globe.window.navigator().handle_wheel(delta);
    }
}

/// Trackpad pinch zooms and rotation turns the heading.
///
/// A gesture ends on the first frame without events.
#[allow(clippy::needless_pass_by_value)]
fn trackpad_gestures(
    mut pinch: MessageReader<PinchGesture>,
    mut rotation: MessageReader<RotationGesture>,
    mut tracker: ResMut<GestureTracker>,
    globe: Option<Res<GlobeView>>,
) {
    let pinch_deltas: Vec<f64> = pinch.read().map(|g| f64::from(g.0)).collect();
    let rotation_delta: Option<f64> = rotation
        .read()
        .map(|g| f64::from(g.0).to_degrees())
        .reduce(|a, b| a + b);
    let Some(globe) = globe else {
        return;
    };
    let navigator = globe.window.navigator();

    tracker.pinch = match (tracker.pinch, pinch_deltas.is_empty()) {
        (None, true) => None,
        (Some(scale), true) => {
            navigator.handle_pinch(GesturePhase::Ended, scale);
            None
        }
        (current, false) => {
            if current.is_none() {
                navigator.handle_pinch(GesturePhase::Began, 1.0);
            }
            let scale = pinch_deltas
                .iter()
                .fold(current.unwrap_or(1.0), |scale, delta| scale * (1.0 + delta));
            navigator.handle_pinch(GesturePhase::Changed, scale);
            Some(scale)
        }
    };

    tracker.rotation = match (tracker.rotation, rotation_delta) {
        (None, None) => None,
        (Some(total), None) => {
            navigator.handle_rotation(GesturePhase::Ended, total);
            None
        }
        (current, Some(delta)) => {
            if current.is_none() {
                navigator.handle_rotation(GesturePhase::Began, 0.0);
            }
            let total = current.unwrap_or(0.0) + delta;
            navigator.handle_rotation(GesturePhase::Changed, total);
            Some(total)
        }
    };
}

/// `H` flies back to the launch location; `N` turns north up.
#[allow(clippy::needless_pass_by_value)]
fn keyboard_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    params: Res<LaunchParams>,
    globe: Option<Res<GlobeView>>,
) {
    let Some(globe) = globe else {
        return;
    };
    let navigator = globe.window.navigator();

    if keyboard.just_pressed(KeyCode::KeyH) {
        let home = Location::new(params.lat, params.lon);
        if let Err(e) = navigator.animate_to(home, params.range, HOME_DURATION) {
            tracing::warn!(error = %e, "cannot fly home");
        }
    }
    if keyboard.just_pressed(KeyCode::KeyN) {
        navigator.stop_animations();
        if let Err(e) = navigator.set_heading(0.0).and_then(|()| navigator.set_tilt(0.0)) {
            tracing::warn!(error = %e, "cannot reset orientation");
        }
    }
}
