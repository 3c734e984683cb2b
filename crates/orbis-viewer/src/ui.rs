//! Debug UI for camera, frame statistics and layers.

use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};

use crate::globe::GlobeView;

/// Plugin for the debug UI overlay.
pub struct DebugUiPlugin;

impl Plugin for DebugUiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin::default())
            .add_plugins(FrameTimeDiagnosticsPlugin::default())
            .add_systems(EguiPrimaryContextPass, debug_ui_system);
    }
}

/// Format a distance in meters for display.
fn format_distance(meters: f64) -> String {
    if meters >= 1_000_000.0 {
        let mm = meters / 1_000_000.0;
        format!("{mm:.1} Mm")
    } else if meters >= 1_000.0 {
        let km = meters / 1_000.0;
        format!("{km:.1} km")
    } else {
        format!("{meters:.0} m")
    }
}

/// Render the debug UI overlay.
#[allow(clippy::needless_pass_by_value)]
fn debug_ui_system(
    mut contexts: EguiContexts,
    diagnostics: Res<DiagnosticsStore>,
    globe: Option<Res<GlobeView>>,
) -> Result {
    let ctx = contexts.ctx_mut()?;
    let Some(globe) = globe else {
        return Ok(());
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(bevy::diagnostic::Diagnostic::smoothed)
        .unwrap_or(0.0);

    let navigator = globe.window.navigator();
    let camera = navigator.camera();
    let stats = globe.window.statistics();
    let mut redraw = false;

    egui::Window::new("Globe")
        .default_pos([10.0, 10.0])
        .show(ctx, |ui| {
            ui.label(format!("FPS: {fps:.0}"));
            ui.label(format!(
                "Look at: {:.4}°, {:.4}°",
                camera.look_at.latitude, camera.look_at.longitude
            ));
            ui.label(format!("Range: {}", format_distance(camera.range)));
            ui.label(format!(
                "Heading: {:.1}°  Tilt: {:.1}°",
                camera.heading, camera.tilt
            ));
            if navigator.is_animating() {
                ui.label("Animating");
            }

            ui.separator();
            ui.label(format!(
                "Terrain tiles: {}  Image tiles: {}",
                stats.terrain_tiles, stats.image_tiles
            ));
            ui.label(format!(
                "Draws: {}  Triangles: {}",
                stats.draw_calls, stats.triangles
            ));
            ui.label(format!("Frame: {:.1} ms", stats.frame_time.as_secs_f64() * 1000.0));

            ui.separator();
            ui.label("Layers:");
            for layer in globe.window.layers() {
                let properties = layer.properties();
                ui.horizontal(|ui| {
                    let mut enabled = properties.is_enabled();
                    if ui.checkbox(&mut enabled, properties.name()).changed() {
                        properties.set_enabled(enabled);
                        redraw = true;
                    }
                    let mut opacity = properties.opacity();
                    if ui
                        .add(egui::Slider::new(&mut opacity, 0.0..=1.0).text("Opacity"))
                        .changed()
                    {
                        properties.set_opacity(opacity);
                        redraw = true;
                    }
                });
            }

            ui.separator();
            ui.label("Controls:");
            ui.label("  Left drag - Pan");
            ui.label("  Right drag - Turn and tilt");
            ui.label("  Scroll / pinch - Zoom");
            ui.label("  H - Fly home, N - North up");
        });

    if redraw {
        globe.window.view().request_redraw();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(12.4), "12 m");
        assert_eq!(format_distance(2_500.0), "2.5 km");
        assert_eq!(format_distance(1.0e7), "10.0 Mm");
    }
}
