//! Background loading of imagery files.
//!
//! Decoding runs on Bevy's async compute pool and the result comes back
//! over an `async_channel`, so a large image never stalls a frame.

use std::path::PathBuf;
use std::sync::Arc;

use bevy::prelude::*;
use bevy::tasks::AsyncComputeTaskPool;
use image::RgbaImage;
use orbis::layer::ImageTileSource;

use crate::globe::GlobeView;

/// Plugin for loading imagery files.
pub struct ImageryLoaderPlugin;

impl Plugin for ImageryLoaderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ImageryChannels>()
            .add_systems(Update, poll_imagery);
    }
}

/// A decoded image and the source waiting for it.
struct LoadedImagery {
    path: PathBuf,
    source: Arc<ImageTileSource>,
    result: Result<RgbaImage, image::ImageError>,
}

/// Channels for receiving decoded images from background tasks.
#[derive(Resource)]
pub struct ImageryChannels {
    rx: async_channel::Receiver<LoadedImagery>,
    tx: async_channel::Sender<LoadedImagery>,
}

impl Default for ImageryChannels {
    fn default() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self { rx, tx }
    }
}

/// Decode `path` in the background and hand the image to `source`.
pub fn spawn_imagery_load(path: PathBuf, source: Arc<ImageTileSource>, channels: &ImageryChannels) {
    let tx = channels.tx.clone();
    tracing::info!(path = %path.display(), "loading imagery");

    AsyncComputeTaskPool::get()
        .spawn(async move {
            let result = image::open(&path).map(|image| image.to_rgba8());
            let _ = tx
                .send(LoadedImagery {
                    path,
                    source,
                    result,
                })
                .await;
        })
        .detach();
}

/// Install decoded images into their tile sources.
#[allow(clippy::needless_pass_by_value)]
fn poll_imagery(channels: Res<ImageryChannels>, globe: Option<Res<GlobeView>>) {
    while let Ok(loaded) = channels.rx.try_recv() {
        match loaded.result {
            Ok(image) => {
                tracing::info!(
                    path = %loaded.path.display(),
                    width = image.width(),
                    height = image.height(),
                    "loaded imagery"
                );
                loaded.source.set_image(image);
                if let Some(globe) = &globe {
                    globe.window.view().request_redraw();
                }
            }
            Err(e) => {
                tracing::error!(path = %loaded.path.display(), error = %e, "failed to load imagery");
            }
        }
    }
}
