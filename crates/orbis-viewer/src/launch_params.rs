//! Launch parameter parsing for the viewer.
//!
//! On native, parameters are parsed from command-line arguments using clap.
//! On WASM, defaults are used.

use std::path::PathBuf;

use bevy::prelude::*;

/// Default look-at latitude.
const DEFAULT_LAT: f64 = 40.7;
/// Default look-at longitude.
const DEFAULT_LON: f64 = -74.0;
/// Default distance from the look-at location in meters.
const DEFAULT_RANGE: f64 = 1.0e7;
/// Default window size.
const DEFAULT_WIDTH: u32 = 960;
const DEFAULT_HEIGHT: u32 = 540;

/// Launch parameters for the viewer.
#[derive(Resource, Debug, Clone)]
pub struct LaunchParams {
    pub lat: f64,
    pub lon: f64,
    /// Distance from the look-at location in meters.
    pub range: f64,
    pub heading: f64,
    pub tilt: f64,
    /// Equirectangular image covering the whole globe.
    pub imagery: Option<PathBuf>,
    pub exaggeration: f64,
    /// Initial window size.
    pub width: u32,
    pub height: u32,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            lat: DEFAULT_LAT,
            lon: DEFAULT_LON,
            range: DEFAULT_RANGE,
            heading: 0.0,
            tilt: 0.0,
            imagery: None,
            exaggeration: 1.0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    #[command(about = "Interactive 3D globe viewer")]
    struct CliArgs {
        /// Look-at latitude in degrees.
        #[arg(long, default_value_t = DEFAULT_LAT, allow_negative_numbers = true)]
        lat: f64,

        /// Look-at longitude in degrees.
        #[arg(long, default_value_t = DEFAULT_LON, allow_negative_numbers = true)]
        lon: f64,

        /// Distance from the look-at location in meters.
        #[arg(long, default_value_t = DEFAULT_RANGE)]
        range: f64,

        /// Heading in degrees clockwise from north.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        heading: f64,

        /// Tilt in degrees away from looking straight down.
        #[arg(long, default_value_t = 0.0)]
        tilt: f64,

        /// Equirectangular PNG or JPEG image to drape over the globe.
        #[arg(long)]
        imagery: Option<PathBuf>,

        /// Vertical exaggeration applied to terrain.
        #[arg(long, default_value_t = 1.0)]
        exaggeration: f64,

        /// Window width in pixels.
        #[arg(long, default_value_t = DEFAULT_WIDTH)]
        width: u32,

        /// Window height in pixels.
        #[arg(long, default_value_t = DEFAULT_HEIGHT)]
        height: u32,
    }

    pub fn parse() -> LaunchParams {
        let args = CliArgs::parse();
        LaunchParams {
            lat: args.lat,
            lon: args.lon,
            range: args.range,
            heading: args.heading,
            tilt: args.tilt,
            imagery: args.imagery,
            exaggeration: args.exaggeration,
            width: args.width.max(1),
            height: args.height.max(1),
        }
    }
}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}
