use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use scatterdof_render::{BlurResolution, BlurType};

#[derive(Parser)]
#[command(
    name = "sdof",
    about = "Inspect the scatter depth-of-field pass graph",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Dry-run the effect and print every substrate operation
    Plan {
        #[command(flatten)]
        input: InputArgs,
        /// Number of frames to render
        #[arg(short = 'n', long, default_value_t = 1)]
        frames: u32,
        /// Make the capability check fail
        #[arg(long)]
        unsupported: bool,
    },
    /// Print the blur pass table and every pass identifier
    Table,
    /// Print the parameters derived from the settings and camera
    Params {
        #[command(flatten)]
        input: InputArgs,
    },
}

/// Settings file plus command-line overrides.
#[derive(Args, Clone, Debug, Default)]
pub struct InputArgs {
    /// TOML file with [settings], [camera] and [frame] tables
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Blur style
    #[arg(long, value_enum)]
    pub blur_type: Option<BlurStyleArg>,
    /// Working resolution of the blur
    #[arg(long, value_enum)]
    pub resolution: Option<ResolutionArg>,
    /// Enable foreground isolation
    #[arg(long)]
    pub foreground: bool,
    /// Show the focal curve instead of the blur
    #[arg(long)]
    pub visualize: bool,
    /// Focal distance in world units
    #[arg(long)]
    pub focal_point: Option<f32>,
    /// Aperture size
    #[arg(long)]
    pub aperture: Option<f32>,
    /// Source width in pixels
    #[arg(long)]
    pub width: Option<u32>,
    /// Source height in pixels
    #[arg(long)]
    pub height: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BlurStyleArg {
    Poisson,
    Production,
    Movie,
}

impl From<BlurStyleArg> for BlurType {
    fn from(arg: BlurStyleArg) -> Self {
        match arg {
            BlurStyleArg::Poisson => BlurType::Poisson,
            BlurStyleArg::Production => BlurType::Production,
            BlurStyleArg::Movie => BlurType::Movie,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ResolutionArg {
    High,
    Low,
}

impl From<ResolutionArg> for BlurResolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::High => BlurResolution::High,
            ResolutionArg::Low => BlurResolution::Low,
        }
    }
}
