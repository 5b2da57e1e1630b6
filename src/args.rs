// Commandline argument parser using clap for the tribometer

use clap::Parser;
use std::path::PathBuf;

/// Command line of the operator tool.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct TribometerArgs {
    /// Serial device of the ramp controller. Chosen from a list if omitted
    #[arg(short = 'p', long = "port")]
    pub port: Option<String>,

    /// Baud rate of the serial link, overrides the config file
    #[arg(short = 'b', long = "baud")]
    pub baud_rate: Option<u32>,

    /// RON file with the experiment configuration
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Mass of the sliding body in kilograms, overrides the config file
    #[arg(short = 'm', long = "mass")]
    pub mass_kg: Option<f64>,

    /// Directory the trial reports are written to
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,

    /// Talk to a simulated ramp instead of a serial device
    #[arg(long)]
    pub simulate: bool,

    /// Re-run the analysis of a saved raw trial and exit
    #[arg(short = 'r', long = "replay")]
    pub replay: Option<PathBuf>,
}
