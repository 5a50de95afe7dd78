/// Command line interface for `dosithyroid` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "dosithyroid",
    about = "Thyroid I-131 dosimetry from serial planar scintigraphy",
)]
pub (super) struct Cli {
    /// Log level: error, warn, info, debug or trace (overridden by RUST_LOG)
    #[clap(long, default_value = "info")]
    pub log_level: String,

    #[clap(subcommand)]
    pub (super) command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub (super) enum Command {

    /// Run the full evaluation described in a configuration file
    Evaluate {
        /// TOML configuration file
        config: PathBuf,
    },

    /// Decay calibrator activity to the time of administration
    Activity {
        /// Activity measured in the calibrator (MBq)
        #[clap(long)]
        value: String,

        /// When the activity was measured: `dd.mm.YYYY HH:MM`
        #[clap(long)]
        measured_at: String,

        /// When the activity was administered: `dd.mm.YYYY HH:MM`
        #[clap(long)]
        administered_at: String,
    },

    /// Render one window of a planar stack, optionally with a ROI outline
    Preview {
        /// TOML header of the planar stack
        stack: PathBuf,

        /// One of ant_pw, pos_pw, ant_lsw, pos_lsw, ant_usw, pos_usw
        #[clap(short, long, default_value = "ant_pw")]
        window: String,

        /// ROI polygon vertex `x,y`; repeat for each vertex
        #[clap(long = "roi", value_parser = parse_vertex)]
        vertices: Vec<Vertex>,

        /// PNG output file
        #[clap(short, long)]
        out: PathBuf,
    },
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::path::PathBuf;
use dosithyroid::{
    Vertex,
    utils::parse_vertex,
};
