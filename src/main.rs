use std::path::PathBuf;

use clap::Parser;
use post_roulette::app::{Mode, Options};

#[derive(Parser, Debug)]
#[command(
    name = "post-roulette",
    version,
    about = "Browse an exported collection of social media posts one card at a time"
)]
struct Cli {
    /// Source to browse, as named in the config (case-insensitive)
    source: String,

    /// Print the post under the stored cursor and exit
    #[arg(long, conflicts_with = "saved")]
    debug: bool,

    /// Print the saved posts of the source and exit
    #[arg(long)]
    saved: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.debug {
            Mode::Debug
        } else if self.saved {
            Mode::Saved
        } else {
            Mode::Browse
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let options = Options {
        mode: cli.mode(),
        source: cli.source,
        config_file: cli.config,
    };

    if let Err(err) = post_roulette::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
