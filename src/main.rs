//! # spot-diff CLI
//!
//! Command-line interface for the photo difference detector.
//!
//! ## Usage
//! ```bash
//! spot-diff compare before.jpg after.jpg --sensitivity 60
//! spot-diff compare before.jpg after.jpg --selection 100,80,400,300 --output json
//! ```

mod cli;

use spot_diff::Result;

fn main() -> Result<()> {
    spot_diff::init_tracing();
    cli::run()
}
