use clap::Parser;
use richards_cli::{Options, Result};

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Options::parse();
    opts.output.init()?;

    tracing::debug!(
        opts.count,
        opts.iterations,
        opts.trace,
        "richards configuration"
    );

    opts.run()
}
