use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::App::parse().run()
}
