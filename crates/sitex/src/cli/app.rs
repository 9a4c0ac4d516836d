use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::artifact::{DeleteArg, DownloadArg};
use super::host::Host;
use super::logs::LogsArg;

#[derive(Clone, Debug, Parser)]
#[command(name = "sitex", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// TOML configuration file; `SITEX_*` variables override it.
    #[arg(long, short, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "e", name = "export", about = "Dump the database and archive the site")]
    Export,
    #[command(alias = "dl", name = "download")]
    Download(DownloadArg),
    #[command(alias = "rm", name = "delete")]
    Delete(DeleteArg),
    #[command(name = "run-due", about = "Fire every scheduled job that is due")]
    RunDue,
    #[command(name = "jobs", about = "List pending scheduled jobs")]
    Jobs,
    #[command(name = "logs", about = "Show recent error and security log entries")]
    Logs(LogsArg),
}

impl App {
    pub fn run(self) -> anyhow::Result<()> {
        let host = Host::load(self.config.as_deref())?;
        match self.cmd {
            Commands::Export => super::export::run(&host),
            Commands::Download(arg) => arg.run(&host),
            Commands::Delete(arg) => arg.run(&host),
            Commands::RunDue => super::jobs::run_due(&host),
            Commands::Jobs => super::jobs::list(&host),
            Commands::Logs(arg) => arg.run(&host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        App::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let app = App::parse_from(["sitex", "--config", "sitex.toml", "dl", "a.zip", "--out", "b.zip"]);
        assert_eq!(app.config, Some(PathBuf::from("sitex.toml")));
        match app.cmd {
            Commands::Download(arg) => {
                assert_eq!(arg.file_name, "a.zip");
                assert_eq!(arg.out, Some(PathBuf::from("b.zip")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
