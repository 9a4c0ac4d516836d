use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use sitex_export::access::{DELETE_ACTION, DOWNLOAD_ACTION};
use sitex_export::{DeletionOutcome, ExportError};

use super::host::Host;

#[derive(Clone, Debug, clap::Args)]
#[command(about = "Download an export archive through the authenticated path")]
pub struct DownloadArg {
    pub file_name: String,
    /// Write the archive here instead of stdout.
    #[arg(long, short, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

impl DownloadArg {
    pub fn run(self, host: &Host) -> anyhow::Result<()> {
        let ctx = host.request(DOWNLOAD_ACTION)?;
        let response = host
            .lifecycle()
            .download(&ctx, &self.file_name)
            .map_err(rejected)?;

        match self.out {
            Some(out) => {
                let mut file = File::create(&out)
                    .with_context(|| format!("failed to create {}", out.display()))?;
                let written = response.write_to(&mut file)?;
                file.flush()?;
                eprintln!("Saved {written} bytes to {}", out.display());
            }
            None => {
                let mut stdout = io::stdout().lock();
                response.write_to(&mut stdout)?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, clap::Args)]
#[command(about = "Delete an export archive")]
pub struct DeleteArg {
    pub file_name: String,
}

impl DeleteArg {
    pub fn run(self, host: &Host) -> anyhow::Result<()> {
        let ctx = host.request(DELETE_ACTION)?;
        let response = host
            .lifecycle()
            .delete(&ctx, &self.file_name)
            .map_err(rejected)?;

        match response.outcome {
            DeletionOutcome::Deleted(_) => println!("Export file successfully deleted."),
            DeletionOutcome::AlreadyGone(_) => println!("Export file was already removed."),
        }
        println!("Return to: {}", response.redirect);
        Ok(())
    }
}

fn rejected(e: ExportError) -> anyhow::Error {
    anyhow!("{} (status {})", e.public_message(), e.status())
}
