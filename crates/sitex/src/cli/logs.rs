use sitex_state::LogEntry;
use tabled::Tabled;

use super::host::Host;
use super::table::{Formatter, format_time};

#[derive(Clone, Debug, clap::Args)]
pub struct LogsArg {
    /// Empty the buffer after printing it.
    #[arg(long)]
    pub clear: bool,
}

#[derive(Tabled)]
struct LogRow {
    time: String,
    level: String,
    user: u64,
    ip: String,
    message: String,
}

impl From<LogEntry> for LogRow {
    fn from(entry: LogEntry) -> Self {
        Self {
            time: format_time(entry.time),
            level: entry.level.to_string(),
            user: entry.user_id,
            ip: entry.ip,
            message: entry.message,
        }
    }
}

impl LogsArg {
    pub fn run(self, host: &Host) -> anyhow::Result<()> {
        let entries = host.ring.entries()?;
        if entries.is_empty() {
            println!("No log entries.");
        } else {
            let rows = entries.into_iter().map(LogRow::from);
            println!("{}", Formatter::default().header("Recent log entries").build(rows));
        }

        if self.clear {
            host.ring.clear()?;
            println!("Log buffer cleared.");
        }
        Ok(())
    }
}
