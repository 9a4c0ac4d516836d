use tabled::Tabled;

use super::host::Host;
use super::table::Formatter;

#[derive(Tabled)]
struct PendingRow {
    hook: String,
    key: String,
    #[tabled(rename = "run at")]
    run_at: String,
}

#[derive(Tabled)]
struct RunRow {
    hook: String,
    key: String,
    outcome: String,
}

pub fn list(host: &Host) -> anyhow::Result<()> {
    let pending = host.lifecycle().jobs().pending()?;
    if pending.is_empty() {
        println!("No scheduled jobs.");
        return Ok(());
    }

    let rows = pending.into_iter().map(|job| PendingRow {
        hook: job.hook,
        key: job.key,
        run_at: job.run_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    });
    println!("{}", Formatter::default().header("Scheduled jobs").build(rows));
    Ok(())
}

pub fn run_due(host: &Host) -> anyhow::Result<()> {
    let runs = host.lifecycle().run_due()?;
    if runs.is_empty() {
        println!("No jobs due.");
        return Ok(());
    }

    let count = runs.len();
    let rows = runs.into_iter().map(|run| RunRow {
        outcome: match run.outcome {
            Ok(outcome) => format!("{outcome:?}"),
            Err(e) => format!("failed: {e}"),
        },
        hook: run.job.hook,
        key: run.job.key,
    });
    let table = Formatter::default()
        .header("Fired jobs")
        .footer(format!("{count} job(s) run, none will be retried"))
        .build(rows);
    println!("{table}");
    Ok(())
}
