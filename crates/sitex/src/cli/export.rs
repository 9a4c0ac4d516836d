use anyhow::anyhow;
use sitex_export::access::EXPORT_ACTION;

use super::host::Host;

pub fn run(host: &Host) -> anyhow::Result<()> {
    let ctx = host.request(EXPORT_ACTION)?;
    let mut orchestrator = host.orchestrator();

    let success = match orchestrator.run(&ctx) {
        Ok(success) => success,
        Err(e) => return Err(anyhow!("Export error: {}", e.public_message())),
    };

    println!("Site export successfully created!");
    println!("File location: {}", success.display_path);
    println!("Download: {}", success.download_url);
    println!("Delete:   {}", success.delete_url);

    let report = &success.report;
    println!(
        "{} files and {} directories archived ({} bytes), {} entries excluded",
        report.files_added, report.directories_added, report.bytes_added, report.excluded
    );
    for failure in &report.failures {
        println!("  skipped {} ({:?}): {}", failure.path.display(), failure.kind, failure.detail);
    }
    if success.deletion_scheduled {
        println!(
            "The archive will be deleted automatically in {} seconds.",
            host.config.deletion_delay_secs
        );
    }
    Ok(())
}
