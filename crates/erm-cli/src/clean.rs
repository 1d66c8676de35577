use anyhow::{Context, Result};
use clap::Args;
use erm_core::{partition_by_origin, Mission};
use erm_storage::cleanup::{clean_manual_missions, CleanupReport};
use erm_storage::MissionStore;

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Classify and report without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(store: &MissionStore, args: CleanArgs) -> Result<()> {
    if args.dry_run {
        return dry_run(store);
    }

    let report = clean_manual_missions(store).context("Cleanup batch failed")?;
    print_report(&report);
    Ok(())
}

fn dry_run(store: &MissionStore) -> Result<()> {
    let missions = store.missions().context("Failed to scan missions")?;
    if missions.is_empty() {
        println!("Missions collection is empty - nothing to clean");
        return Ok(());
    }

    let total = missions.len();
    let (automatic, manual) = partition_by_origin(missions);
    println!(
        "Scanned {} mission(s): {} automatic, {} manual",
        total,
        automatic.len(),
        manual.len()
    );
    print_class("Would keep (automatic)", &automatic);
    print_class("Would delete (manual)", &manual);
    Ok(())
}

fn print_report(report: &CleanupReport) {
    if report.scanned == 0 {
        println!("Missions collection is empty - nothing to clean");
        return;
    }

    println!(
        "Scanned {} mission(s): {} automatic, {} manual",
        report.scanned,
        report.automatic.len(),
        report.manual.len()
    );
    print_class("Keeping (automatic)", &report.automatic);

    if report.was_noop() {
        println!("No manual missions found - nothing to delete");
        return;
    }
    print_class("Deleting (manual)", &report.manual);

    println!(
        "Deleted {}/{} manual mission(s)",
        report.deleted.len(),
        report.manual.len()
    );
    for failed in &report.failed {
        println!(
            "  failed: \"{}\" ({}): {}",
            failed.name, failed.id, failed.reason
        );
    }

    if let Some(remaining) = report.remaining {
        match report.residual_matches() {
            Some(true) => println!(
                "Remaining missions: {remaining} (matches the automatic set)"
            ),
            _ => println!(
                "Warning: {} mission(s) remain but {} automatic mission(s) were expected",
                remaining,
                report.automatic.len()
            ),
        }
    }
}

fn print_class(label: &str, missions: &[Mission]) {
    if missions.is_empty() {
        return;
    }
    println!("{label}:");
    for mission in missions {
        println!(
            "  - \"{}\" ({}) created {}",
            mission.name,
            mission.id,
            mission.created_at.to_rfc3339()
        );
    }
}
