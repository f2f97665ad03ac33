use crate::cli::args::ProgressArgs;
use crate::cli::commands::{exit_codes, open_store};
use ddxrate_core::progress::ProgressTracker;

pub fn cmd_progress(args: ProgressArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let tracker = ProgressTracker::new(store);
    let progress = tracker.progress(&args.rater_id)?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(exit_codes::OK);
    }

    println!(
        "rater {}: {}/{} vignettes evaluated",
        progress.rater_id, progress.completed_vignettes, progress.total_vignettes
    );
    if !progress.completed_ids.is_empty() {
        println!("completed: {:?}", progress.completed_ids);
    }
    if progress.is_complete() {
        println!("survey complete");
    } else if let Some((vignette, output)) = tracker.next_vignette(&args.rater_id)? {
        let readiness = if output.is_some() {
            "ready"
        } else {
            "no diagnoses generated yet"
        };
        println!("next: vignette {} [{}] ({})", vignette.id, vignette.category, readiness);
    }
    Ok(exit_codes::OK)
}
