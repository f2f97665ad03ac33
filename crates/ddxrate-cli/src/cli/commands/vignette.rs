use crate::cli::args::{VignetteArgs, VignetteSub};
use crate::cli::commands::{exit_codes, open_store, require_admin};
use anyhow::Context;
use ddxrate_core::model::{LlmOutput, Vignette, VignetteCategory, VignetteStats};
use ddxrate_core::storage::Store;
use std::path::Path;

pub fn cmd_vignette(args: VignetteArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let token = args.auth.token.as_deref();

    match args.cmd {
        VignetteSub::Add {
            category,
            initials,
            content,
        } => {
            require_admin(token)?;
            let category = parse_category(&category)?;
            let id = store.create_vignette(category, &initials, &content)?;
            eprintln!("vignette added: id={}", id);
        }
        VignetteSub::Update {
            id,
            category,
            initials,
            content,
        } => {
            require_admin(token)?;
            let category = parse_category(&category)?;
            store.update_vignette(id, category, &initials, &content)?;
            eprintln!("vignette updated: id={}", id);
        }
        VignetteSub::Delete { id } => {
            require_admin(token)?;
            if store.delete_vignette(id)? {
                eprintln!("vignette deleted: id={}", id);
            } else {
                anyhow::bail!("vignette {} not found", id);
            }
        }
        VignetteSub::List { category, format } => {
            let mut stats = store.all_vignette_stats()?;
            if let Some(c) = category {
                let wanted = parse_category(&c)?;
                stats.retain(|s| s.vignette.category == wanted);
            }
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats_table(&stats);
            }
        }
        VignetteSub::Show { id, format } => {
            let vignette = store
                .vignette_by_id(id)?
                .with_context(|| format!("vignette {} not found", id))?;
            let output = store.llm_output_by_vignette(id)?;
            if format == "json" {
                let doc = serde_json::json!({ "vignette": vignette, "llm_output": output });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                print_vignette(&vignette, output.as_ref());
            }
        }
        VignetteSub::Import { input } => {
            require_admin(token)?;
            let n = import_vignettes(&store, &input)?;
            eprintln!("imported {} vignettes from {}", n, input.display());
        }
    }
    Ok(exit_codes::OK)
}

fn parse_category(s: &str) -> anyhow::Result<VignetteCategory> {
    VignetteCategory::parse(s).with_context(|| {
        format!(
            "unknown category '{}' (expected common|ambiguous|emergent|rare)",
            s
        )
    })
}

#[derive(serde::Deserialize)]
struct ImportFile {
    vignettes: Vec<ImportVignette>,
}

#[derive(serde::Deserialize)]
struct ImportVignette {
    category: VignetteCategory,
    patient_initials: String,
    content: String,
}

fn import_vignettes(store: &Store, input: &Path) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let parsed: ImportFile =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    if parsed.vignettes.is_empty() {
        anyhow::bail!("{} contains no vignettes", input.display());
    }
    for v in &parsed.vignettes {
        store.create_vignette(v.category, &v.patient_initials, &v.content)?;
    }
    Ok(parsed.vignettes.len())
}

fn print_stats_table(stats: &[VignetteStats]) {
    if stats.is_empty() {
        println!("no vignettes yet");
        return;
    }
    println!(
        "{:>4}  {:<10} {:<9} {:>6}  {}",
        "id", "category", "initials", "evals", "diagnoses"
    );
    for s in stats {
        println!(
            "{:>4}  {:<10} {:<9} {:>6}  {}",
            s.vignette.id,
            s.vignette.category.as_str(),
            s.vignette.patient_initials,
            s.evaluation_count,
            if s.has_llm_output { "generated" } else { "-" }
        );
    }
}

fn print_vignette(vignette: &Vignette, output: Option<&LlmOutput>) {
    println!(
        "vignette {} [{}] patient {} (created {})",
        vignette.id, vignette.category, vignette.patient_initials, vignette.created_at
    );
    println!();
    println!("{}", vignette.content);

    match output {
        Some(out) => {
            println!();
            println!(
                "diagnoses from {} (temperature {}, generated {}):",
                out.model_name, out.temperature, out.created_at
            );
            for d in &out.diagnoses {
                let rank = d
                    .likelihood_rank
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let code = d.icd10_code.as_deref().unwrap_or("-");
                println!("  {}. {} [{}]", rank, d.diagnosis, code);
                println!("     {}", d.rationale);
            }
            if let Some(missing) = &out.missing_information {
                println!("missing information:");
                for m in missing {
                    println!("  - {}", m);
                }
            }
        }
        None => {
            println!();
            println!("(no diagnoses generated yet)");
        }
    }
}
