use crate::cli::args::{GenerateAllArgs, GenerateArgs};
use crate::cli::commands::{exit_codes, open_store, require_admin};
use ddxrate_core::config::StudyConfig;
use ddxrate_core::generate::{GenerationRequest, Generator};

pub async fn cmd_generate(args: GenerateArgs) -> anyhow::Result<i32> {
    require_admin(args.auth.token.as_deref())?;
    let store = open_store(&args.db)?;
    let study = StudyConfig::load_or_default(&args.config)?;
    let request = GenerationRequest {
        model: args.model,
        temperature: args.temperature,
        api_key: args.api_key,
    };
    let generator = Generator::openrouter(store, &study, &request)?;

    let output = if args.force {
        generator.regenerate_vignette(args.vignette_id).await?
    } else {
        generator.generate_for_vignette(args.vignette_id).await?
    };

    println!(
        "vignette {}: {} diagnoses (model {}, output id {})",
        output.vignette_id,
        output.diagnoses.len(),
        output.model_name,
        output.id
    );
    Ok(exit_codes::OK)
}

pub async fn cmd_generate_all(args: GenerateAllArgs) -> anyhow::Result<i32> {
    require_admin(args.auth.token.as_deref())?;
    let store = open_store(&args.db)?;
    let study = StudyConfig::load_or_default(&args.config)?;
    let request = GenerationRequest {
        model: args.model,
        temperature: args.temperature,
        api_key: args.api_key,
    };
    let generator = Generator::openrouter(store, &study, &request)?;

    let summary = generator.generate_all().await?;

    println!("generated: {}", summary.generated.len());
    for id in &summary.generated {
        println!("  vignette {}", id);
    }
    println!("skipped (already generated): {}", summary.skipped.len());
    if !summary.failed.is_empty() {
        println!("failed: {}", summary.failed.len());
        for f in &summary.failed {
            println!("  vignette {}: {}", f.vignette_id, f.error);
        }
        return Ok(exit_codes::OPERATION_FAILED);
    }
    Ok(exit_codes::OK)
}
