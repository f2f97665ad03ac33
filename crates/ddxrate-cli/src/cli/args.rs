use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ddxrate",
    version,
    about = "Clinician evaluation workbench for LLM differential diagnoses"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Init(InitArgs),
    Vignette(VignetteArgs),
    Generate(GenerateArgs),
    GenerateAll(GenerateAllArgs),
    Progress(ProgressArgs),
    Login(LoginArgs),
    Version,
}

/// Signed admin token for mutating commands.
#[derive(clap::Args, Debug, Clone)]
pub struct AdminTokenArg {
    /// Admin token from `ddxrate login`
    #[arg(long, env = "DDXRATE_ADMIN_TOKEN")]
    pub token: Option<String>,
}

#[derive(Parser, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = ".study/study.db")]
    pub db: PathBuf,

    #[arg(long, default_value = "study.yaml")]
    pub config: PathBuf,

    /// generate .gitignore for the database directory
    #[arg(long)]
    pub gitignore: bool,
}

#[derive(Parser, Clone)]
pub struct VignetteArgs {
    #[command(subcommand)]
    pub cmd: VignetteSub,

    #[arg(long, default_value = ".study/study.db")]
    pub db: PathBuf,

    #[command(flatten)]
    pub auth: AdminTokenArg,
}

#[derive(Subcommand, Clone)]
pub enum VignetteSub {
    /// Add a vignette
    Add {
        /// Category: common|ambiguous|emergent|rare
        #[arg(long)]
        category: String,
        /// Patient initials shown to raters
        #[arg(long)]
        initials: String,
        /// Full vignette text (SOAP format)
        #[arg(long)]
        content: String,
    },
    /// Update an existing vignette
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        category: String,
        #[arg(long)]
        initials: String,
        #[arg(long)]
        content: String,
    },
    /// Delete a vignette together with its outputs and evaluations
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// List vignettes with collection counters
    List {
        /// Filter by category
        #[arg(long)]
        category: Option<String>,
        /// Output format: text|json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one vignette with its latest generated diagnoses
    Show {
        #[arg(long)]
        id: i64,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Bulk-import vignettes from a YAML file
    Import {
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Parser, Clone)]
pub struct GenerateArgs {
    #[arg(long)]
    pub vignette_id: i64,

    #[arg(long, default_value = ".study/study.db")]
    pub db: PathBuf,

    #[arg(long, default_value = "study.yaml")]
    pub config: PathBuf,

    /// Model identifier (defaults to the configured model)
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature (defaults to the configured temperature)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// OpenRouter key override (OPENROUTER_API_KEY is primary)
    #[arg(long, hide = true)]
    pub api_key: Option<String>,

    /// Regenerate even when diagnoses already exist
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub auth: AdminTokenArg,
}

#[derive(Parser, Clone)]
pub struct GenerateAllArgs {
    #[arg(long, default_value = ".study/study.db")]
    pub db: PathBuf,

    #[arg(long, default_value = "study.yaml")]
    pub config: PathBuf,

    /// Model identifier (defaults to the configured model)
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature (defaults to the configured temperature)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// OpenRouter key override (OPENROUTER_API_KEY is primary)
    #[arg(long, hide = true)]
    pub api_key: Option<String>,

    #[command(flatten)]
    pub auth: AdminTokenArg,
}

#[derive(Parser, Clone)]
pub struct ProgressArgs {
    #[arg(long)]
    pub rater_id: String,

    #[arg(long, default_value = ".study/study.db")]
    pub db: PathBuf,

    /// Output format: text|json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Parser, Clone)]
pub struct LoginArgs {
    /// Admin password (verified against DDXRATE_ADMIN_PASSWORD)
    #[arg(long)]
    pub password: String,

    /// Token lifetime in seconds
    #[arg(long, default_value_t = 3600)]
    pub ttl_secs: i64,
}
