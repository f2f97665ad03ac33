pub mod generate;
pub mod init;
pub mod login;
pub mod progress;
pub mod vignette;

use crate::cli::args::{Cli, Command};
use anyhow::Context;
use ddxrate_core::storage::Store;
use std::path::Path;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const OPERATION_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => init::cmd_init(args),
        Command::Vignette(args) => vignette::cmd_vignette(args),
        Command::Generate(args) => generate::cmd_generate(args).await,
        Command::GenerateAll(args) => generate::cmd_generate_all(args).await,
        Command::Progress(args) => progress::cmd_progress(args),
        Command::Login(args) => login::cmd_login(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

pub(crate) fn open_store(path: &Path) -> anyhow::Result<Store> {
    ensure_parent_dir(path)?;
    let store = Store::open(path)?;
    store.init_schema()?;
    Ok(store)
}

pub(crate) fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Verify the admin token before a mutating command runs.
pub(crate) fn require_admin(token: Option<&str>) -> anyhow::Result<()> {
    ddxrate_core::admin::require_admin(token).context(
        "admin authorization required (ddxrate login, then --token or DDXRATE_ADMIN_TOKEN)",
    )
}
