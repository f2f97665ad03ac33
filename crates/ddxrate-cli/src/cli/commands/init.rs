use crate::cli::args::InitArgs;
use crate::cli::commands::{ensure_parent_dir, exit_codes, open_store};

pub fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    // 1. Database schema
    let _store = open_store(&args.db)?;
    eprintln!("initialized {}", args.db.display());

    // 2. Sample config
    if !args.config.exists() {
        ensure_parent_dir(&args.config)?;
        ddxrate_core::config::write_sample_config(&args.config)?;
        eprintln!("created {}", args.config.display());
    } else {
        eprintln!("note: {} already exists", args.config.display());
    }

    // 3. Gitignore
    if args.gitignore {
        let gi_path = std::path::Path::new(".gitignore");
        if !gi_path.exists() {
            std::fs::write(gi_path, "/.study/\n*.db\n*.db-shm\n*.db-wal\n")?;
            eprintln!("created .gitignore");
        } else {
            eprintln!("note: .gitignore already exists (skipped)");
        }
    }

    Ok(exit_codes::OK)
}
