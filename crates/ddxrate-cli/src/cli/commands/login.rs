use crate::cli::args::LoginArgs;
use crate::cli::commands::exit_codes;

pub fn cmd_login(args: LoginArgs) -> anyhow::Result<i32> {
    let token = ddxrate_core::admin::login(&args.password, args.ttl_secs)?;
    // Token on stdout so it can be captured; the notice stays on stderr.
    println!("{}", token);
    eprintln!(
        "token valid for {}s; pass it via --token or DDXRATE_ADMIN_TOKEN",
        args.ttl_secs
    );
    Ok(exit_codes::OK)
}
