//! witmux: agent session supervisor over tmux or amux.

use clap::Parser;

mod cli;
mod cmd_session;
mod cmd_watch;
mod cmd_witness;
mod context;

use cli::{Command, WitnessCommand};
use context::Context;

fn init_logging() {
    let filter = std::env::var("WITMUX_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_logging();

    let ctx = Context::from_cli(&args)?;

    match &args.command {
        Command::Witness { action } => match action {
            WitnessCommand::Start(opts) => cmd_witness::cmd_start(&ctx, opts)?,
            WitnessCommand::Stop => cmd_witness::cmd_stop(&ctx)?,
            WitnessCommand::Status(opts) => cmd_witness::cmd_status(&ctx, opts)?,
            WitnessCommand::Health(opts) => {
                let code = cmd_witness::cmd_health(&ctx, opts);
                if code != 0 {
                    std::process::exit(code);
                }
            }
            WitnessCommand::Watch(opts) => {
                ctx.require_backend()?;
                cmd_watch::cmd_watch(ctx.witness(), opts, ctx.config.max_idle()).await?;
            }
        },
        Command::Ls(opts) => cmd_session::cmd_ls(&ctx, opts)?,
        Command::Capture(opts) => cmd_session::cmd_capture(&ctx, opts)?,
        Command::Nudge(opts) => cmd_session::cmd_nudge(&ctx, opts)?,
        Command::Kill(opts) => cmd_session::cmd_kill(&ctx, opts)?,
    }

    Ok(())
}
