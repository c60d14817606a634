// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod dev;
pub mod entrypoint;
pub mod errors;
pub mod logging;
pub mod manifest;
pub mod runner;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::build::{internal_build, BuilderBackend, CommandBuilder};
use crate::cli::{BrowserArg, CliArgs, Command, ModeArg};
use crate::config::{
    BuildMode, ContextOverrides, ManifestVersion, OrchestratorContext, TargetBrowser,
};
use crate::dev::dispatcher::{ReloadDispatcher, SessionCommand};
use crate::dev::protocol::ReloadMessage;
use crate::dev::server::start_reload_server;
use crate::dev::watcher::spawn_watcher;
use crate::entrypoint::{
    classify_entrypoints, validate_entrypoints, CommandConfigReader, ModuleConfigReader,
    NullConfigReader,
};
use crate::errors::{ExtkitError, Result};
use crate::runner::{CommandRunner, Runner};

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Build => run_build(&args).await,
        Command::Dev => run_dev(&args).await,
        Command::Zip => run_zip(&args).await,
        Command::Prepare => run_prepare(&args).await,
        Command::Clean => run_clean(&args),
        Command::Init => run_init(&args),
    }
}

fn overrides_from_args(args: &CliArgs, serve: bool) -> ContextOverrides {
    ContextOverrides {
        browser: args.browser.map(|b| match b {
            BrowserArg::Chrome => TargetBrowser::Chrome,
            BrowserArg::Firefox => TargetBrowser::Firefox,
            BrowserArg::Edge => TargetBrowser::Edge,
            BrowserArg::Opera => TargetBrowser::Opera,
            BrowserArg::Safari => TargetBrowser::Safari,
        }),
        manifest_version: if args.mv2 {
            Some(ManifestVersion::V2)
        } else if args.mv3 {
            Some(ManifestVersion::V3)
        } else {
            None
        },
        mode: args.mode.map(|m| match m {
            ModeArg::Development => BuildMode::Development,
            ModeArg::Production => BuildMode::Production,
        }),
        filter_entrypoints: args.filter_entrypoints.clone(),
        analyze: args.analyze,
        serve,
    }
}

fn make_reader(ctx: &OrchestratorContext) -> Box<dyn ModuleConfigReader> {
    match &ctx.config.commands.config_reader {
        Some(cmd) => Box::new(CommandConfigReader::new(cmd.clone())),
        None => Box::new(NullConfigReader),
    }
}

async fn run_build(args: &CliArgs) -> Result<()> {
    let ctx = OrchestratorContext::load(&args.config, overrides_from_args(args, false))?;
    let builder = CommandBuilder::from_context(&ctx)?;
    let reader = make_reader(&ctx);

    let result = internal_build(&ctx, &builder, reader.as_ref()).await?;
    info!(
        steps = result.output.steps.len(),
        out_dir = %ctx.out_dir().display(),
        "build finished"
    );
    Ok(())
}

async fn run_prepare(args: &CliArgs) -> Result<()> {
    let ctx = OrchestratorContext::load(&args.config, overrides_from_args(args, false))?;
    let reader = make_reader(&ctx);

    let entrypoints = classify_entrypoints(&ctx, reader.as_ref()).await?;

    println!(
        "extkit prepare: {} entrypoint(s) for {}-mv{}",
        entrypoints.len(),
        ctx.browser.as_str(),
        ctx.manifest_version.as_u64()
    );
    let root = ctx.entrypoints_dir();
    for ep in &entrypoints {
        let rel = ep
            .input_path
            .strip_prefix(&root)
            .unwrap_or(&ep.input_path)
            .display()
            .to_string();
        let mut flags = String::new();
        if ep.skipped {
            flags.push_str(" (skipped)");
        }
        if ep.synthetic {
            flags.push_str(" (virtual)");
        }
        println!("  - {} [{:?}] {rel}{flags}", ep.name, ep.ty);
    }

    validate_entrypoints(&entrypoints)?;
    Ok(())
}

fn run_clean(args: &CliArgs) -> Result<()> {
    let ctx = OrchestratorContext::load(&args.config, overrides_from_args(args, false))?;
    let out_base = ctx.root.join(&ctx.config.project.out_dir);
    if out_base.exists() {
        std::fs::remove_dir_all(&out_base)?;
        info!(path = %out_base.display(), "removed output directory");
    }
    Ok(())
}

fn run_init(args: &CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    if config_path.exists() {
        return Err(ExtkitError::ConfigError(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    std::fs::write(
        &config_path,
        r#"[project]
name = "my-extension"
version = "0.1.0"

[build]
browser = "chrome"
manifest_version = 3

[commands]
# builder = "node scripts/bundle.mjs"
# config_reader = "node scripts/read-config.mjs"
"#,
    )?;

    std::fs::create_dir_all("entrypoints")?;
    std::fs::create_dir_all("public")?;
    if !PathBuf::from("entrypoints/background.ts").exists() {
        std::fs::write(
            "entrypoints/background.ts",
            "export default {\n  main() {\n    console.log(\"background started\");\n  },\n};\n",
        )?;
    }

    info!("scaffolded new extkit project");
    Ok(())
}

async fn run_zip(args: &CliArgs) -> Result<()> {
    let mut overrides = overrides_from_args(args, false);
    if overrides.mode.is_none() {
        overrides.mode = Some(BuildMode::Production);
    }
    let ctx = OrchestratorContext::load(&args.config, overrides)?;

    let builder = CommandBuilder::from_context(&ctx)?;
    let reader = make_reader(&ctx);
    internal_build(&ctx, &builder, reader.as_ref()).await?;

    // Packaging is an external collaborator, like the Builder.
    let template = ctx.config.commands.zip.clone().ok_or_else(|| {
        ExtkitError::ConfigError("[commands].zip is not configured".to_string())
    })?;

    let name = ctx
        .config
        .project
        .name
        .clone()
        .unwrap_or_else(|| "extension".to_string());
    let zip_file = ctx.root.join(&ctx.config.project.out_dir).join(format!(
        "{name}-{}-mv{}.zip",
        ctx.browser.as_str(),
        ctx.manifest_version.as_u64()
    ));

    let cmd_str = template
        .replace("{out_dir}", &ctx.out_dir().display().to_string())
        .replace("{zip_file}", &zip_file.display().to_string());
    info!(cmd = %cmd_str, "packaging");

    let status = if cfg!(windows) {
        tokio::process::Command::new("cmd")
            .arg("/C")
            .arg(&cmd_str)
            .status()
            .await?
    } else {
        tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&cmd_str)
            .status()
            .await?
    };

    if !status.success() {
        return Err(ExtkitError::Other(anyhow!(
            "zip command exited with {status}"
        )));
    }
    info!(path = %zip_file.display(), "packaged extension");
    Ok(())
}

/// Run the dev server until Ctrl-C.
///
/// The outer loop exists for full restarts: a config-file change tears the
/// whole session down (builder, runner, watcher, reload server) and builds
/// a fresh one, exactly like a manual stop + start.
async fn run_dev(args: &CliArgs) -> Result<()> {
    loop {
        let ctx = OrchestratorContext::load(&args.config, overrides_from_args(args, true))?;
        let builder: Arc<dyn BuilderBackend> = Arc::new(CommandBuilder::from_context(&ctx)?);
        let reader = make_reader(&ctx);

        let result = internal_build(&ctx, builder.as_ref(), reader.as_ref()).await?;
        info!(
            steps = result.output.steps.len(),
            "initial dev build finished"
        );

        // Reload server + outbound pump.
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<ReloadMessage>(16);
        let server = start_reload_server(ctx.config.dev.port, inbound_tx)?;
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ReloadMessage>();
        {
            let server = server.clone();
            tokio::spawn(async move {
                while let Some(msg) = outbound_rx.recv().await {
                    server.broadcast(&msg);
                }
            });
        }

        let (session_tx, mut session_rx) = mpsc::unbounded_channel::<SessionCommand>();
        let runner: Arc<dyn Runner> = Arc::new(CommandRunner::new(
            ctx.config.runner.command.clone(),
            ctx.out_dir(),
        ));

        let dispatcher = Arc::new(ReloadDispatcher::new(
            ctx.clone(),
            Arc::clone(&builder),
            Arc::clone(&runner),
            result.entrypoints,
            result.output,
            outbound_tx,
            session_tx,
        ));

        let mut watch_roots = vec![ctx.root.clone()];
        if let Some(runner_cfg) = ctx.runner_config_file() {
            if !runner_cfg.starts_with(&ctx.root) {
                watch_roots.push(runner_cfg);
            }
        }
        let ignore = vec![
            ctx.root.join(&ctx.config.project.out_dir),
            ctx.root.join("node_modules"),
            ctx.root.join(".git"),
        ];
        let _watcher = spawn_watcher(watch_roots, ignore, Arc::clone(&dispatcher))?;

        runner.open_browser().await?;
        info!(port = server.port(), "dev server ready");

        // Wait for shutdown, a full-restart request, or inbound protocol
        // messages.
        let restart = loop {
            tokio::select! {
                ctrl_c = tokio::signal::ctrl_c() => {
                    if let Err(e) = ctrl_c {
                        warn!(error = %e, "failed to listen for Ctrl+C");
                    }
                    break false;
                }
                cmd = session_rx.recv() => match cmd {
                    Some(SessionCommand::FullRestart) => break true,
                    None => break false,
                },
                msg = inbound_rx.recv() => match msg {
                    Some(ReloadMessage::BackgroundInitialized) => {
                        dispatcher.handle_background_initialized().await;
                    }
                    Some(_) => {}
                    None => break false,
                }
            }
        };

        runner.close_browser().await?;

        if !restart {
            info!("dev server stopped");
            return Ok(());
        }
        info!("restarting dev server");
    }
}
