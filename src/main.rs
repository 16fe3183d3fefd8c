use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pingy::{export_site, serve_scaffolder, serve_site, Autoprefix, ExportOptions, SiteOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pingy", version, about = "Development server for static sites")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve a site with live reload
    Serve {
        /// Site directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Port to listen on (defaults to pingy.json, then 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Don't open a browser
        #[arg(long)]
        no_open: bool,

        #[command(flatten)]
        prefix: PrefixArgs,
    },

    /// Pick a project template in the browser
    Scaffold {
        /// Scaffold assets directory
        dir: PathBuf,

        /// Don't open a browser
        #[arg(long)]
        no_open: bool,
    },

    /// Write a built copy of a site
    Export {
        /// Site directory
        input: PathBuf,

        /// Output directory
        output: PathBuf,

        #[command(flatten)]
        prefix: PrefixArgs,
    },
}

#[derive(Debug, Args)]
struct PrefixArgs {
    /// Add vendor prefixes to plain CSS, optionally for the given browserslist queries
    #[arg(long, num_args = 0.., value_name = "QUERY")]
    autoprefix: Option<Vec<String>>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "pingy=debug" } else { "pingy=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn open_browser(url: &str) {
    if let Err(e) = webbrowser::open(url) {
        tracing::warn!("failed to open browser: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Serve {
            dir,
            port,
            no_open,
            prefix,
        } => {
            let mut options = SiteOptions::default()
                .merge_file(&dir)
                .context("Failed to load project config")?;
            if let Some(port) = port {
                options.port = port;
            }
            if prefix.autoprefix.is_some() {
                options.autoprefix = Autoprefix::from_args(prefix.autoprefix);
            }
            options.open_browser = !no_open;

            let site = serve_site(&dir, &options)?;
            println!("Serving {} at {}", dir.display(), site.url);
            if options.open_browser {
                open_browser(&site.url);
            }

            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down");
            site.destroy().await;
        }
        Command::Scaffold { dir, no_open } => {
            let scaffold = serve_scaffolder(&dir).await?;
            println!("Choose a template at {}", scaffold.scaffold_url);
            if !no_open {
                open_browser(&scaffold.scaffold_url);
            }

            let chosen = scaffold.scaffold_complete.await?;
            println!("{}", serde_json::to_string_pretty(&chosen)?);
        }
        Command::Export {
            input,
            output,
            prefix,
        } => {
            let options = ExportOptions {
                autoprefix: Autoprefix::from_args(prefix.autoprefix),
            };
            let report = tokio::task::spawn_blocking(move || export_site(&input, &output, &options))
                .await
                .context("Export task panicked")??;
            println!(
                "Exported {} compiled and {} copied files",
                report.compiled.len(),
                report.copied.len()
            );
        }
    }

    Ok(())
}
