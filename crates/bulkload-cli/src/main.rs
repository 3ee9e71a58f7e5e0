//! 🚀 bulkload-cli — the front door, the bouncer, the maitre d' of bulkload.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that parses flags, loads config,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::error;
use tracing_subscriber::EnvFilter;

use bulkload::{ConfigOverrides, load_config, render_summary};

/// 🚚 Load a newline-delimited JSON file into Elasticsearch through the `_bulk` API.
#[derive(Debug, Parser)]
#[command(name = "bulkload", version, about)]
struct Cli {
    /// NDJSON file, one document per line
    #[arg(long, value_name = "PATH")]
    data: Option<PathBuf>,

    /// Validate every line before (or instead of) importing
    #[arg(long)]
    check: bool,

    /// Elasticsearch URL, e.g. http://localhost:9200
    #[arg(long, value_name = "URL")]
    bulk: Option<String>,

    /// Target index name
    #[arg(long, value_name = "NAME")]
    index: Option<String>,

    /// Legacy `_type` label for each action
    #[arg(long = "type", value_name = "LABEL")]
    doc_type: Option<String>,

    /// Import the file into the index
    #[arg(long)]
    import: bool,

    /// Number of parallel workers
    #[arg(long, value_name = "COUNT")]
    thread: Option<usize>,

    /// Optional TOML config file (flags win over it, it wins over BULKLOAD_* env vars)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse flags, layer them over the config file and env
/// 3. Nothing asked for? Print usage, leave politely.
/// 4. Run the thing (send it and pray 🙏)
/// 5. Print the summary, or the onion of errors
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 🎯 No arguments, or arguments nobody understands? Usage it is, and a clean exit.
    let Some(cli) = parse_cli(std::env::args_os())? else {
        return Ok(());
    };

    // 🔒 Validate the config file exists before we get too emotionally attached
    if let Some(ref config_file) = cli.config {
        let exists = config_file.try_exists().with_context(|| {
            format!(
                "💀 Couldn't even check whether the configuration file exists. Was checking here: '{}'",
                config_file.display()
            )
        })?;
        if !exists {
            error!(
                "💀 Configuration file '{}' does not exist. Maybe it's a pwd/cwd thing and relative paths. \
                 Use an absolute path, to be absolutely certain.",
                config_file.display()
            );
            std::process::exit(1);
        }
    }

    let overrides = ConfigOverrides {
        data: cli.data.clone(),
        check: cli.check,
        import: cli.import,
        url: cli.bulk.clone(),
        index: cli.index.clone(),
        doc_type: cli.doc_type.clone(),
        workers: cli.thread,
    };

    // 🔧 Load the config — this is the moment where we find out if the TOML is valid
    // or if someone put a tab where a space should be (looking at you, Kevin)
    let app_config = match load_config(cli.config.as_deref(), &overrides) {
        Ok(app_config) => app_config,
        Err(err) => {
            report_error(&err);
            std::process::exit(1);
        }
    };

    // 💤 nothing to check, nothing to import. the usage text is the whole show.
    if !app_config.check && !app_config.import {
        Cli::command().print_help()?;
        return Ok(());
    }

    // 🚀 SEND IT. No take-backs. This is not a drill.
    match bulkload::run(app_config).await {
        Ok(report) => {
            // ✅ failed validation and Ctrl-C are still a clean exit. The table says what happened.
            println!("{}", render_summary(&report));
            Ok(())
        }
        Err(err) => {
            report_error(&err);
            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}

/// 🎛️ Parse the command line. `None` means usage (or version) was printed and there is
/// nothing left to run: no arguments, `--help`, or a flag combination clap didn't like.
fn parse_cli<I, T>(args: I) -> Result<Option<Cli>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.len() <= 1 {
        Cli::command().print_help()?;
        return Ok(None);
    }
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => {
            err.print()?;
            if !matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                // -- 🙅 clap says exit 2 here. we say: here's the manual, no hard feelings.
                Cli::command().print_help()?;
            }
            Ok(None)
        }
    }
}

/// 💀 Error handling: the part where we find out what went wrong
/// and print it in a way that's helpful at 3am
fn report_error(err: &anyhow::Error) {
    error!("💀 error: {}", err);
    // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
    let mut the_vibes_are_giving_connection_issues = false;
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {}", cause);
        // -- 🕵️ sniff the cause like a truffle pig hunting for connection problems
        let cause_str = cause.to_string();
        if cause_str.contains("error sending request")
            || cause_str.contains("onnection refused")
            || cause_str.contains("tcp connect error")
            || cause_str.contains("dns error")
        {
            the_vibes_are_giving_connection_issues = true;
        }
    }

    if the_vibes_are_giving_connection_issues {
        error!(
            "🔧 hint: looks like Elasticsearch isn't reachable. \
            Double-check the --bulk URL and that the cluster is actually running. \
            If you're using Docker, try `docker ps` to see what's up. ☕"
        );
    }
}
