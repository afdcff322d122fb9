// src/bin/bramble.rs

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;

use bramble::core::context::{CommandAction, CommandSource, NamedSource};
use bramble::core::dispatcher::{DispatchError, Dispatcher};
use bramble::core::permission::{Authorizer, OwnerLookup};
use bramble::core::tree::{CommandTree, NodeId};
use bramble::models::TreeManifest;

/// bramble: a backtracking command-tree dispatcher with hierarchical
/// permission resolution.
///
/// The binary is a harness around the library: it loads a declarative tree
/// manifest (TOML), then either audits it for ambiguous sibling pairs or
/// dispatches lines read from stdin against it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a command-tree manifest and report ambiguous sibling pairs.
    Check {
        /// Path to the TOML tree manifest.
        manifest: PathBuf,
    },
    /// Load a manifest and dispatch stdin lines against it.
    Repl {
        /// Path to the TOML tree manifest.
        manifest: PathBuf,
        /// Name the invoking source reports to authorizers and actions.
        #[arg(long, default_value = "console")]
        source: String,
        /// Owner id attributed to every root command.
        #[arg(long, default_value = "core")]
        owner: String,
    },
}

/// Grants everything; the harness exercises parsing, not policy.
struct PermissiveAuthorizer;

impl Authorizer for PermissiveAuthorizer {
    fn is_authorized(&self, _permission: &str, _source: &dyn CommandSource) -> bool {
        true
    }

    fn register_known_permission(&self, permission: &str, default_priority: u8) {
        log::debug!("Known permission registered: {permission} (priority {default_priority})");
    }
}

/// Attributes every root command to one fixed owner id.
struct StaticOwner {
    owner: String,
}

impl OwnerLookup for StaticOwner {
    fn owner_of(&self, _root_segment: &str) -> Option<String> {
        Some(self.owner.clone())
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Check { manifest } => check(&manifest),
        Command::Repl {
            manifest,
            source,
            owner,
        } => repl(&manifest, &source, &owner),
    }
}

fn load_dispatcher(manifest_path: &Path, owner: &str) -> Result<Dispatcher> {
    let raw = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read manifest '{}'", manifest_path.display()))?;
    let manifest = TreeManifest::from_toml_str(&raw)
        .with_context(|| format!("Failed to parse manifest '{}'", manifest_path.display()))?;

    let mut dispatcher = Dispatcher::new(
        Arc::new(PermissiveAuthorizer),
        Arc::new(StaticOwner {
            owner: owner.to_string(),
        }),
    );
    manifest
        .apply(&mut dispatcher, &echo_action)
        .context("Failed to register the manifest tree")?;
    Ok(dispatcher)
}

/// The harness action: echo the endpoint path and whatever arguments bound.
fn echo_action(path: &str) -> CommandAction {
    let path = path.to_string();
    Arc::new(move |invocation| {
        let mut args: Vec<String> = invocation
            .args()
            .iter()
            .map(|(name, value)| format!("{name}={value:?}"))
            .collect();
        args.sort();
        println!(
            "{} {} {}",
            "ran".green().bold(),
            path,
            if args.is_empty() {
                "(no arguments)".dimmed().to_string()
            } else {
                args.join(" ")
            }
        );
        Ok(0)
    })
}

fn check(manifest_path: &Path) -> Result<()> {
    let dispatcher = load_dispatcher(manifest_path, "core")?;

    let mut count = 0usize;
    dispatcher.find_ambiguities(|ambiguity| {
        count += 1;
        println!(
            "{} under '{}': '{}' and '{}' both accept {}",
            "ambiguous".yellow().bold(),
            display_path(dispatcher.tree(), ambiguity.parent),
            node_name(dispatcher.tree(), ambiguity.first),
            node_name(dispatcher.tree(), ambiguity.second),
            ambiguity
                .examples
                .iter()
                .map(|e| format!("{e:?}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    });

    if count > 0 {
        anyhow::bail!("Found {count} ambiguous sibling pair(s).");
    }
    println!("{}: no ambiguities found.", "ok".green().bold());
    Ok(())
}

fn repl(manifest_path: &Path, source_name: &str, owner: &str) -> Result<()> {
    let dispatcher = load_dispatcher(manifest_path, owner)?;
    let source = NamedSource::live_player(source_name);

    println!(
        "bramble repl: {} node(s) loaded. Type a command, or 'exit' to leave.",
        dispatcher.tree().node_count()
    );

    let stdin = io::stdin();
    loop {
        print!("{} ", ">".cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match dispatcher.execute(line, &source) {
            Ok(code) => {
                if code != 0 {
                    println!("{} result code {}", "ok".green(), code);
                }
            }
            Err(DispatchError::Syntax(err)) => {
                println!("  {line}");
                println!("  {}{}", " ".repeat(err.cursor), "^".red().bold());
                println!("{}: {}", "syntax error".red().bold(), err.message);
            }
            Err(DispatchError::UnknownCommand { input }) => {
                println!("{}: '{}'", "unknown command".red().bold(), input);
            }
            Err(DispatchError::Execution(err)) => {
                if err.is_friendly() {
                    println!("{}", err.message().yellow());
                } else {
                    log::error!("Command failed: {}", err.message());
                    println!("{}", "An internal error occurred while running that command.".red());
                }
            }
        }
    }
    Ok(())
}

fn node_name(tree: &CommandTree, id: NodeId) -> String {
    tree.node(id).name().unwrap_or("<root>").to_string()
}

fn display_path(tree: &CommandTree, id: NodeId) -> String {
    let path = tree.path_to_root(id);
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(" ")
    }
}
