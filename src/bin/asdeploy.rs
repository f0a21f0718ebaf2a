// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use asdeploy::{
    config::ToolConfig,
    fsutil::{complete_delete, file_safe_copy, touch, ErrorCollector, TracingListener},
    path::default_config_file,
    server::ServerState,
};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use glob::Pattern;
use std::{
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "asdeploy [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to tool configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => default_config_file()?,
        };

        match self.command {
            Command::Prefs(command) => run_prefs(command, ToolConfig::load(config_path)?),
            Command::Copy(opts) => run_copy(opts),
            Command::Delete(opts) => run_delete(opts),
            Command::Touch(opts) => run_touch(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Inspect or edit deployment preferences of a server.
    #[command(subcommand)]
    Prefs(PrefsCommand),

    /// Copy file or directory tree, replacing destination.
    #[command(override_usage = "asdeploy copy [options] <src> <dest>")]
    Copy(CopyOptions),

    /// Delete file or directory tree.
    #[command(override_usage = "asdeploy delete [options] <path>")]
    Delete(DeleteOptions),

    /// Update modification time of file or directory tree.
    #[command(override_usage = "asdeploy touch [options] <root>")]
    Touch(TouchOptions),
}

#[derive(Debug, Clone, Subcommand)]
enum PrefsCommand {
    /// Show full deployment preference tree of server.
    #[command(override_usage = "asdeploy prefs list [options] <server>")]
    List(ListOptions),

    /// Show single property value.
    #[command(override_usage = "asdeploy prefs get [options] <server> <type> <key>")]
    Get(GetOptions),

    /// Set single property value.
    #[command(override_usage = "asdeploy prefs set [options] <server> <type> <key> <value>")]
    Set(SetOptions),

    /// Remove single property.
    #[command(override_usage = "asdeploy prefs unset [options] <server> <type> <key>")]
    Unset(UnsetOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Name of server.
    #[arg(required = true, value_name = "server")]
    pub server: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct GetOptions {
    /// Name of server.
    #[arg(required = true, value_name = "server")]
    pub server: String,

    /// Deployment type holding the property.
    #[arg(required = true, value_name = "type")]
    pub deployment_type: String,

    /// Key of property.
    #[arg(required = true, value_name = "key")]
    pub key: String,

    /// Look in preferences of module instead of deployment type.
    #[arg(short, long, value_name = "module_id")]
    pub module: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SetOptions {
    /// Name of server.
    #[arg(required = true, value_name = "server")]
    pub server: String,

    /// Deployment type holding the property.
    #[arg(required = true, value_name = "type")]
    pub deployment_type: String,

    /// Key of property.
    #[arg(required = true, value_name = "key")]
    pub key: String,

    /// New value of property.
    #[arg(required = true, value_name = "value")]
    pub value: String,

    /// Set in preferences of module instead of deployment type.
    #[arg(short, long, value_name = "module_id")]
    pub module: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UnsetOptions {
    /// Name of server.
    #[arg(required = true, value_name = "server")]
    pub server: String,

    /// Deployment type holding the property.
    #[arg(required = true, value_name = "type")]
    pub deployment_type: String,

    /// Key of property.
    #[arg(required = true, value_name = "key")]
    pub key: String,

    /// Remove from preferences of module instead of deployment type.
    #[arg(short, long, value_name = "module_id")]
    pub module: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CopyOptions {
    /// File or directory to copy.
    #[arg(required = true, value_name = "src")]
    pub src: PathBuf,

    /// Destination to replace.
    #[arg(required = true, value_name = "dest")]
    pub dest: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// File or directory to delete.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,

    /// Also prune emptied parent directories up to this directory.
    #[arg(short, long, value_name = "dir")]
    pub archive_root: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct TouchOptions {
    /// File or directory to start from.
    #[arg(required = true, value_name = "root")]
    pub root: PathBuf,

    /// Only touch paths whose name matches glob pattern.
    #[arg(short, long, value_name = "glob")]
    pub pattern: Option<String>,

    /// Visit everything below root, not just root itself.
    #[arg(short, long)]
    pub recurse: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_prefs(command: PrefsCommand, config: ToolConfig) -> Result<()> {
    match command {
        PrefsCommand::List(opts) => run_prefs_list(opts, &config),
        PrefsCommand::Get(opts) => run_prefs_get(opts, &config),
        PrefsCommand::Set(opts) => run_prefs_set(opts, &config),
        PrefsCommand::Unset(opts) => run_prefs_unset(opts, &config),
    }
}

fn run_prefs_list(opts: ListOptions, config: &ToolConfig) -> Result<()> {
    let server = ServerState::resolve(opts.server, config)?;
    let prefs = server.load_preferences()?;

    for (key, value) in prefs.properties() {
        println!("{key} = {value}");
    }

    for type_id in prefs.deployment_types() {
        println!("{type_id}");
        let Some(type_prefs) = prefs.get_preferences(type_id) else {
            continue;
        };

        for (key, value) in type_prefs.properties() {
            println!("  {key} = {value}");
        }

        for module_id in type_prefs.module_ids() {
            println!("  [{module_id}]");
            if let Some(module_prefs) = type_prefs.get_module_prefs(module_id) {
                for (key, value) in module_prefs.properties() {
                    println!("    {key} = {value}");
                }
            }
        }
    }

    Ok(())
}

fn run_prefs_get(opts: GetOptions, config: &ToolConfig) -> Result<()> {
    let server = ServerState::resolve(opts.server, config)?;
    let prefs = server.load_preferences()?;
    let type_prefs = prefs
        .get_preferences(&opts.deployment_type)
        .ok_or_else(|| anyhow!("no deployment type {:?}", opts.deployment_type))?;

    let value = match &opts.module {
        Some(module_id) => type_prefs
            .get_module_prefs(module_id)
            .ok_or_else(|| anyhow!("no module {module_id:?} in {:?}", opts.deployment_type))?
            .get_property(&opts.key)
            .map(ToString::to_string),
        None => type_prefs.get_property(&opts.key).map(ToString::to_string),
    };

    match value {
        Some(value) => println!("{value}"),
        None => bail!("no property {:?}", opts.key),
    }

    Ok(())
}

fn run_prefs_set(opts: SetOptions, config: &ToolConfig) -> Result<()> {
    let server = ServerState::resolve(opts.server, config)?;
    let mut prefs = server.load_preferences()?;

    let mut type_prefs = prefs.get_or_create_preferences(&opts.deployment_type);
    match &opts.module {
        Some(module_id) => type_prefs
            .get_or_create_module_prefs(module_id)
            .set_property(&opts.key, &opts.value),
        None => type_prefs.set_property(&opts.key, &opts.value),
    }

    server.save_preferences(&prefs)?;

    Ok(())
}

fn run_prefs_unset(opts: UnsetOptions, config: &ToolConfig) -> Result<()> {
    let server = ServerState::resolve(opts.server, config)?;
    let mut prefs = server.load_preferences()?;
    let mut type_prefs = prefs
        .get_preferences_mut(&opts.deployment_type)
        .ok_or_else(|| anyhow!("no deployment type {:?}", opts.deployment_type))?;

    let removed = match &opts.module {
        Some(module_id) => type_prefs
            .get_module_prefs_mut(module_id)
            .ok_or_else(|| anyhow!("no module {module_id:?} in {:?}", opts.deployment_type))?
            .remove_property(&opts.key),
        None => type_prefs.remove_property(&opts.key),
    };

    if removed.is_none() {
        bail!("no property {:?}", opts.key);
    }

    server.save_preferences(&prefs)?;

    Ok(())
}

fn run_copy(opts: CopyOptions) -> Result<()> {
    if !file_safe_copy(&opts.src, &opts.dest, &mut TracingListener) {
        bail!(
            "failed to copy {:?} to {:?}",
            opts.src.display(),
            opts.dest.display()
        );
    }

    Ok(())
}

fn run_delete(opts: DeleteOptions) -> Result<()> {
    let mut collector = ErrorCollector::new();
    complete_delete(&opts.path, opts.archive_root.as_deref(), &mut collector);

    if let Some(error) = collector.into_errors().into_iter().next() {
        return Err(error.into());
    }

    Ok(())
}

fn run_touch(opts: TouchOptions) -> Result<()> {
    let pattern = opts.pattern.as_deref().map(Pattern::new).transpose()?;
    let filter = |path: &Path| match &pattern {
        Some(pattern) => path
            .file_name()
            .is_some_and(|name| pattern.matches(&name.to_string_lossy())),
        None => true,
    };

    let touched = touch(filter, &opts.root, opts.recurse)?;
    info!("touched {touched} paths under {:?}", opts.root.display());

    Ok(())
}
