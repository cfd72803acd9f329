//! Main CLI application structure

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use super::output::{Output, OutputFormat};
use crate::convert::convert;
use crate::domain::{ComposeDocument, GraphError, OutputKind, OutputTarget, SecretExists, State};
use crate::storage::{self, Config, ConfigError, ConversionOptions, EmitError, SchemaError};

#[derive(Parser)]
#[command(name = "compose2ansible")]
#[command(author, version, about = "Translate Docker Compose files into Podman Ansible playbooks")]
pub struct Cli {
    /// Also connect services that depend on each other through a shared network
    #[arg(long, overrides_with = "no_depends_network")]
    pub depends_network: bool,

    /// Only connect linked services, even if the config file says otherwise
    #[arg(long, overrides_with = "depends_network")]
    pub no_depends_network: bool,

    /// Generate a playbook or a bare task list
    #[arg(long, value_enum)]
    pub kind: Option<OutputKind>,

    /// Deploy (present) or tear down (absent) the services
    #[arg(long, value_enum)]
    pub state: Option<State>,

    /// What to do with secrets that already exist
    #[arg(long, value_enum)]
    pub secret_exists: Option<SecretExists>,

    /// Host pattern of the generated play
    #[arg(long)]
    pub hosts: Option<String>,

    /// Target a user-level podman instead of the system service
    #[arg(long, overrides_with = "no_rootless")]
    pub rootless: bool,

    /// Target the system podman service, even if the config file says otherwise
    #[arg(long, overrides_with = "rootless")]
    pub no_rootless: bool,

    /// Configuration file
    #[arg(long, env = "COMPOSE2ANSIBLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Format of warnings and diagnostics
    #[arg(long, short = 'f', default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Compose file to convert (`-` reads standard input)
    pub input: PathBuf,

    /// Output file (defaults to standard output)
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Options given on the command line, unset ones left to the config file
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions {
            depends_network: flag(self.depends_network, self.no_depends_network),
            kind: self.kind,
            state: self.state,
            secret_exists: self.secret_exists,
            hosts: self.hosts.clone(),
            rootless: flag(self.rootless, self.no_rootless),
        }
    }
}

fn flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("compose2ansible starting");

    let config = Config::load(cli.config.as_deref())?;
    match &config.source {
        Some(path) => output.verbose_ctx("config", &format!("Loaded configuration from {}", path.display())),
        None => output.verbose_ctx("config", "No configuration file, using built-in defaults"),
    }

    let ctx = config.resolve(&cli.options(), &cli.input, cli.output.as_deref())?;
    output.verbose_ctx(
        "config",
        &format!(
            "kind={:?}, state={}, hosts={}, rootless={}, depends_network={}",
            ctx.kind,
            ctx.state.as_str(),
            ctx.hosts,
            ctx.rootless,
            ctx.depends_network
        ),
    );

    let doc = load(&cli.input)?;
    output.verbose_ctx(
        "load",
        &format!(
            "{} services, {} volumes, {} networks, {} secrets, {} configs",
            doc.services.len(),
            doc.volumes.len(),
            doc.networks.len(),
            doc.secrets.len(),
            doc.configs.len()
        ),
    );

    let conversion = convert(&doc, &ctx)?;
    output.verbose_ctx(
        "graph",
        &format!("Service creation order: {}", conversion.service_order.join(", ")),
    );
    output.verbose_ctx(
        "convert",
        &format!("Generated {} tasks", conversion.document.tasks().len()),
    );

    storage::emit(&conversion.document, &ctx.output)?;
    if let OutputTarget::File(path) = &ctx.output {
        output.verbose_ctx("emit", &format!("Wrote {}", path.display()));
    }

    for warning in &conversion.warnings {
        output.warning(warning);
    }

    output.verbose("Conversion completed successfully");
    Ok(())
}

fn load(input: &Path) -> Result<ComposeDocument> {
    if input == Path::new("-") {
        storage::load_reader(io::stdin().lock()).context("Failed to load compose document from stdin")
    } else {
        storage::load_path(input)
            .with_context(|| format!("Failed to load compose file {}", input.display()))
    }
}

/// Process exit code for an error returned by [`run`]
pub fn exit_code(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if cause.downcast_ref::<SchemaError>().is_some() {
            return 3;
        }
        if let Some(GraphError::Cycle(_)) = cause.downcast_ref::<GraphError>() {
            return 4;
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return 5;
        }
        if cause.downcast_ref::<EmitError>().is_some() {
            return 6;
        }
    }
    1
}
