//! toto-verify CLI
//!
//! Entry point for the `toto-verify` command-line tool.

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process;
use toto_verify::config::{host_config_path, EffectiveConfig, PROJECT_CONFIG_PATH};
use toto_verify::logging::init_logging;
use toto_verify::{
    Envelope, Key, LayoutVerifier, LinkStore, ProcessRunner, VerificationReport, VerifyError,
};

#[derive(Parser)]
#[command(name = "toto-verify")]
#[command(about = "Verify a software supply chain against its signed layout", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a layout and its links
    Verify {
        /// Signed layout file
        #[arg(long, short = 'l')]
        layout: Option<PathBuf>,

        /// Public key the layout must be signed with (repeatable)
        #[arg(long = "layout-key", short = 'k')]
        layout_keys: Vec<PathBuf>,

        /// Directory containing link files (default: current directory)
        #[arg(long, short = 'd')]
        link_dir: Option<PathBuf>,

        /// Layout parameter as NAME=VALUE (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Inspection timeout in seconds
        #[arg(long)]
        inspection_timeout: Option<u64>,

        /// Project config file (default: .toto/verify.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Increase log verbosity (-v info, -vv debug, -vvv trace)
        #[arg(long, short = 'v', action = clap::ArgAction::Count)]
        verbose: u8,
    },

    /// Print the keyid of a public key file
    Keyid {
        /// PEM or JSON public key
        file: PathBuf,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

struct VerifyArgs {
    layout: Option<PathBuf>,
    layout_keys: Vec<PathBuf>,
    link_dir: Option<PathBuf>,
    params: Vec<(String, String)>,
    inspection_timeout: Option<u64>,
    config: Option<PathBuf>,
    json: bool,
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Verify {
            layout,
            layout_keys,
            link_dir,
            params,
            inspection_timeout,
            config,
            json,
            verbose,
        } => run_verify(VerifyArgs {
            layout,
            layout_keys,
            link_dir,
            params,
            inspection_timeout,
            config,
            json,
            verbose,
        }),
        Commands::Keyid { file } => run_keyid(&file),
    }
}

fn fail(class: &str, message: impl std::fmt::Display) -> ! {
    eprintln!("(toto-verify) {}: {}", class, message);
    process::exit(1);
}

/// Flags given on the command line, as a config layer
fn cli_overrides(args: &VerifyArgs) -> Value {
    let mut overrides = Map::new();
    if let Some(layout) = &args.layout {
        overrides.insert("layout".to_string(), json!(layout));
    }
    if !args.layout_keys.is_empty() {
        overrides.insert("layout_keys".to_string(), json!(args.layout_keys));
    }
    if let Some(link_dir) = &args.link_dir {
        overrides.insert("link_dir".to_string(), json!(link_dir));
    }
    if !args.params.is_empty() {
        let params: Map<String, Value> = args
            .params
            .iter()
            .map(|(name, value)| (name.clone(), json!(value)))
            .collect();
        overrides.insert("parameters".to_string(), Value::Object(params));
    }
    if let Some(timeout) = args.inspection_timeout {
        overrides.insert("inspection".to_string(), json!({ "timeout_seconds": timeout }));
    }
    Value::Object(overrides)
}

fn run_verify(args: VerifyArgs) {
    let host = host_config_path();
    let project = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_PATH));

    let effective = match EffectiveConfig::build(
        host.as_deref(),
        Some(project.as_path()),
        Some(cli_overrides(&args)),
    ) {
        Ok(effective) => effective,
        Err(e) => fail("ConfigError", e),
    };
    let config = effective.config;

    if let Err(e) = init_logging(&config.log, args.verbose) {
        eprintln!("(toto-verify) warning: {}", e);
    }

    let Some(layout_path) = config.layout.clone() else {
        fail("ConfigError", "no layout given (--layout or 'layout' in config)");
    };

    let verifier = LayoutVerifier::with_runner(
        config.verify_options(),
        ProcessRunner::new(config.termination_grace()),
    );
    let result = load_and_verify(
        &verifier,
        &layout_path,
        &config.layout_keys,
        &config.link_dir(),
    );

    match result {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("(toto-verify) {}: {}", warning.class(), warning);
            }
            if args.json {
                match report.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => fail("SerializationError", e),
                }
            } else {
                println!("The software product passed all verification.");
                println!("{}", report.human_summary());
            }
        }
        Err(e) => fail(e.class(), e),
    }
}

fn load_and_verify(
    verifier: &LayoutVerifier,
    layout_path: &Path,
    layout_key_paths: &[PathBuf],
    link_dir: &Path,
) -> Result<VerificationReport, VerifyError> {
    let layout = Envelope::from_file(layout_path)?;
    let layout_keys = layout_key_paths
        .iter()
        .map(|path| Key::from_file(path))
        .collect::<Result<Vec<_>, _>>()?;
    let links = LinkStore::from_dir(link_dir)?;

    verifier.verify(&layout, &layout_keys, &links)
}

fn run_keyid(path: &Path) {
    match Key::from_file(path) {
        Ok(key) => println!("{}", key.keyid),
        Err(e) => {
            let err = VerifyError::from(e);
            fail(err.class(), format!("{}: {}", path.display(), err))
        }
    }
}
