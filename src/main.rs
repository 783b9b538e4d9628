use clap::{Parser, Subcommand};
use serde::Serialize;
use sitefix::extract::ExtractRun;
use sitefix::patch::DocumentReport;
use sitefix::{config, extract, output, patch};
use std::path::{Path, PathBuf};

/// Overrides for the extraction paths in `sitefix.toml`.
#[derive(clap::Args, Clone)]
struct ExtractArgs {
    /// HTML document holding the embedded images, relative to --root
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory to write extracted images to, relative to --root
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Documents to patch, overriding `patch.documents`.
#[derive(clap::Args, Clone)]
struct DocumentArgs {
    /// Documents relative to --root (default: patch.documents from config)
    documents: Vec<String>,
}

#[derive(Parser)]
#[command(name = "sitefix")]
#[command(about = "Extract inline base64 images from HTML and patch the pages that used them")]
#[command(long_about = "\
Extract inline base64 images from HTML and patch the pages that used them

Extraction scans one document for data:image/<tag>;base64,... references and
writes each decoded image under the next name from the [[images]] list in
sitefix.toml (or, with extract.assign = \"alt\", the entry whose alt text
matches the image's <img> tag).

Patching rewrites documents in place. Rules run in order:

  1. image tags          inline <img src> with a known alt → /images/<file>
  2. background fallback CSS url(data:image/...) → patch.background_fallback
  3. script text         exact swap of patch.script.find
  4. nav link            exact swap of patch.nav_link.find
  5. og:image / twitter:image inserted after og:site_name / twitter:card
  6. favicon             icon links inserted before </head>
  7. structured data     sameAs added after a LocalBusiness knowsLanguage array

Each rule reports whether it applied, and why not if it did not. No backup is
kept; use 'sitefix check' to see the outcome first.

Run 'sitefix gen-config' to generate a documented sitefix.toml.")]
#[command(version)]
struct Cli {
    /// Working root: config lookup and relative paths start here
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file to use instead of <root>/sitefix.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write the run report as JSON to this file
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode embedded images to files
    Extract(ExtractArgs),
    /// Apply the rewrite rules to documents in place
    Patch(DocumentArgs),
    /// Show what patch would do without writing
    Check(DocumentArgs),
    /// Extract, then patch the configured documents
    Run,
    /// Print a stock sitefix.toml with all options documented
    GenConfig,
}

/// JSON form of a run, written by `--report`.
#[derive(Serialize, Default)]
struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    extract: Option<ExtractRun>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    documents: Vec<DocumentReport>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut run_report = RunReport::default();

    match &cli.command {
        Command::Extract(args) => {
            let config = load_config(&cli)?;
            let run = run_extract(&cli.root, &config, args)?;
            run_report.extract = Some(run);
        }
        Command::Patch(args) => {
            let config = load_config(&cli)?;
            run_report.documents = run_patch(&cli.root, &config, &args.documents, true)?;
        }
        Command::Check(args) => {
            let config = load_config(&cli)?;
            run_report.documents = run_patch(&cli.root, &config, &args.documents, false)?;
        }
        Command::Run => {
            let config = load_config(&cli)?;
            println!("==> Stage 1: Extracting images");
            let no_overrides = ExtractArgs {
                input: None,
                output: None,
            };
            run_report.extract = Some(run_extract(&cli.root, &config, &no_overrides)?);
            println!();
            println!("==> Stage 2: Patching documents");
            run_report.documents = run_patch(&cli.root, &config, &[], true)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
    }

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&run_report)?;
        std::fs::write(path, json)?;
    }

    Ok(())
}

/// Load `--config` if given, otherwise `<root>/sitefix.toml` over stock defaults.
fn load_config(cli: &Cli) -> Result<config::SiteFixConfig, config::ConfigError> {
    match &cli.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(&cli.root),
    }
}

fn run_extract(
    root: &Path,
    config: &config::SiteFixConfig,
    args: &ExtractArgs,
) -> Result<ExtractRun, extract::ExtractError> {
    let input = under_root(root, args.input.as_deref(), &config.extract.input);
    let output_dir = under_root(root, args.output.as_deref(), &config.extract.output_dir);
    let run = extract::extract_file(&input, &output_dir, config)?;
    output::print_extract_run(&run, root);
    Ok(run)
}

/// `given` if set, otherwise `default`, joined to `root`. Absolute paths
/// are kept as they are.
fn under_root(root: &Path, given: Option<&Path>, default: &str) -> PathBuf {
    match given {
        Some(path) => root.join(path),
        None => root.join(default),
    }
}

fn run_patch(
    root: &Path,
    config: &config::SiteFixConfig,
    documents: &[String],
    write: bool,
) -> Result<Vec<DocumentReport>, patch::PatchError> {
    let documents = if documents.is_empty() {
        &config.patch.documents[..]
    } else {
        documents
    };
    let reports = patch::patch_documents(root, documents, config, write)?;
    output::print_patch_reports(&reports, root);
    Ok(reports)
}
