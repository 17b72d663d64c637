use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;
use unigen::application::{self, BuildOptions, DEFAULT_PLATFORM_VERSIONS};
use unigen::package::Generation;

/// unigen - universe repository generator
///
/// Render a package store into the repository artifacts every supported
/// platform version consumes: JSON repositories per generation, the legacy
/// zip shape for old platforms, content-type stamps and per-package files.
///
/// Examples:
///   unigen build --repository repo/packages --out-dir target/repo
///   unigen validate --generation v4 target/repo/repo-up-to-1.11.json
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate every repository artifact from a package store
    Build(BuildArgs),

    /// Validate a repository document against one generation's schema
    Validate(ValidateArgs),
}

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// Top-level package directory, e.g. repo/packages (also via UNIGEN_REPOSITORY)
    #[arg(long, env = "UNIGEN_REPOSITORY", value_name = "DIR")]
    pub repository: PathBuf,

    /// Directory that receives the generated artifacts (also via UNIGEN_OUT_DIR)
    #[arg(long = "out-dir", env = "UNIGEN_OUT_DIR", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Platform version to render for; repeatable, defaults to the full list
    #[arg(long = "platform-version", value_name = "VERSION")]
    pub platform_versions: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Repository generation to validate against (v2, v3, v4 or v5)
    #[arg(long, value_name = "GENERATION")]
    pub generation: String,

    /// Repository JSON document
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => {
            let platform_versions = if args.platform_versions.is_empty() {
                DEFAULT_PLATFORM_VERSIONS
                    .iter()
                    .map(|v| v.to_string())
                    .collect()
            } else {
                args.platform_versions
            };
            application::build(&BuildOptions {
                repository: args.repository,
                outdir: args.out_dir,
                platform_versions,
            })
        }
        Commands::Validate(args) => {
            let Some(generation) = Generation::from_tag(&args.generation) else {
                bail!("unknown generation {:?}; expected v2, v3, v4 or v5", args.generation);
            };
            let errors = application::validate_file(&args.file, generation)?;
            if errors.is_empty() {
                println!("{} is a valid {} repository", args.file.display(), generation);
                Ok(())
            } else {
                for error in &errors {
                    eprintln!("{error}");
                }
                bail!(
                    "{} violates the {} schema ({} error(s))",
                    args.file.display(),
                    generation,
                    errors.len()
                );
            }
        }
    }
}
