use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aws_config::SdkConfig;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use static_basic::config::{DEFAULT_FUNCTION_ASSET, DEFAULT_STACK_NAME};
use static_basic::lookup::DEFAULT_CONTEXT_FILE;
use static_basic::{deploy, provider};
use static_basic::{required_lookups, ContextCache, Result, StackConfig, StaticWebsite, Variables};

#[derive(Parser, Debug)]
#[command(name = "static_basic", version, about = "Static website on S3 + CloudFront + Route 53")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// dotenv file read after the process environment
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// file holding cached lookup results
    #[arg(long, global = true, default_value = DEFAULT_CONTEXT_FILE)]
    context: PathBuf,

    #[arg(long, global = true, default_value = DEFAULT_STACK_NAME)]
    stack_name: String,

    /// source of the viewer-request CloudFront Function
    #[arg(long, global = true, default_value = DEFAULT_FUNCTION_ASSET)]
    asset: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the CloudFormation template
    Synth {
        #[arg(long, default_value = "static_basic.out")]
        out_dir: PathBuf,

        /// fail instead of asking Route 53 for lookups missing from the context
        #[arg(long)]
        no_lookups: bool,
    },
    /// Synthesize, then create or update the stack
    Deploy {
        #[arg(long, default_value = "static_basic.out")]
        out_dir: PathBuf,
    },
    /// Delete the stack
    Destroy,
    /// List cached lookups
    Context {
        /// remove every cached lookup
        #[arg(long)]
        clear: bool,
    },
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose { "static_basic=debug" } else { "static_basic=info" };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| env_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(global: &GlobalArgs) -> Result<StackConfig> {
    let vars = Variables::load(&global.env_file)?;
    let mut config = StackConfig::from_variables(&vars);
    config.stack_name = global.stack_name.clone();
    config.function_asset = global.asset.clone();
    config.validate()?;
    Ok(config)
}

/// Loads the SDK config for `config` and checks the credentials act on the
/// configured account.
async fn aws_session(config: &StackConfig) -> Result<SdkConfig> {
    let sdk_config = deploy::load_sdk_config(&config.env.region).await;
    deploy::verify_account(&sdk_config, &config.env.account).await?;
    Ok(sdk_config)
}

/// Without `sdk_config` only cached lookups are used.
async fn synth(global: &GlobalArgs, config: &StackConfig, out_dir: &Path, sdk_config: Option<&SdkConfig>) -> Result<PathBuf> {
    let mut context = ContextCache::load(&global.context)?;
    if let Some(sdk_config) = sdk_config {
        let client = aws_sdk_route53::Client::new(sdk_config);
        let added = provider::fill_context(&client, &mut context, &config.env, &required_lookups(config)).await?;
        if added > 0 {
            context.save(&global.context)?;
            info!(path = ?global.context, added, "saved lookup context");
        }
    }
    let website = StaticWebsite::new(config, &context)?;
    website.stack.synth(out_dir)
}

async fn run(cli: Cli) -> Result<()> {
    let global = &cli.global;
    match &cli.command {
        Command::Synth { out_dir, no_lookups } => {
            let config = load_config(global)?;
            let sdk_config = if *no_lookups { None } else { Some(aws_session(&config).await?) };
            let path = synth(global, &config, out_dir, sdk_config.as_ref()).await?;
            println!("{}", path.display());
        }
        Command::Deploy { out_dir } => {
            let config = load_config(global)?;
            let sdk_config = aws_session(&config).await?;
            let path = synth(global, &config, out_dir, Some(&sdk_config)).await?;
            let body = std::fs::read_to_string(&path).map_err(|source| static_basic::Error::Io {
                path: path.clone(),
                source,
            })?;
            let client = aws_sdk_cloudformation::Client::new(&sdk_config);
            let outputs = deploy::deploy(&client, &config.stack_name, &body).await?;
            for (key, value) in outputs {
                println!("{}.{key} = {value}", config.stack_name);
            }
        }
        Command::Destroy => {
            let vars = Variables::load(&global.env_file)?;
            let config = StackConfig::from_variables(&vars);
            let sdk_config = aws_session(&config).await?;
            let client = aws_sdk_cloudformation::Client::new(&sdk_config);
            deploy::destroy(&client, &global.stack_name).await?;
        }
        Command::Context { clear } => {
            let mut context = ContextCache::load(&global.context)?;
            if *clear {
                let removed = context.len();
                context.clear();
                context.save(&global.context)?;
                info!(removed, "cleared lookup context");
            } else if context.is_empty() {
                println!("no cached lookups in {}", global.context.display());
            } else {
                for (key, value) in context.entries() {
                    println!("{key} = {value}");
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
