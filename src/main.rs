use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Parser, Subcommand};
use cloudsight::services::classifier::describe_metrics;
use cloudsight::{AppConfig, ClassificationClient, Job, RequestOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify images with the CloudSight API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit an image and print the new job
    Submit(SubmitArgs),

    /// Check the status of a job once
    Poll { token: String },

    /// Poll a job until it finishes or the timeout passes
    Wait {
        token: String,

        /// Seconds to wait (defaults to CLOUDSIGHT_POLL_TIMEOUT_SECS)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Restart a job that ended in `timeout`
    Repost { token: String },
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "url"])))]
struct SubmitArgs {
    /// Local image to upload
    #[arg(long)]
    file: Option<PathBuf>,

    /// Remote image for CloudSight to fetch
    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    locale: Option<String>,

    #[arg(long)]
    language: Option<String>,

    /// Processing TTL in seconds
    #[arg(long)]
    ttl: Option<u32>,

    /// Wait for the result after submitting
    #[arg(long)]
    wait: bool,

    /// Seconds to wait with --wait
    #[arg(long)]
    timeout: Option<u64>,
}

impl SubmitArgs {
    fn options(&self) -> RequestOptions {
        let mut options = RequestOptions::new();
        if let Some(locale) = &self.locale {
            options = options.locale(locale);
        }
        if let Some(language) = &self.language {
            options = options.language(language);
        }
        if let Some(ttl) = self.ttl {
            options = options.ttl(ttl);
        }
        options
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr, stdout carries the job JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    describe_metrics();

    let client = ClassificationClient::new(config.client_config()?, config.authorizer())?;

    match cli.command {
        Command::Submit(args) => {
            let options = args.options();
            let job = match (&args.file, &args.url) {
                (Some(path), _) => {
                    let content = tokio::fs::read(path).await?;
                    let filename = path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .unwrap_or("image");
                    client.submit_by_content(content, filename, &options).await?
                }
                (None, Some(url)) => client.submit_by_url(url, &options).await?,
                (None, None) => return Err("either --file or --url is required".into()),
            };

            let job = if args.wait {
                let timeout = wait_timeout(&client, args.timeout);
                client.wait(&job.token, timeout).await?
            } else {
                job
            };
            print_job(&job)?;
        }
        Command::Poll { token } => {
            let job = client.poll(&token).await?;
            print_job(&job)?;
        }
        Command::Wait { token, timeout } => {
            let job = client.wait(&token, wait_timeout(&client, timeout)).await?;
            print_job(&job)?;
        }
        Command::Repost { token } => {
            client.repost(&token).await?;
            tracing::info!(token = %token, "Repost accepted");
        }
    }

    Ok(())
}

fn wait_timeout(client: &ClassificationClient, secs: Option<u64>) -> Duration {
    secs.map(Duration::from_secs)
        .unwrap_or(client.config().schedule.timeout)
}

fn print_job(job: &Job) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(job)?);
    Ok(())
}
