mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use fusionbrain_core::{JobId, PipelineId, PipelineType};
use fusionbrain_observability::LogFormat;

#[derive(Parser)]
#[command(
    name = "fusionbrain",
    version,
    about = "Submit and track FusionBrain generation jobs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Log output format (json, text)
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// API base URL; overrides FUSIONBRAIN_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Copy, Clone, ValueEnum)]
enum TypeArg {
    Text2image,
}

impl From<TypeArg> for PipelineType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Text2image => PipelineType::Text2Image,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List pipelines
    Pipelines {
        /// Only list pipelines of this type
        #[arg(long = "type", value_enum)]
        pipeline_type: Option<TypeArg>,
    },
    /// Show whether a pipeline accepts work
    Availability {
        pipeline: PipelineId,
    },
    /// Submit a text-to-image run
    Generate {
        #[arg(long)]
        pipeline: PipelineId,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 1024)]
        height: u32,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        negative_prompt: Option<String>,
        /// Attach a file to the run (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Print the submission and exit without waiting
        #[arg(long)]
        no_wait: bool,
    },
    /// Query a job once
    Status {
        job: JobId,
    },
    /// Poll a job until it finishes
    Wait {
        job: JobId,
        /// Seconds to wait before the first query
        #[arg(long, default_value_t = 0)]
        initial_delay: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    fusionbrain_observability::init_with(&cli.log_level, cli.log_format);

    let client = commands::connect(cli.base_url)?;

    match cli.command {
        Commands::Pipelines { pipeline_type } => {
            commands::pipelines(&client, pipeline_type.map(Into::into)).await
        }
        Commands::Availability { pipeline } => commands::availability(&client, pipeline).await,
        Commands::Generate {
            pipeline,
            prompt,
            width,
            height,
            style,
            negative_prompt,
            files,
            no_wait,
        } => {
            let request = commands::GenerateRequest {
                pipeline,
                prompt,
                width,
                height,
                style,
                negative_prompt,
                files,
                wait: !no_wait,
            };
            commands::generate(&client, request).await
        }
        Commands::Status { job } => commands::status(&client, job).await,
        Commands::Wait { job, initial_delay } => {
            commands::wait(&client, job, initial_delay).await
        }
    }
}
