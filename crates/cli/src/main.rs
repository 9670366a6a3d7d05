use anyhow::Result;
use clap::{CommandFactory, Parser};
use color_eyre::config::HookBuilder;
use tracing_subscriber::EnvFilter;

mod handlers;
mod wizard;

/// skiff - CLI for S3-compatible object storage
#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(version = "0.1.0")]
#[command(
    about = "Managed transfers, presigned URLs and POST policies for S3-compatible storage",
    long_about = None
)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Initial configuration (interactive wizard)
    Init,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Object operations
    Objects {
        #[command(subcommand)]
        action: ObjectAction,
    },

    /// Presigned URL generation
    Urls {
        #[command(subcommand)]
        action: UrlAction,
    },

    /// Presigned POST policy generation
    Post {
        #[command(subcommand)]
        action: PostAction,
    },

    /// Bucket operations
    Buckets {
        #[command(subcommand)]
        action: BucketAction,
    },

    /// Shell completion
    Completion {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: String,
    },

    /// Diagnostics and connectivity checks
    Doctor {
        #[command(subcommand)]
        action: DoctorAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Edit the configuration in $EDITOR
    Edit,
    /// Validate configuration and test credentials
    Validate,
}

#[derive(clap::Subcommand, Debug)]
enum ObjectAction {
    /// Upload a file (multipart above the configured threshold)
    Upload {
        /// Local file to upload
        file: String,
        /// Destination object key
        key: String,
        /// Target bucket (defaults to the configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,
        /// Show a progress bar
        #[arg(short, long)]
        progress: bool,
    },
    /// Download an object
    Download {
        /// Object key
        key: String,
        /// Local destination path
        dest: String,
        /// Source bucket (defaults to the configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,
        /// Show a progress bar
        #[arg(short, long)]
        progress: bool,
    },
    /// Delete an object
    Rm {
        /// Object key
        key: String,
        /// Target bucket (defaults to the configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,
    },
    /// List objects
    Ls {
        /// Key prefix filter
        prefix: Option<String>,
        /// Target bucket (defaults to the configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,
    },
    /// Show object metadata
    Stat {
        /// Object key
        key: String,
        /// Target bucket (defaults to the configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum UrlAction {
    /// Generate a presigned URL for an object operation
    Sign {
        /// Object key
        key: String,
        /// Client method (get, put, delete, head)
        #[arg(short, long, default_value = "get")]
        method: String,
        /// Expiration in seconds (defaults to the configured expiration)
        #[arg(short, long)]
        expires: Option<u64>,
        /// Content type the uploader must send (put only)
        #[arg(long)]
        content_type: Option<String>,
        /// Target bucket (defaults to the configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

#[derive(clap::Subcommand, Debug)]
enum PostAction {
    /// Generate a presigned POST policy for a browser-form upload
    Generate {
        /// Object key (or key prefix with --starts-with)
        key: String,
        /// Treat KEY as a prefix the uploader may extend
        #[arg(long)]
        starts_with: bool,
        /// Expiration in seconds (defaults to the configured expiration)
        #[arg(short, long)]
        expires: Option<u64>,
        /// Required Content-Type form field
        #[arg(long)]
        content_type: Option<String>,
        /// Minimum payload size in bytes
        #[arg(long)]
        min_size: Option<u64>,
        /// Maximum payload size in bytes
        #[arg(long)]
        max_size: Option<u64>,
        /// Target bucket (defaults to the configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

#[derive(clap::Subcommand, Debug)]
enum BucketAction {
    /// List buckets visible to the credentials
    List,
}

#[derive(clap::Subcommand, Debug)]
enum DoctorAction {
    /// Check the installation and configuration
    Check,
    /// Test connectivity against the storage endpoint
    TestConnection,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup error handling
    if let Err(e) = HookBuilder::default().install() {
        eprintln!("Warning: Failed to install error handler: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    match cli.command {
        Commands::Init => handlers::handle_init().await,
        Commands::Config { action } => {
            let action_str = match action {
                ConfigAction::Show => "show",
                ConfigAction::Edit => "edit",
                ConfigAction::Validate => "validate",
            };
            handlers::handle_config(action_str).await
        }
        Commands::Objects { action } => match action {
            ObjectAction::Upload {
                file,
                key,
                bucket,
                progress,
            } => handlers::handle_upload(&file, &key, bucket.as_deref(), progress).await,
            ObjectAction::Download {
                key,
                dest,
                bucket,
                progress,
            } => handlers::handle_download(&key, &dest, bucket.as_deref(), progress).await,
            ObjectAction::Rm { key, bucket } => {
                handlers::handle_delete(&key, bucket.as_deref()).await
            }
            ObjectAction::Ls { prefix, bucket } => {
                handlers::handle_list(prefix.as_deref(), bucket.as_deref()).await
            }
            ObjectAction::Stat { key, bucket } => {
                handlers::handle_stat(&key, bucket.as_deref()).await
            }
        },
        Commands::Urls { action } => match action {
            UrlAction::Sign {
                key,
                method,
                expires,
                content_type,
                bucket,
                output,
            } => {
                handlers::handle_sign_url(
                    &key,
                    &method,
                    expires,
                    content_type.as_deref(),
                    bucket.as_deref(),
                    &output,
                )
                .await
            }
        },
        Commands::Post { action } => match action {
            PostAction::Generate {
                key,
                starts_with,
                expires,
                content_type,
                min_size,
                max_size,
                bucket,
                output,
            } => {
                handlers::handle_post_policy(handlers::PostPolicyArgs {
                    key,
                    starts_with,
                    expires,
                    content_type,
                    min_size,
                    max_size,
                    bucket,
                    output,
                })
                .await
            }
        },
        Commands::Buckets { action } => match action {
            BucketAction::List => handlers::handle_buckets_list().await,
        },
        Commands::Completion { shell } => {
            handlers::handle_completion(&shell, &mut Cli::command()).await
        }
        Commands::Doctor { action } => {
            let action_str = match action {
                DoctorAction::Check => "check",
                DoctorAction::TestConnection => "test-connection",
            };
            handlers::handle_doctor(action_str).await
        }
    }
}
