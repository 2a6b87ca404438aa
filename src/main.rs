use ai_tutor::client::ChatClient;
use ai_tutor::commands::{chat, profile, settings};
use ai_tutor::config::{Config, Overrides};
use ai_tutor::db::Database;
use ai_tutor::profile::RegistrationForm;
use ai_tutor::{logging, start_server, AppState};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "ai-tutor")]
#[command(about = "AI tutor that adapts answers to a learner's age and learning style")]
#[command(version)]
struct Cli {
    /// Directory holding the settings database
    #[arg(long, env = "AI_TUTOR_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    providers: ProviderArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProviderArgs {
    #[arg(long, env = "OPENAI_API_KEY", global = true, hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    openai_base_url: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", global = true, hide_env_values = true)]
    claude_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_BASE_URL", global = true)]
    claude_base_url: Option<String>,

    #[arg(long, env = "OLLAMA_HOST", global = true)]
    ollama_host: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat endpoint
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "AI_TUTOR_BIND", default_value = "127.0.0.1:3000")]
        bind: String,

        /// Model as provider/name, e.g. openai/gpt-4o, claude/..., ollama/llama3
        #[arg(short, long, env = "AI_TUTOR_MODEL")]
        model: Option<String>,

        /// Image model for visual learners
        #[arg(long, env = "AI_TUTOR_IMAGE_MODEL")]
        image_model: Option<String>,
    },
    /// Create or replace the learner profile
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        age: String,

        /// visual, auditory, kinesthetic or reading
        #[arg(short, long)]
        style: String,
    },
    /// Take the learning-style quiz
    Quiz,
    /// Chat with the tutor
    Chat {
        /// Base URL of a running `ai-tutor serve`
        #[arg(long, env = "AI_TUTOR_SERVER_URL")]
        server: Option<String>,
    },
    /// Read or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show one setting, or all of them
    Get { key: Option<String> },
    Set { key: String, value: String },
    Delete { key: String },
}

impl ProviderArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            openai_api_key: self.openai_api_key,
            openai_base_url: self.openai_base_url,
            claude_api_key: self.claude_api_key,
            claude_base_url: self.claude_base_url,
            ollama_host: self.ollama_host,
            ..Default::default()
        }
    }
}

fn open_database(data_dir: Option<PathBuf>) -> Result<Database> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("Cannot determine a data directory; pass --data-dir")?
            .join("ai-tutor"),
    };
    Database::new(&dir).with_context(|| format!("Failed to open database in {}", dir.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let db = open_database(cli.data_dir)?;
    let mut overrides = cli.providers.into_overrides();

    match cli.command {
        Commands::Serve {
            bind,
            model,
            image_model,
        } => {
            overrides.model = model;
            overrides.image_model = image_model;
            let encoder = Config::new(&overrides, &db).build_encoder()?;
            let listener = TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind {}", bind))?;
            start_server(listener, AppState { encoder }).await
        }
        Commands::Register { name, age, style } => {
            let form = RegistrationForm {
                name,
                age,
                learning_style: style,
            };
            let learner = profile::register(&db, &form)?;
            println!("{}", chat::welcome_card(&learner));
            Ok(())
        }
        Commands::Quiz => {
            let stdin = std::io::stdin();
            profile::run_quiz(&db, stdin.lock(), std::io::stdout())?;
            Ok(())
        }
        Commands::Chat { server } => {
            overrides.server_url = server;
            let learner = chat::open_dashboard(&db)?;
            let server_url = Config::new(&overrides, &db).server_url()?;
            let mut client = ChatClient::new(&server_url, learner);
            let stdin = std::io::stdin();
            chat::run_chat(&mut client, stdin.lock(), &mut std::io::stdout()).await?;
            Ok(())
        }
        Commands::Settings { action } => match action {
            SettingsAction::Get { key: Some(key) } => {
                match settings::get_setting(&db, &key)? {
                    Some(value) => println!("{}", value),
                    None => println!("{} is not set", key),
                }
                Ok(())
            }
            SettingsAction::Get { key: None } => {
                for (key, value) in settings::get_settings(&db)? {
                    println!("{} = {}", key, value);
                }
                Ok(())
            }
            SettingsAction::Set { key, value } => settings::set_setting(&db, &key, &value),
            SettingsAction::Delete { key } => {
                if !settings::delete_setting(&db, &key)? {
                    println!("{} was not set", key);
                }
                Ok(())
            }
        },
    }
}
