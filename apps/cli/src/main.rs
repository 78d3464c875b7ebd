use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use eventquill_core_sdk::{
    chat,
    config::Settings,
    models::{ChatRequest, Message},
    providers, server, telemetry,
};

/**
 * \brief CLI entry: run the HTTP service or talk to a provider directly.
 */
#[derive(Parser, Debug)]
#[command(name = "eventquill", version, about = "EventQuill chat backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief Start the HTTP service.
     */
    Serve {
        #[arg(long, env = "EVENTQUILL_ADDR", default_value = "127.0.0.1:8000")]
        addr: String,
    },

    /**
     * \brief Send one prompt and print the normalized reply.
     * \param provider Provider tag; the configured default when omitted
     * \param system   Optional system instruction sent before the prompt
     */
    Chat {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        system: Option<String>,
    },

    /**
     * \brief List configured providers, or the models of one provider.
     */
    Models {
        #[arg(long)]
        provider: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init().context("init logging failed")?;
    let settings = Settings::from_env();

    match cli.command {
        Commands::Serve { addr } => {
            server::run(&addr, settings).await?;
        }
        Commands::Chat {
            prompt,
            provider,
            model,
            temperature,
            max_tokens,
            system,
        } => {
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(Message::new("system", system));
            }
            messages.push(Message::new("user", prompt));
            let request = ChatRequest {
                messages,
                model,
                temperature,
                max_tokens,
                provider,
            };

            let state = server::AppState::new(settings);
            let response = chat::complete_chat(&state.settings, &state.client, &request)
                .await
                .context("chat failed")?;
            tracing::info!(provider = %response.provider, "chat completed");
            println!("{}", response.response);
        }
        Commands::Models { provider } => match provider {
            Some(provider) => {
                let models = providers::get_supported_models_for_provider(&provider)
                    .context("list models failed")?;
                for model in models {
                    println!("{}", model);
                }
            }
            None => {
                for name in providers::get_supported_providers() {
                    let configured = settings.available_providers().contains(&name);
                    println!(
                        "{}{}",
                        name,
                        if configured { "" } else { " (no API key)" }
                    );
                }
            }
        },
    }

    Ok(())
}
