use std::env;

use chrono::Utc;
use dutywatch::duty::DutyService;
use dutywatch::{Data, Error, commands, handlers, logging};
use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use tracing::info;

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    // Load environment variables
    let token = env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN must be set");

    // Load config and the persisted duty store
    let data = Data::load(".").await;
    logging::log_console(format!(
        "Loaded {} duty types from config",
        data.catalog().len()
    ));
    if data.webhook_url().is_empty() {
        logging::log_console("No webhook configured; duty notifications disabled".to_string());
    }

    // Configure the Poise framework
    let setup_data = data.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::duty(),
                commands::checktime(),
                commands::dutytimes(),
                commands::resettime(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    // Log the start of command execution
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    // Log the end of command execution
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    // Log the error using our logging system
                    dutywatch::logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                // Register the bot's data
                Ok(setup_data)
            })
        })
        .build();

    // Configure the Serenity client
    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(handlers::Handler)
        .framework(framework)
        .await
        .expect("Failed to create client");

    let shard_manager = client.shard_manager.clone();

    info!("Starting bot...");
    tokio::select! {
        result = client.start() => {
            if let Err(err) = result {
                eprintln!("Error starting the bot: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            logging::log_console("Shutdown signal received".to_string());
            shard_manager.shutdown_all().await;
        }
    }

    // No more commands can arrive; end every open session and persist
    let drained = DutyService::drain_at_shutdown(&data, Utc::now()).await;
    logging::log_console(format!("Flushed {drained} active duty session(s) at shutdown"));

    Ok(())
}

fn main() {
    // Run the async main function
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async_main());

    // Handle any errors that occurred during execution
    if let Err(err) = result {
        eprintln!("Error: {err}");
    }
}
