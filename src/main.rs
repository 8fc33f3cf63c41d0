use std::fs::File;
use std::sync::Arc;

use poise::{serenity_prelude as serenity, CreateReply};
use tracing::{error, info, info_span, level_filters::LevelFilter};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use frolfbot::bus::router::Router;
use frolfbot::bus::{EventBus, InMemoryBus};
use frolfbot::commands::{AdminCommands, CommandsContainer, RoundCommands};
use frolfbot::config::StaticGuildConfigs;
use frolfbot::dispatch::{register_handlers, Capabilities};
use frolfbot::gateway::adapter::event_handler;
use frolfbot::gateway::discord::DiscordGateway;
use frolfbot::{BotError, Data};

#[tokio::main]
async fn main() {
    if let Err(e) = setup_tracing() {
        panic!("Error trying to setup tracing: {}", e);
    }

    if let Err(e) = run().await {
        panic!("Error trying to run the bot: {}", e);
    }
}

/// The main function that runs the bot.
async fn run() -> Result<(), BotError> {
    let setup_span = info_span!("bot_setup");
    let _guard = setup_span.enter();
    // Load the .env file only in the development environment (bypassed with the --release flag)
    #[cfg(debug_assertions)]
    dotenv::dotenv().ok();

    let discord_token =
        std::env::var("DISCORD_TOKEN").expect("Expected DISCORD_TOKEN as an environment variable");
    info!("Successfully loaded Discord Token");

    let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
    let config_path =
        std::env::var("GUILD_CONFIG_PATH").unwrap_or_else(|_| "guilds.json".to_string());
    let guild_configs = Arc::new(StaticGuildConfigs::load(&config_path)?);

    // The in-memory bus is the in-process default; a deployment binds the
    // router's queue group to its real transport instead.
    let bus = Arc::new(InMemoryBus::new()) as Arc<dyn EventBus>;

    let commands: Vec<_> = vec![RoundCommands::get_all(), AdminCommands::get_all()]
        .into_iter()
        .flatten()
        .collect();
    commands.iter().for_each(|c| println!("Command: {}", c.name));

    // GUILD_MEMBERS is privileged but needed for member-update events.
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match &error {
                        poise::FrameworkError::GuildOnly { .. }
                        | poise::FrameworkError::UnknownCommand { .. } => return,
                        _ => error!("Error in command: {}", error),
                    }
                    let Some(ctx) = error.ctx() else {
                        return;
                    };
                    if let Err(e) = ctx
                        .send(
                            CreateReply::default()
                                .content("Something went wrong. Please let the bot maintainers know if the issue persists.")
                                .ephemeral(true),
                        )
                        .await
                    {
                        error!("Error sending generic error message to user: {}", e);
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                println!("Ready as {}", ready.user.name);

                let data = Data::new(
                    bus,
                    Arc::new(DiscordGateway::new(ctx.http.clone())),
                    guild_configs,
                );

                let mut router = Router::new(environment, data.bus.clone(), data.metrics.clone());
                register_handlers(&mut router, Capabilities::from_data(&data));
                info!(
                    queue_group = %router.queue_group(),
                    topics = router.subscribed_topics().len(),
                    "inbound routing ready"
                );
                // Transport binding point: a deployment subscribes the
                // queue group's topics and feeds every delivery into
                // `router.dispatch`. The router lives until shutdown.
                tokio::spawn(async move {
                    let router = router;
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!(
                            queue_group = %router.queue_group(),
                            "shutting down inbound routing"
                        );
                    }
                });

                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(discord_token, intents)
        .framework(framework)
        .await?;

    client.start().await?;

    Ok(())
}

/// Sets up the tracing subscriber for the bot.
fn setup_tracing() -> Result<(), BotError> {
    if cfg!(debug_assertions) {
        let filter = EnvFilter::from_default_env()
            .add_directive("none".parse()?)
            .add_directive("frolfbot=info".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::NONE)
            .pretty()
            .init();

        return Ok(());
    }

    let log_file = File::create("debug.log")?;

    // Only errors get logged in production
    tracing_subscriber::fmt::fmt()
        .with_span_events(FmtSpan::NONE)
        .with_max_level(LevelFilter::ERROR)
        .with_writer(log_file)
        .pretty()
        .init();

    Ok(())
}
