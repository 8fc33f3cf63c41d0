use std::sync::Arc;

use crate::bus::EventBus;
use crate::cache::InteractionCache;
use crate::config::GuildConfigResolver;
use crate::gateway::ChatGateway;
use crate::metrics::Metrics;
use crate::ratelimit::RateLimiter;

/// Message-bus plumbing: the bus trait, the typed metadata carrier and the
/// topic router with its middleware stack.
pub mod bus;
/// Short-lived cache correlating backend replies with the interaction that
/// caused them.
pub mod cache;
/// Slash commands exposed to Discord.
pub mod commands;
/// Per-guild configuration and the resolver seam.
pub mod config;
/// Handlers for events arriving from the backend.
pub mod dispatch;
/// Round embeds: rendering, parsing, delta application and tag propagation.
pub mod embed;
/// Error kinds shared across the crate.
pub mod errors;
/// Topic names and the payload shapes travelling over the bus.
pub mod events;
/// The chat-platform seam and the Discord interaction adapter.
pub mod gateway;
/// Process-local counters.
pub mod metrics;
/// The operation wrapper every side-effectful unit of work runs under.
pub mod operation;
/// Per-guild sliding-window admission control for scorecard uploads.
pub mod ratelimit;

#[cfg(test)]
pub mod testutil;

/// A thread-safe Error type used by the bot.
pub type BotError = anyhow::Error;

/// Stores data used by the bot.
///
/// Accessible by all bot commands through Context.
#[derive(Clone)]
pub struct Data {
    pub bus: Arc<dyn EventBus>,
    pub gateway: Arc<dyn ChatGateway>,
    pub guild_configs: Arc<dyn GuildConfigResolver>,
    pub interactions: Arc<InteractionCache>,
    pub scorecard_limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
}

impl Data {
    pub fn new(
        bus: Arc<dyn EventBus>,
        gateway: Arc<dyn ChatGateway>,
        guild_configs: Arc<dyn GuildConfigResolver>,
    ) -> Self {
        Self {
            bus,
            gateway,
            guild_configs,
            interactions: Arc::new(InteractionCache::default()),
            scorecard_limiter: Arc::new(RateLimiter::default()),
            metrics: Arc::new(Metrics::default()),
        }
    }
}

/// Convenience type for the bot's data with generics filled in.
pub type BotData = Data;

/// A context that gives the bot information about the action that invoked it.
pub type BotContext<'a> = poise::Context<'a, BotData, BotError>;

/// Application-command flavour of [`BotContext`], needed to open modals.
pub type AppContext<'a> = poise::ApplicationContext<'a, BotData, BotError>;
