use crate::{BotData, BotError};

pub mod roles;
pub mod round;

/// Groups all the commands of one area together.
pub trait CommandsContainer {
    type Data;
    type Error;

    fn get_all() -> Vec<poise::Command<Self::Data, Self::Error>>;
}

/// CommandsContainer for the round commands.
pub struct RoundCommands;

impl CommandsContainer for RoundCommands {
    type Data = BotData;
    type Error = BotError;

    fn get_all() -> Vec<poise::Command<Self::Data, Self::Error>> {
        vec![round::createround(), round::updateround(), round::deleteround()]
    }
}

/// CommandsContainer for the admin commands.
pub struct AdminCommands;

impl CommandsContainer for AdminCommands {
    type Data = BotData;
    type Error = BotError;

    fn get_all() -> Vec<poise::Command<Self::Data, Self::Error>> {
        vec![roles::updaterole()]
    }
}
