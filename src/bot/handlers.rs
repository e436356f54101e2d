//! Command and menu handlers for users and admins.

#[path = "handlers/commands/mod.rs"]
mod commands;
#[path = "handlers/format.rs"]
mod format;
#[path = "handlers/menu.rs"]
mod menu;
#[path = "handlers/shared.rs"]
mod shared;
#[path = "handlers/state.rs"]
mod state;

pub use commands::Command;
pub use state::BotState;

use teloxide::dispatching::DpHandlerDescription;
use teloxide::dptree;
use teloxide::prelude::*;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn schema() -> dptree::Handler<'static, Result<(), HandlerError>, DpHandlerDescription> {
    Update::filter_message()
        .branch(commands::handler())
        .endpoint(menu::handle_menu_buttons)
}
