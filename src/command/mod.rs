//! Command interface used by the observer, the CLI and the HTTP surface

pub mod bus;
pub mod handler;
pub mod messages;

pub use bus::{command_channel, CommandBus, CommandClient};
pub use handler::{CommandHandler, LeaderboardCommandHandler, MockCommandHandler};
pub use messages::{Command, CommandEnvelope, CommandResponse, CommandStatus, MessageUtils};
