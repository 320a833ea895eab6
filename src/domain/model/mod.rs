// Typed records for game server payloads.

pub(crate) mod convert;

pub mod battle;
pub mod social;
pub mod user;

pub use battle::BattleReplay;
pub use social::{AssistChar, Avatar, MedalBoard, PartialPlayer, Player};
pub use user::{Character, Status, Troops, User};
