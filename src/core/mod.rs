pub mod directory;
pub mod dispatcher;
pub mod engine;
pub mod ledger;
pub mod pairing;
pub mod sampler;
pub mod template;

pub use crate::domain::model::{MatchMap, Pairing, Participant, Round, RoundLabel};
pub use crate::domain::ports::{Message, NotificationChannel, Storage};
pub use crate::utils::error::Result;
