pub mod credentials;
pub mod settings;

pub use credentials::Credentials;
pub use settings::{BotSettings, RuntimeSettings};
