pub mod anchor;
pub mod chain;
pub mod daemon;
pub mod health;
pub mod init;
pub mod record;
pub mod version;

pub use anchor::Anchor;
pub use chain::Chain;
pub use daemon::Daemon;
pub use health::Health;
pub use init::Init;
pub use record::Record;
pub use version::Version;
