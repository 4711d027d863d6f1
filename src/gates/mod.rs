//! Gates a room creation or join must pass: deployments, rate limits, bans
//! and the game-server catalog they are resolved against

pub mod ban;
pub mod deployment;
pub mod gameserver;
pub mod ratelimit;

pub use ban::{BanGate, InMemoryBans, NoBans};
pub use deployment::{DeploymentGate, InMemoryDeployments};
pub use gameserver::{GameServerCatalog, InMemoryGameServers};
pub use ratelimit::{InMemoryRateLimiter, Lease, LeaseRefund, RateLimiter, CREATE_ROOM};
