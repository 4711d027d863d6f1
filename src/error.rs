//! Error types for the game master
//!
//! Every failure that reaches a caller is one of the `MatchmakingError`
//! variants below. Internal layers return `anyhow` errors carrying these
//! variants; orchestrators recover them with `classify` so the caller always
//! sees a status code and, for bans, the ban metadata.

use crate::types::BanInfo;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Result of an orchestrator operation, always carrying a typed error
pub type ApiResult<T> = std::result::Result<T, MatchmakingError>;

/// Coarse classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Gone,
    Throttled,
    Policy,
    Permission,
    Validation,
    Infrastructure,
}

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid filter: {reason}")]
    InvalidFilter { reason: String },

    #[error("Region not found")]
    RegionNotFound,

    #[error("Host not found: {host_id}")]
    HostNotFound { host_id: u64 },

    #[error("Not enough hosts in region {region_id}")]
    NoHostsAvailable { region_id: u64 },

    #[error("Room not found")]
    RoomNotFound { room_id: Option<u64> },

    #[error("Room is full: {room_id}")]
    RoomFull { room_id: u64 },

    #[error("Party not found: {party_id}")]
    PartyNotFound { party_id: u64 },

    #[error("Party is full: {party_id}")]
    PartyFull { party_id: u64 },

    #[error("Party have already started a game: {party_id}")]
    PartyAlreadyStarted { party_id: u64 },

    #[error("Party is released")]
    PartyReleased,

    #[error("Already joined")]
    AlreadyJoined,

    #[error("Not joined")]
    NotJoined,

    #[error("No such member: {account_id}")]
    MemberNotFound { account_id: String },

    #[error("Not enough permissions to {action}")]
    PermissionDenied { action: String },

    #[error("No such game server: {game_name}/{server_name}")]
    GameServerNotFound {
        game_name: String,
        server_name: String,
    },

    #[error("No deployment defined for {game_name}/{game_version}")]
    NoCurrentDeployment {
        game_name: String,
        game_version: String,
    },

    #[error("Deployment is disabled for {game_name}/{game_version}")]
    DeploymentDisabled {
        game_name: String,
        game_version: String,
    },

    #[error("Deployment is outdated")]
    DeploymentOutdated,

    #[error("Too many requests: {action}")]
    RateLimitExceeded { action: String, account_id: String },

    #[error("Banned until {}", .ban.expires)]
    Banned { ban: BanInfo },

    #[error("Failed to approve: {room_id}")]
    ApproveFailed { room_id: u64 },

    #[error("Failed to spawn a new game server: {code} {message}")]
    SpawnFailed { code: u16, message: String },

    #[error("Host controller timed out: {action}")]
    ControllerTimeout { action: String },

    #[error("No such action receiver: {action}")]
    NoSuchAction { action: String },

    #[error("Failed to extend token: {code} {message}")]
    TokenExtensionFailed { code: u16, message: String },

    #[error("Failed to call close callback {callback}: {message}")]
    CloseCallbackFailed { callback: String, message: String },

    #[error("Store error: {message}")]
    StoreError { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// HTTP-style status code surfaced to callers
    pub fn status_code(&self) -> u16 {
        use MatchmakingError::*;
        match self {
            InvalidRequest { .. } | InvalidFilter { .. } | NoSuchAction { .. } => 400,
            PermissionDenied { .. } => 403,
            RegionNotFound
            | HostNotFound { .. }
            | RoomNotFound { .. }
            | PartyNotFound { .. }
            | GameServerNotFound { .. }
            | NoCurrentDeployment { .. } => 404,
            PartyFull { .. } => 406,
            RoomFull { .. }
            | PartyAlreadyStarted { .. }
            | AlreadyJoined
            | MemberNotFound { .. }
            | ApproveFailed { .. } => 409,
            PartyReleased | NotJoined | DeploymentDisabled { .. } | DeploymentOutdated => 410,
            Banned { .. } => 423,
            RateLimitExceeded { .. } => 429,
            NoHostsAvailable { .. } => 503,
            ControllerTimeout { .. } => 504,
            SpawnFailed { code, .. } | TokenExtensionFailed { code, .. } => *code,
            AmqpConnectionFailed { .. }
            | CloseCallbackFailed { .. }
            | StoreError { .. }
            | ConfigurationError { .. }
            | InternalError { .. } => 500,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        use MatchmakingError::*;
        match self {
            InvalidRequest { .. } | InvalidFilter { .. } | NoSuchAction { .. } => {
                ErrorKind::Validation
            }
            PermissionDenied { .. } => ErrorKind::Permission,
            RegionNotFound
            | HostNotFound { .. }
            | RoomNotFound { .. }
            | PartyNotFound { .. }
            | GameServerNotFound { .. }
            | NoCurrentDeployment { .. } => ErrorKind::NotFound,
            PartyFull { .. }
            | RoomFull { .. }
            | PartyAlreadyStarted { .. }
            | AlreadyJoined
            | MemberNotFound { .. }
            | ApproveFailed { .. } => ErrorKind::Conflict,
            PartyReleased | NotJoined | DeploymentDisabled { .. } | DeploymentOutdated => {
                ErrorKind::Gone
            }
            Banned { .. } => ErrorKind::Policy,
            RateLimitExceeded { .. } => ErrorKind::Throttled,
            _ => ErrorKind::Infrastructure,
        }
    }
}

/// Status code of an arbitrary error, 500 unless it carries a `MatchmakingError`
pub fn status_of(error: &anyhow::Error) -> u16 {
    error
        .downcast_ref::<MatchmakingError>()
        .map(|e| e.status_code())
        .unwrap_or(500)
}

/// Translate any error into the taxonomy, wrapping untyped errors as store failures
pub fn classify(error: anyhow::Error) -> MatchmakingError {
    match error.downcast::<MatchmakingError>() {
        Ok(typed) => typed,
        Err(other) => MatchmakingError::StoreError {
            message: format!("{:#}", other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(MatchmakingError::RoomNotFound { room_id: None }.status_code(), 404);
        assert_eq!(MatchmakingError::PartyFull { party_id: 1 }.status_code(), 406);
        assert_eq!(
            MatchmakingError::RateLimitExceeded {
                action: "create_room".to_string(),
                account_id: "1".to_string()
            }
            .status_code(),
            429
        );
        assert_eq!(MatchmakingError::NoHostsAvailable { region_id: 1 }.status_code(), 503);
        assert_eq!(
            MatchmakingError::SpawnFailed {
                code: 502,
                message: "bad gateway".to_string()
            }
            .status_code(),
            502
        );
    }

    #[test]
    fn test_ban_is_policy_error() {
        let err = MatchmakingError::Banned {
            ban: BanInfo {
                ban_id: 7,
                account_id: "42".to_string(),
                ip: None,
                expires: Utc::now(),
                reason: "cheating".to_string(),
            },
        };
        assert_eq!(err.status_code(), 423);
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[test]
    fn test_classify_wraps_untyped_errors() {
        let typed: anyhow::Error = MatchmakingError::PartyReleased.into();
        assert!(matches!(classify(typed), MatchmakingError::PartyReleased));

        let untyped = anyhow::anyhow!("disk on fire");
        let classified = classify(untyped);
        assert!(matches!(classified, MatchmakingError::StoreError { .. }));
        assert_eq!(classified.status_code(), 500);
    }
}
