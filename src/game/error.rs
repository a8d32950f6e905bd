//! Simulation Errors
//!
//! NotFound variants are never fatal: callers log them at warn level and
//! no-op (or lazily create the entity, for move intents).

use crate::game::state::{EnemyId, HeroId};

/// Result alias for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised by the simulation core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// Intent references a hero that does not exist.
    #[error("Hero {0} not found")]
    HeroNotFound(HeroId),

    /// Intent references an enemy that does not exist.
    #[error("Enemy {0} not found")]
    EnemyNotFound(EnemyId),

    /// Malformed request, rejected rather than coerced.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A NaN or infinite value reached a field that must stay finite.
    #[error("Non-finite value for {0}")]
    NonFinite(&'static str),

    /// Collaborator or config failure.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SimError {
    /// True for the NotFound family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SimError::HeroNotFound(_) | SimError::EnemyNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(SimError::HeroNotFound(HeroId(1)).is_not_found());
        assert!(SimError::EnemyNotFound(EnemyId(3)).is_not_found());
        assert!(!SimError::InvalidArgument("x".into()).is_not_found());
        assert!(!SimError::NonFinite("position").is_not_found());
    }

    #[test]
    fn test_display() {
        assert_eq!(SimError::EnemyNotFound(EnemyId(7)).to_string(), "Enemy 7 not found");
    }
}
