//! Zone identity: which system and environment a fleet instance serves.
//!
//! Maintenance policy (notably failed-node expiry) keys off the zone, so the
//! same control plane recycles aggressively in test zones and conservatively
//! in production.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProvisionError;

/// The fleet system this instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemName {
    /// The production fleet.
    Main,
    /// The continuous-deployment fleet, where everything turns over fast.
    Cd,
}

impl FromStr for SystemName {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "cd" => Ok(Self::Cd),
            other => Err(ProvisionError::InvalidZone(other.to_string())),
        }
    }
}

impl fmt::Display for SystemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Cd => write!(f, "cd"),
        }
    }
}

/// Deployment environment within a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Dev,
    Test,
    Staging,
    Prod,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Prod)
    }
}

impl FromStr for Environment {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "staging" => Ok(Self::Staging),
            "prod" => Ok(Self::Prod),
            other => Err(ProvisionError::InvalidZone(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Test => write!(f, "test"),
            Self::Staging => write!(f, "staging"),
            Self::Prod => write!(f, "prod"),
        }
    }
}

/// A zone: system, environment, and region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub system: SystemName,
    pub environment: Environment,
    pub region: String,
}

impl Zone {
    pub fn new(system: SystemName, environment: Environment, region: impl Into<String>) -> Self {
        Self {
            system,
            environment,
            region: region.into(),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.system, self.environment, self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for system in [SystemName::Main, SystemName::Cd] {
            assert_eq!(system.to_string().parse::<SystemName>().unwrap(), system);
        }
        for environment in [
            Environment::Dev,
            Environment::Test,
            Environment::Staging,
            Environment::Prod,
        ] {
            assert_eq!(
                environment.to_string().parse::<Environment>().unwrap(),
                environment
            );
        }
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        assert!(matches!(
            "production".parse::<Environment>(),
            Err(ProvisionError::InvalidZone(_))
        ));
        assert!(matches!(
            "lab".parse::<SystemName>(),
            Err(ProvisionError::InvalidZone(_))
        ));
    }

    #[test]
    fn test_display() {
        let zone = Zone::new(SystemName::Main, Environment::Prod, "us-east-1");
        assert_eq!(zone.to_string(), "main.prod.us-east-1");
    }
}
