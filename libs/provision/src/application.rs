//! Application identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the application owning an allocation: tenant, application,
/// and instance name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId {
    pub tenant: String,
    pub application: String,
    pub instance: String,
}

impl ApplicationId {
    pub fn new(
        tenant: impl Into<String>,
        application: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            application: application.into(),
            instance: instance.into(),
        }
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.tenant, self.application, self.instance)
    }
}
