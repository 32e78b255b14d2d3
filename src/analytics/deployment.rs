use serde::{Deserialize, Serialize};

use crate::analytics::constants::DEPLOYMENT_GROUP_TYPE;
use crate::transport::Traits;

/// Describes the running deployment that outgoing analytics are attributed to.
///
/// When adding fields, update [`Deployment::traits`] so they reach the group call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub version: String,
    /// Environment name such as `dev`, `prod` or `uat`. Empty means unspecified.
    pub stage: String,
}

impl Deployment {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        stage: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            stage: stage.into(),
        }
    }

    /// Traits sent with the deployment's group identification call.
    pub fn traits(&self) -> Traits {
        let traits = Traits::new()
            .set("version", self.version.as_str())
            .set("groupType", DEPLOYMENT_GROUP_TYPE)
            .set("id", self.id.as_str());

        if self.stage.is_empty() {
            traits
        } else {
            traits.set("stage", self.stage.as_str())
        }
    }
}
