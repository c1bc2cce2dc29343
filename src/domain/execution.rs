//! Build executions and the invocation outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One queued run of a build environment.
///
/// Created fresh for every invocation and never tracked afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildExecution {
    pub id: String,
    pub environment_name: String,
    pub started_at: DateTime<Utc>,
}

impl BuildExecution {
    pub fn new(id: impl Into<String>, environment_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            environment_name: environment_name.into(),
            started_at: Utc::now(),
        }
    }
}

/// Successful result of one invocation, as returned to the webhook caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub bucket: String,
    pub key: String,
    #[serde(rename = "buildId")]
    pub build_execution_id: String,
    #[serde(rename = "projectName")]
    pub environment_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_names() {
        let outcome = Outcome {
            bucket: "mlops-cicd-source".to_string(),
            key: "ip-demo/v1/source.zip".to_string(),
            build_execution_id: "ip-demo:1234".to_string(),
            environment_name: "ip-demo".to_string(),
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["bucket"], "mlops-cicd-source");
        assert_eq!(json["key"], "ip-demo/v1/source.zip");
        assert_eq!(json["buildId"], "ip-demo:1234");
        assert_eq!(json["projectName"], "ip-demo");
    }
}
