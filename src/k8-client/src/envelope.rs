use serde::Serialize;

use crate::ClientError;
use crate::ErrorCode;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// `{status, data, error, error_code}` returned at the boundary
///
/// `warnings` is only serialized when a successful call has something
/// to report about the cluster it ran against.
#[derive(Serialize, Debug)]
pub struct Envelope<T> {
    pub status: Outcome,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: Outcome::Success,
            data: Some(data),
            error: None,
            error_code: None,
            warnings: vec![],
        }
    }

    pub fn failure(err: &ClientError) -> Self {
        Self {
            status: Outcome::Error,
            data: None,
            error: Some(err.to_string()),
            error_code: Some(err.code()),
            warnings: vec![],
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Outcome::Success
    }
}

impl<T> From<Result<T, ClientError>> for Envelope<T> {
    fn from(result: Result<T, ClientError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::failure(&err),
        }
    }
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use super::*;

    #[test]
    fn test_success_envelope() {
        let envelope = Envelope::success(json!({"clusters": ["a", "b"]}));
        assert_eq!(
            serde_json::to_value(&envelope).expect("encode"),
            json!({
                "status": "success",
                "data": {"clusters": ["a", "b"]},
                "error": null,
                "error_code": null
            })
        );
    }

    #[test]
    fn test_warning_envelope() {
        let envelope = Envelope::success(json!([])).with_warning("cluster prod is UPDATING");
        let value = serde_json::to_value(&envelope).expect("encode");
        assert_eq!(value["status"], "success");
        assert_eq!(value["warnings"], json!(["cluster prod is UPDATING"]));
    }

    #[test]
    fn test_error_envelope() {
        let envelope: Envelope<()> = Err(ClientError::MissingParameter {
            operation: "list_pods".to_owned(),
            param: "namespace".to_owned(),
        })
        .into();
        let value = serde_json::to_value(&envelope).expect("encode");
        assert_eq!(value["status"], "error");
        assert_eq!(value["data"], serde_json::Value::Null);
        assert_eq!(value["error_code"], "MissingParameter");
        assert_eq!(
            value["error"],
            "operation list_pods requires parameter namespace"
        );
    }
}
