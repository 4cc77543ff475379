//! Typed mutation responses.
//!
//! Mutations answer with either their success payload or a failure carrying
//! a list of problems. Problems are discriminated by `__typename`.

use serde::Deserialize;

/// Outcome of a mutation: the success payload, or the reported problems.
///
/// A response object is read as [`MutationResult::Failure`] when it has a
/// `problems` field, and as [`MutationResult::Success`] otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MutationResult<T> {
    Failure { problems: Vec<Problem> },
    Success(T),
}

impl<T> MutationResult<T> {
    /// Convert into a `Result`, with the problems as the error.
    pub fn into_result(self) -> Result<T, Vec<Problem>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure { problems } => Err(problems),
        }
    }
}

/// A problem reported by a failed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "__typename")]
pub enum Problem {
    /// Login with an unknown email or a wrong password.
    #[serde(rename = "WrongCredentialsProblem")]
    WrongCredentials { message: String },

    /// The refresh credential was unknown, revoked, or expired.
    #[serde(rename = "InvalidRefreshTokenProblem")]
    InvalidRefreshToken { message: String },

    /// Account creation with an email that is already registered.
    #[serde(rename = "EmailAlreadyUsedProblem")]
    EmailAlreadyUsed { message: String },

    /// A field of the mutation input failed validation.
    #[serde(rename = "InvalidInputProblem")]
    InvalidInput {
        message: String,
        #[serde(default)]
        path: Vec<String>,
    },

    /// A problem type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl Problem {
    /// The human-readable message, if the problem kind carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::WrongCredentials { message }
            | Self::InvalidRefreshToken { message }
            | Self::EmailAlreadyUsed { message }
            | Self::InvalidInput { message, .. } => Some(message),
            Self::Unknown => None,
        }
    }
}

/// Join problem messages for error display.
pub(crate) fn describe(problems: &[Problem]) -> String {
    let messages: Vec<&str> = problems
        .iter()
        .map(|p| p.message().unwrap_or("unknown problem"))
        .collect();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Created {
        id: String,
    }

    #[test]
    fn test_success_payload() {
        let result: MutationResult<Created> =
            serde_json::from_value(json!({"__typename": "User", "id": "u1"})).unwrap();
        assert_eq!(result.into_result().unwrap(), Created { id: "u1".into() });
    }

    #[test]
    fn test_failure_with_known_problems() {
        let result: MutationResult<Created> = serde_json::from_value(json!({
            "__typename": "CreateUserFailure",
            "problems": [
                {"__typename": "EmailAlreadyUsedProblem", "message": "Email taken"},
                {"__typename": "InvalidInputProblem", "message": "Too short", "path": ["password"]}
            ]
        }))
        .unwrap();

        let problems = result.into_result().unwrap_err();
        assert_eq!(
            problems,
            vec![
                Problem::EmailAlreadyUsed {
                    message: "Email taken".into()
                },
                Problem::InvalidInput {
                    message: "Too short".into(),
                    path: vec!["password".into()]
                },
            ]
        );
        assert_eq!(describe(&problems), "Email taken; Too short");
    }

    #[test]
    fn test_unknown_problem_kind() {
        let result: MutationResult<Created> = serde_json::from_value(json!({
            "problems": [{"__typename": "RateLimitedProblem", "message": "slow down"}]
        }))
        .unwrap();

        let problems = result.into_result().unwrap_err();
        assert_eq!(problems, vec![Problem::Unknown]);
        assert_eq!(problems[0].message(), None);
    }
}
