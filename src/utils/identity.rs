// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use uuid::Uuid;

use crate::{AppError, AppResult};

/// Length of a generated identity, long enough to tell clients apart in logs.
pub const IDENTITY_LEN: usize = 5;

/// Short printable token naming this client to the server and in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Wraps an externally supplied token. It must be non-empty and free of
    /// whitespace, otherwise it would break the `login <id>` line.
    pub fn new(token: impl Into<String>) -> AppResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(AppError::InvalidValue("identity is empty".into()));
        }
        if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AppError::InvalidValue(format!(
                "identity {:?} contains whitespace or control characters",
                token
            )));
        }
        Ok(Identity(token))
    }

    /// First characters of a random v4 uuid.
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Identity(uuid[..IDENTITY_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn generated_identity_is_short_and_printable() {
        let id = Identity::generate();
        assert_eq!(id.as_str().len(), IDENTITY_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(Identity::new(id.as_str()).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("ab cd")]
    #[case("abc\n")]
    #[case("\tx")]
    fn bad_tokens_are_rejected(#[case] token: &str) {
        assert!(Identity::new(token).is_err());
    }
}
