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

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// general errors
    #[error("illegal state: {0}")]
    IllegalStateError(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("channel send error: {0}")]
    ChannelSendError(String),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),

    /// connection errors
    #[error("connect failure: {0}")]
    ConnectFailure(String),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// protocol errors
    #[error("malformed protocol : {0}")]
    MalformedProtocol(String),

    #[error("frame of length {0} is too large")]
    FrameTooLarge(usize),
}

impl AppError {
    /// Protocol violations are reported and skipped, everything else ends the connection.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            AppError::MalformedProtocol(_) | AppError::FrameTooLarge(_)
        )
    }
}
