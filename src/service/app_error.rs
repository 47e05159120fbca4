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
    /// setup errors, fatal to the process
    #[error("could not get the address information for {0}")]
    AddressResolution(String),

    #[error("could not create valid socket to communicate: {0}")]
    EndpointCreation(String),

    #[error("could not bind address to socket: {0}")]
    Bind(String),

    #[error("could not listen to the port: {0}")]
    Listen(String),

    #[error("could not accept the new connection: {0}")]
    Accept(String),

    #[error("could not connect to server: {0}")]
    Connect(String),

    /// steady-state transport errors, fatal to one flow only
    #[error("could not receive data: {0}")]
    TransportRead(String),

    #[error("could not send data: {0}")]
    TransportWrite(String),

    /// the peer closed or dropped the connection
    #[error("connection lost")]
    PeerLost,

    #[error("malformed protocol: {0}")]
    MalformedProtocol(String),

    /// general errors
    #[error("illegal state: {0}")]
    IllegalStateError(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),
}

impl AppError {
    /// Errors raised while establishing the connection. The process cannot
    /// continue after any of them.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            AppError::AddressResolution(_)
                | AppError::EndpointCreation(_)
                | AppError::Bind(_)
                | AppError::Listen(_)
                | AppError::Accept(_)
                | AppError::Connect(_)
        )
    }

    pub fn is_peer_lost(&self) -> bool {
        matches!(self, AppError::PeerLost)
    }
}
