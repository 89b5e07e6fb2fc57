// Copyright 2025 coScene
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
use std::str::FromStr;

use crate::error::RecorderError;

/// Acknowledgment sent after every accepted device announcement
pub const ACK: &[u8; 3] = b"ACK";

pub const CLOSE_COMMAND: &str = "close";

/// Largest frame read from the handshake socket in one turn
pub const MAX_FRAME_LEN: usize = 1024;

/// Identity announced by the transmitting device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// Identity in effect before any handshake
    pub const UNASSIGNED: DeviceId = DeviceId(0);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(DeviceId)
    }
}

/// One client-to-server handshake frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFrame {
    Close,
    Announce(DeviceId),
}

impl HandshakeFrame {
    /// Decode a UTF-8 frame. Surrounding whitespace is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecorderError> {
        let text = std::str::from_utf8(bytes).map_err(|_| RecorderError::HandshakeDecode {
            frame: String::from_utf8_lossy(bytes).into_owned(),
        })?;
        let text = text.trim();

        if text == CLOSE_COMMAND {
            return Ok(HandshakeFrame::Close);
        }

        text.parse::<DeviceId>()
            .map(HandshakeFrame::Announce)
            .map_err(|_| RecorderError::HandshakeDecode {
                frame: text.to_string(),
            })
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            HandshakeFrame::Close => CLOSE_COMMAND.as_bytes().to_vec(),
            HandshakeFrame::Announce(id) => id.to_string().into_bytes(),
        }
    }
}
