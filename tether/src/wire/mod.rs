//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Wire protocol: message types, identifiers and JSON framing.
//!
//! Messages are sum types keyed on their `kind`/`type` discriminator and are
//! decoded by exhaustive pattern matching, never by probing for fields.

pub mod codec;
mod id;
mod message;

pub use codec::{CodecError, DecodedFrame};
pub use id::{MessageId, MessageIdGenerator};
pub(crate) use id::unix_millis;
pub use message::{ErrorCode, IncomingMessage, MessageKind, OutgoingMessage, RemoteError};
