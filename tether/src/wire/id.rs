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

//! Message identifiers.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;

/// Identifier of an outgoing message.
///
/// Responses are correlated with their request through this identifier, so
/// it travels on the wire as a plain JSON string.
///
/// # Example
///
/// ```rust
/// use tether::wire::MessageId;
///
/// let id = MessageId::from("1718000000000-k3j9a1");
/// assert_eq!(id.as_str(), "1718000000000-k3j9a1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates message identifiers unique within one transport instance.
///
/// An id is the current Unix time in milliseconds, a random base-36 suffix,
/// and a per-generator sequence number. The sequence alone guarantees that no
/// two ids from the same generator are equal; time and randomness keep ids
/// from different client instances apart.
///
/// # Example
///
/// ```rust
/// use tether::wire::MessageIdGenerator;
///
/// let generator = MessageIdGenerator::new();
/// let a = generator.next();
/// let b = generator.next();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    sequence: AtomicU64,
}

impl MessageIdGenerator {
    /// Creates a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the next identifier.
    #[must_use]
    pub fn next(&self) -> MessageId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());

        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())]))
            .collect();

        MessageId(format!("{millis}-{suffix}{}", to_base36(sequence)))
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(SUFFIX_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Milliseconds since the Unix epoch, as carried in the `ts` field.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_unique() {
        let generator = MessageIdGenerator::new();
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let id = generator.next();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {id}");
        }
    }

    #[test]
    fn test_id_shape() {
        let id = MessageIdGenerator::new().next();
        let (millis, rest) = id.as_str().split_once('-').unwrap();
        assert!(millis.parse::<u128>().is_ok());
        assert!(rest.len() > SUFFIX_LEN);
        assert!(rest.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = MessageId::from("abc-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-1\"");
    }

    #[tokio::test]
    async fn test_ids_unique_across_tasks() {
        let generator = Arc::new(MessageIdGenerator::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let generator = Arc::clone(&generator);
            handles.push(tokio::spawn(async move {
                (0..250).map(|_| generator.next()).collect::<Vec<_>>()
            }));
        }

        let mut all_ids = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(all_ids.insert(id.clone()), "Duplicate ID in concurrent test: {id}");
            }
        }
        assert_eq!(all_ids.len(), 2000);
    }
}
