/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! AWS-shaped resource id generation.
//!
//! Random parts are UUID-derived hex, truncated to the width AWS uses for
//! the kind: eight characters for most resources, seventeen for
//! instances. Callers re-draw while the candidate collides with an
//! existing store key.

use uuid::Uuid;

fn hex(len: usize) -> String {
    let raw = Uuid::new_v4().simple().to_string();
    raw[..len].to_string()
}

/// `<prefix>-` followed by eight UUID-derived hex characters.
pub fn short_id(prefix: &str) -> String {
    format!("{}-{}", prefix, hex(8))
}

/// `i-` followed by seventeen UUID-derived hex characters.
pub fn instance_id() -> String {
    format!("i-{}", hex(17))
}

/// Request id in the hyphenated shape SDKs log.
pub fn request_id() -> String {
    Uuid::new_v4().to_string()
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

    fn is_hex(s: &str) -> bool {
        s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    #[test]
    fn test_short_id_shape() {
        let id = short_id("vpc");
        let rest = id.strip_prefix("vpc-").unwrap();
        assert_eq!(rest.len(), 8);
        assert!(is_hex(rest));
    }

    #[test]
    fn test_instance_id_shape() {
        let id = instance_id();
        let rest = id.strip_prefix("i-").unwrap();
        assert_eq!(rest.len(), 17);
        assert!(is_hex(rest));
    }

    #[test]
    fn test_ids_are_not_repeated() {
        let a = short_id("sg");
        let b = short_id("sg");
        assert_ne!(a, b);
    }
}
