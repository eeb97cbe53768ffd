/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Form parameter parsing and the indexed-list walker.
//!
//! AWS form encoding flattens lists into 1-based indexed keys, in two
//! spellings depending on SDK generation: `Tag.1.Key` and
//! `Tag.member.1.Key` mean the same thing. Indexed keys are kept verbatim
//! in the parameter map; the walkers here iterate indices until the first
//! gap.

use std::collections::HashMap;

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse `application/x-www-form-urlencoded` text into a map. Later
/// occurrences of a key win; keys without `=` map to the empty string.
pub fn parse_urlencoded(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in text.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((k, v)) => map.insert(percent_decode(k), percent_decode(v)),
            None => map.insert(percent_decode(pair), String::new()),
        };
    }
    map
}

fn lookup<'a>(
    params: &'a HashMap<String, String>,
    prefix: &str,
    index: usize,
) -> Option<(&'a HashMap<String, String>, String)> {
    for spelling in [
        format!("{}.{}", prefix, index),
        format!("{}.member.{}", prefix, index),
    ] {
        let direct = params.contains_key(&spelling);
        let nested = params.keys().any(|k| k.starts_with(&format!("{}.", spelling)));
        if direct || nested {
            return Some((params, spelling));
        }
    }
    None
}

/// Scalar list: `Prefix.1`, `Prefix.2`, … (or the `member` spelling),
/// collected until the first gap.
pub fn indexed_values(params: &HashMap<String, String>, prefix: &str) -> Vec<String> {
    let mut values = Vec::new();
    for index in 1.. {
        match lookup(params, prefix, index) {
            Some((map, key)) => match map.get(&key) {
                Some(value) => values.push(value.clone()),
                None => break,
            },
            None => break,
        }
    }
    values
}

/// Structured list: for each index, the sub-map of suffix keys under
/// `Prefix.N.` (`Tag.1.Key` contributes `Key`), until the first gap.
/// Nested indexed structures keep their own indexed suffixes verbatim, so
/// the walker can be applied to the returned group again.
pub fn indexed_groups(
    params: &HashMap<String, String>,
    prefix: &str,
) -> Vec<HashMap<String, String>> {
    let mut groups = Vec::new();
    for index in 1.. {
        match lookup(params, prefix, index) {
            Some((map, key)) => {
                let nested_prefix = format!("{}.", key);
                let group: HashMap<String, String> = map
                    .iter()
                    .filter_map(|(k, v)| {
                        k.strip_prefix(&nested_prefix)
                            .map(|suffix| (suffix.to_string(), v.clone()))
                    })
                    .collect();
                if group.is_empty() {
                    break;
                }
                groups.push(group);
            }
            None => break,
        }
    }
    groups
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_urlencoded_decodes() {
        let map = parse_urlencoded("Action=CreateVpc&CidrBlock=10.0.0.0%2F16&Flag");
        assert_eq!(map["Action"], "CreateVpc");
        assert_eq!(map["CidrBlock"], "10.0.0.0/16");
        assert_eq!(map["Flag"], "");
    }

    #[test]
    fn test_parse_urlencoded_plus_is_space() {
        let map = parse_urlencoded("Description=web+server");
        assert_eq!(map["Description"], "web server");
    }

    #[test]
    fn test_indexed_values_until_gap() {
        let map = params(&[
            ("InstanceId.1", "i-a"),
            ("InstanceId.2", "i-b"),
            ("InstanceId.4", "i-d"),
        ]);
        assert_eq!(indexed_values(&map, "InstanceId"), vec!["i-a", "i-b"]);
    }

    #[test]
    fn test_indexed_values_member_spelling() {
        let map = params(&[
            ("VpcId.member.1", "vpc-a"),
            ("VpcId.member.2", "vpc-b"),
        ]);
        assert_eq!(indexed_values(&map, "VpcId"), vec!["vpc-a", "vpc-b"]);
    }

    #[test]
    fn test_indexed_groups_collects_suffixes() {
        let map = params(&[
            ("Tag.1.Key", "Name"),
            ("Tag.1.Value", "web"),
            ("Tag.2.Key", "Env"),
            ("Tag.2.Value", "dev"),
        ]);
        let groups = indexed_groups(&map, "Tag");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["Key"], "Name");
        assert_eq!(groups[1]["Value"], "dev");
    }

    #[test]
    fn test_indexed_groups_nested_walker() {
        let map = params(&[
            ("IpPermissions.1.IpProtocol", "tcp"),
            ("IpPermissions.1.FromPort", "22"),
            ("IpPermissions.1.ToPort", "22"),
            ("IpPermissions.1.IpRanges.1.CidrIp", "0.0.0.0/0"),
            ("IpPermissions.1.IpRanges.2.CidrIp", "10.0.0.0/8"),
        ]);
        let perms = indexed_groups(&map, "IpPermissions");
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0]["IpProtocol"], "tcp");

        let ranges = indexed_groups(&perms[0], "IpRanges");
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0]["CidrIp"], "0.0.0.0/0");
        assert_eq!(ranges[1]["CidrIp"], "10.0.0.0/8");
    }

    #[test]
    fn test_indexed_groups_deep_spec_keys_kept_verbatim() {
        let map = params(&[
            ("TagSpecification.1.ResourceType", "instance"),
            ("TagSpecification.1.Tag.1.Key", "Name"),
            ("TagSpecification.1.Tag.1.Value", "web"),
        ]);
        let specs = indexed_groups(&map, "TagSpecification");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0]["ResourceType"], "instance");
        let tags = indexed_groups(&specs[0], "Tag");
        assert_eq!(tags[0]["Key"], "Name");
    }
}
