//! Value synthesizer: produces concrete field values from a single
//! constraint kind.
//!
//! Every function takes the random source explicitly and a `fuzzy` flag. When
//! `fuzzy` is false the result is a pure function of the inputs, with the
//! exception of wildcard expansion which is always randomized. Callers that
//! must avoid particular values (sequence join fields) pass an `accept`
//! predicate; candidates it rejects are retried up to [`MAX_ATTEMPTS`] times.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, SecondsFormat, Utc};
use evtgen_ast::{SpecialChar, StringPart, WildcardString};
use rand::Rng;

use crate::error::SynthError;

/// Upper bound on retries and inward scans for any single value.
pub const MAX_ATTEMPTS: usize = 100;

/// Characters used to fill wildcard positions.
pub const WILDCARD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Characters used for free-form strings.
pub const STRING_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A `*` expands to between 0 and `MAX_WILDCARD_RUN - 1` characters.
pub const MAX_WILDCARD_RUN: usize = 16;

/// Length of synthesized free-form strings.
pub const RANDOM_STRING_LEN: usize = 3;

/// Which end of an interval deterministic resolution starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

// =============================================================================
// Strings
// =============================================================================

fn random_chars<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

/// A random string of ASCII letters that `accept` agrees to.
pub fn random_string<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    accept: &dyn Fn(&str) -> bool,
) -> Result<String, SynthError> {
    for _ in 0..MAX_ATTEMPTS {
        let s = random_chars(rng, STRING_ALPHABET, len);
        if accept(&s) {
            return Ok(s);
        }
    }
    Err(SynthError::Exhausted {
        attempts: MAX_ATTEMPTS,
    })
}

/// The value itself.
pub fn resolve_equals<T: Clone>(value: &T) -> T {
    value.clone()
}

/// A string different from `value`: `"!" + value` when deterministic.
pub fn not_equal_string<R: Rng + ?Sized>(
    value: &str,
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(&str) -> bool,
) -> Result<String, SynthError> {
    if fuzzy {
        return random_string(rng, RANDOM_STRING_LEN, &|s| s != value && accept(s));
    }
    let mut candidate = format!("!{value}");
    for _ in 0..MAX_ATTEMPTS {
        if accept(&candidate) {
            return Ok(candidate);
        }
        candidate.insert(0, '!');
    }
    Err(SynthError::Exhausted {
        attempts: MAX_ATTEMPTS,
    })
}

/// A string outside `values`, built from the first member when deterministic.
pub fn string_outside<R: Rng + ?Sized>(
    values: &[String],
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(&str) -> bool,
) -> Result<String, SynthError> {
    let admissible = |s: &str| !values.iter().any(|v| v == s) && accept(s);
    match values.first() {
        Some(first) if !fuzzy => not_equal_string(first, rng, false, &admissible),
        _ => random_string(rng, RANDOM_STRING_LEN, &admissible),
    }
}

/// Expand a wildcard pattern: `?` becomes one character, `*` a run of
/// 0 to 15 characters, both drawn from [`WILDCARD_ALPHABET`].
pub fn expand_wildcard<R: Rng + ?Sized>(pattern: &WildcardString, rng: &mut R) -> String {
    let mut out = String::new();
    for part in &pattern.parts {
        match part {
            StringPart::Plain(s) => out.push_str(s),
            StringPart::Special(SpecialChar::WildcardSingle) => {
                out.push_str(&random_chars(rng, WILDCARD_ALPHABET, 1));
            }
            StringPart::Special(SpecialChar::WildcardMulti) => {
                let len = rng.random_range(0..MAX_WILDCARD_RUN);
                out.push_str(&random_chars(rng, WILDCARD_ALPHABET, len));
            }
        }
    }
    out
}

/// Expand `pattern` until `accept` agrees.
pub fn resolve_wildcard<R: Rng + ?Sized>(
    pattern: &WildcardString,
    rng: &mut R,
    accept: &dyn Fn(&str) -> bool,
) -> Result<String, SynthError> {
    let attempts = if pattern.is_plain() { 1 } else { MAX_ATTEMPTS };
    for _ in 0..attempts {
        let s = expand_wildcard(pattern, rng);
        if accept(&s) {
            return Ok(s);
        }
    }
    Err(SynthError::Exhausted { attempts })
}

// =============================================================================
// Integers
// =============================================================================

/// A value in `lo..=hi` that is neither excluded nor rejected.
///
/// Deterministic resolution starts at `anchor` and steps inward. Fuzzy
/// resolution draws uniformly, then falls back to the inward scan.
pub fn resolve_range<R: Rng + ?Sized>(
    lo: i64,
    hi: i64,
    anchor: Anchor,
    excluded: &BTreeSet<i64>,
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(i64) -> bool,
) -> Result<i64, SynthError> {
    if lo > hi {
        return Err(SynthError::Boundary {
            min: lo.into(),
            max: hi.into(),
        });
    }
    let admissible = |n: i64| !excluded.contains(&n) && accept(n);

    if fuzzy {
        for _ in 0..MAX_ATTEMPTS {
            let n = rng.random_range(lo..=hi);
            if admissible(n) {
                return Ok(n);
            }
        }
    }

    let budget = excluded.len() + MAX_ATTEMPTS;
    let mut candidate = match anchor {
        Anchor::Low => lo,
        Anchor::High => hi,
    };
    for _ in 0..budget {
        if admissible(candidate) {
            return Ok(candidate);
        }
        candidate = match anchor {
            Anchor::Low if candidate < hi => candidate + 1,
            Anchor::High if candidate > lo => candidate - 1,
            _ => {
                return Err(SynthError::Boundary {
                    min: lo.into(),
                    max: hi.into(),
                });
            }
        };
    }
    Err(SynthError::Exhausted { attempts: budget })
}

/// An integer in `lo..=hi` other than `value`: `value + 1` when
/// deterministic, or `value - 1` at the top of the domain.
pub fn not_equal_integer<R: Rng + ?Sized>(
    value: i64,
    lo: i64,
    hi: i64,
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(i64) -> bool,
) -> Result<i64, SynthError> {
    let excluded = BTreeSet::from([value]);
    if fuzzy {
        return resolve_range(lo, hi, Anchor::Low, &excluded, rng, true, accept);
    }
    if value < hi
        && let Ok(n) = resolve_range(value + 1, hi, Anchor::Low, &excluded, rng, false, accept)
    {
        return Ok(n);
    }
    if value > lo {
        return resolve_range(lo, value - 1, Anchor::High, &excluded, rng, false, accept);
    }
    Err(SynthError::Boundary {
        min: lo.into(),
        max: hi.into(),
    })
}

/// An integer in `lo..=hi` outside `values`, starting just above the largest
/// member when deterministic.
pub fn integer_outside<R: Rng + ?Sized>(
    values: &[i64],
    lo: i64,
    hi: i64,
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(i64) -> bool,
) -> Result<i64, SynthError> {
    let excluded: BTreeSet<i64> = values.iter().copied().collect();
    if fuzzy {
        return resolve_range(lo, hi, Anchor::Low, &excluded, rng, true, accept);
    }
    let top = excluded.last().copied().unwrap_or(lo);
    if top < hi
        && let Ok(n) = resolve_range(top + 1, hi, Anchor::Low, &excluded, rng, false, accept)
    {
        return Ok(n);
    }
    resolve_range(lo, hi, Anchor::High, &excluded, rng, false, accept)
}

// =============================================================================
// Booleans, sets, addresses
// =============================================================================

/// `true` when deterministic, a coin flip otherwise.
pub fn any_bool<R: Rng + ?Sized>(rng: &mut R, fuzzy: bool) -> bool {
    if fuzzy { rng.random_bool(0.5) } else { true }
}

/// A member of `values` accepted by `accept`: the first such member when
/// deterministic, a uniform pick otherwise.
pub fn resolve_set_membership<'a, T, R: Rng + ?Sized>(
    values: &'a [T],
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(&T) -> bool,
) -> Result<&'a T, SynthError> {
    let candidates: Vec<&T> = values.iter().filter(|v| accept(v)).collect();
    if candidates.is_empty() {
        return Err(SynthError::Exhausted {
            attempts: values.len(),
        });
    }
    let index = if fuzzy {
        rng.random_range(0..candidates.len())
    } else {
        0
    };
    Ok(candidates[index])
}

/// An IP address of the given version (any version when `None`).
///
/// Deterministic addresses are `1.2.3.4` and `1:2:3:4:5:6:7:8`, stepping the
/// last group upward when rejected. Fuzzy addresses have random octets.
pub fn synthesize_ip<R: Rng + ?Sized>(
    version: Option<IpVersion>,
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(&IpAddr) -> bool,
) -> Result<IpAddr, SynthError> {
    let version = match version {
        Some(v) => v,
        None if fuzzy && rng.random_bool(0.5) => IpVersion::V6,
        None => IpVersion::V4,
    };
    for attempt in 0..MAX_ATTEMPTS {
        let ip = match (version, fuzzy) {
            (IpVersion::V4, false) => {
                IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4u8.wrapping_add(attempt as u8)))
            }
            (IpVersion::V6, false) => {
                IpAddr::V6(Ipv6Addr::new(1, 2, 3, 4, 5, 6, 7, 8 + attempt as u16))
            }
            (IpVersion::V4, true) => IpAddr::V4(Ipv4Addr::from(rng.random::<[u8; 4]>())),
            (IpVersion::V6, true) => IpAddr::V6(Ipv6Addr::from(rng.random::<[u16; 8]>())),
        };
        if accept(&ip) {
            return Ok(ip);
        }
    }
    Err(SynthError::Exhausted {
        attempts: MAX_ATTEMPTS,
    })
}

/// An IP address whose text `accept` agrees to, shaped by a wildcard pattern.
///
/// Complete octets (or IPv6 groups) written before the first wildcard and
/// after the last one are kept in place and the remaining ones are random,
/// so `10.*` yields `10.x.y.z`. The pattern is IPv6 when its literal text
/// contains a `:`.
pub fn ip_from_wildcard<R: Rng + ?Sized>(
    pattern: &WildcardString,
    rng: &mut R,
    accept: &dyn Fn(&IpAddr) -> bool,
) -> Result<IpAddr, SynthError> {
    let v6 = pattern
        .parts
        .iter()
        .any(|p| matches!(p, StringPart::Plain(s) if s.contains(':')));
    let (sep, width) = if v6 { (':', 8) } else { ('.', 4) };
    let parse = |g: &str| {
        if v6 {
            u16::from_str_radix(g, 16).ok()
        } else {
            g.parse::<u8>().ok().map(u16::from)
        }
    };

    let head: Vec<u16> = match pattern.parts.first() {
        Some(StringPart::Plain(s)) if pattern.parts.len() > 1 => {
            let groups: Vec<&str> = s.split(sep).collect();
            groups[..groups.len() - 1]
                .iter()
                .map_while(|&g| parse(g))
                .collect()
        }
        _ => Vec::new(),
    };
    let mut tail: Vec<u16> = match pattern.parts.last() {
        Some(StringPart::Plain(s)) if pattern.parts.len() > 1 => {
            let groups: Vec<&str> = s.split(sep).collect();
            let mut kept: Vec<u16> = groups[1..].iter().rev().map_while(|&g| parse(g)).collect();
            kept.reverse();
            kept
        }
        _ => Vec::new(),
    };
    let head = &head[..head.len().min(width)];
    let excess = tail.len().saturating_sub(width - head.len());
    tail.drain(..excess);

    for _ in 0..MAX_ATTEMPTS {
        let mut groups: Vec<u16> = (0..width)
            .map(|_| {
                if v6 {
                    rng.random::<u16>()
                } else {
                    u16::from(rng.random::<u8>())
                }
            })
            .collect();
        groups[..head.len()].copy_from_slice(head);
        groups[width - tail.len()..].copy_from_slice(&tail);

        let ip = if v6 {
            let mut g = [0u16; 8];
            g.copy_from_slice(&groups);
            IpAddr::V6(Ipv6Addr::from(g))
        } else {
            let octets: Vec<u8> = groups.iter().map(|g| *g as u8).collect();
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
        };
        if accept(&ip) {
            return Ok(ip);
        }
    }
    Err(SynthError::Exhausted {
        attempts: MAX_ATTEMPTS,
    })
}

// =============================================================================
// Dates
// =============================================================================

/// Epoch milliseconds of 2000-01-01T00:00:00Z.
pub const DATE_MIN_MS: i64 = 946_684_800_000;

/// Epoch milliseconds of 2030-01-01T00:00:00Z.
pub const DATE_MAX_MS: i64 = 1_893_456_000_000;

/// An RFC 3339 timestamp with millisecond precision.
///
/// Deterministic dates start at [`DATE_MIN_MS`] and step one second forward
/// when rejected. Fuzzy dates are drawn uniformly up to [`DATE_MAX_MS`].
pub fn synthesize_date<R: Rng + ?Sized>(
    rng: &mut R,
    fuzzy: bool,
    accept: &dyn Fn(&str) -> bool,
) -> Result<String, SynthError> {
    for attempt in 0..MAX_ATTEMPTS as i64 {
        let ms = if fuzzy {
            rng.random_range(DATE_MIN_MS..DATE_MAX_MS)
        } else {
            DATE_MIN_MS + attempt * 1000
        };
        let Some(date) = DateTime::<Utc>::from_timestamp_millis(ms) else {
            continue;
        };
        let text = date.to_rfc3339_opts(SecondsFormat::Millis, true);
        if accept(&text) {
            return Ok(text);
        }
    }
    Err(SynthError::Exhausted {
        attempts: MAX_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn any(_: i64) -> bool {
        true
    }

    #[test]
    fn test_not_equal_string_sentinel() {
        let s = not_equal_string("cmd.exe", &mut rng(), false, &|_| true).unwrap();
        assert_eq!(s, "!cmd.exe");
        let s = not_equal_string("cmd.exe", &mut rng(), false, &|s| s != "!cmd.exe").unwrap();
        assert_eq!(s, "!!cmd.exe");
    }

    #[test]
    fn test_not_equal_string_fuzzy() {
        let s = not_equal_string("abc", &mut rng(), true, &|_| true).unwrap();
        assert_ne!(s, "abc");
        assert_eq!(s.len(), RANDOM_STRING_LEN);
    }

    #[test]
    fn test_not_equal_integer() {
        let mut r = rng();
        assert_eq!(not_equal_integer(0, i64::MIN, i64::MAX, &mut r, false, &any), Ok(1));
        assert_eq!(not_equal_integer(127, -128, 127, &mut r, false, &any), Ok(126));
        assert!(not_equal_integer(0, 0, 0, &mut r, false, &any).is_err());
        let n = not_equal_integer(5, 0, 10, &mut r, true, &any).unwrap();
        assert!(n != 5 && (0..=10).contains(&n));
    }

    #[test]
    fn test_resolve_range_anchors() {
        let none = BTreeSet::new();
        let mut r = rng();
        assert_eq!(resolve_range(0, 4294967295, Anchor::Low, &none, &mut r, false, &any), Ok(0));
        assert_eq!(resolve_range(-10, -1, Anchor::High, &none, &mut r, false, &any), Ok(-1));
        let excluded = BTreeSet::from([0, 1]);
        assert_eq!(resolve_range(0, 5, Anchor::Low, &excluded, &mut r, false, &any), Ok(2));
    }

    #[test]
    fn test_resolve_range_inverted_bounds() {
        let err = resolve_range(1, 0, Anchor::Low, &BTreeSet::new(), &mut rng(), false, &any)
            .unwrap_err();
        assert_eq!(err, SynthError::Boundary { min: 1, max: 0 });
        assert_eq!(err.to_string(), "empty solution space, 1 <= x <= 0");
    }

    #[test]
    fn test_resolve_range_fully_excluded() {
        let excluded = BTreeSet::from([3, 4]);
        let err =
            resolve_range(3, 4, Anchor::Low, &excluded, &mut rng(), true, &any).unwrap_err();
        assert_eq!(err, SynthError::Boundary { min: 3, max: 4 });
    }

    #[test]
    fn test_integer_outside() {
        let mut r = rng();
        assert_eq!(integer_outside(&[80, 443], 0, 65535, &mut r, false, &any), Ok(444));
        assert_eq!(integer_outside(&[254, 255], 0, 255, &mut r, false, &any), Ok(253));
    }

    #[test]
    fn test_string_outside() {
        let values = vec!["a".to_string(), "!a".to_string()];
        assert_eq!(string_outside(&values, &mut rng(), false, &|_| true).unwrap(), "!!a");
    }

    #[test]
    fn test_set_membership() {
        let values = [80, 443, 8080];
        let mut r = rng();
        assert_eq!(resolve_set_membership(&values, &mut r, false, &|_| true), Ok(&80));
        assert_eq!(resolve_set_membership(&values, &mut r, false, &|v| *v != 80), Ok(&443));
        assert!(resolve_set_membership(&values, &mut r, true, &|_| false).is_err());
    }

    #[test]
    fn test_expand_wildcard_shape() {
        let pattern = WildcardString::new("*.ex?");
        let mut r = rng();
        for _ in 0..50 {
            let s = expand_wildcard(&pattern, &mut r);
            assert!(s.len() >= 4 && s.len() < 4 + MAX_WILDCARD_RUN);
            assert_eq!(&s[s.len() - 4..s.len() - 1], ".ex");
            assert!(s.bytes().last().is_some_and(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_resolve_wildcard_plain_rejected() {
        let pattern = WildcardString::new("cmd.exe");
        assert_eq!(resolve_wildcard(&pattern, &mut rng(), &|_| true).unwrap(), "cmd.exe");
        assert_eq!(
            resolve_wildcard(&pattern, &mut rng(), &|_| false),
            Err(SynthError::Exhausted { attempts: 1 })
        );
    }

    #[test]
    fn test_synthesize_ip_deterministic() {
        let mut r = rng();
        let v4 = synthesize_ip(None, &mut r, false, &|_| true).unwrap();
        assert_eq!(v4.to_string(), "1.2.3.4");
        let v6 = synthesize_ip(Some(IpVersion::V6), &mut r, false, &|_| true).unwrap();
        assert_eq!(v6.to_string(), "1:2:3:4:5:6:7:8");
        let next = synthesize_ip(None, &mut r, false, &|ip| ip.to_string() != "1.2.3.4").unwrap();
        assert_eq!(next.to_string(), "1.2.3.5");
    }

    #[test]
    fn test_synthesize_ip_fuzzy_respects_version() {
        let mut r = rng();
        for _ in 0..20 {
            assert!(synthesize_ip(Some(IpVersion::V4), &mut r, true, &|_| true).unwrap().is_ipv4());
            assert!(synthesize_ip(Some(IpVersion::V6), &mut r, true, &|_| true).unwrap().is_ipv6());
        }
    }

    #[test]
    fn test_random_string_rejects() {
        let s = random_string(&mut rng(), 3, &|s| s.starts_with(|c: char| c.is_ascii_uppercase()))
            .unwrap();
        assert!(s.chars().all(|c| c.is_ascii_alphabetic()));
        assert!(random_string(&mut rng(), 3, &|_| false).is_err());
    }

    #[test]
    fn test_any_bool_deterministic() {
        assert!(any_bool(&mut rng(), false));
    }

    #[test]
    fn test_ip_from_wildcard_keeps_complete_octets() {
        let pattern = WildcardString::new("192.168.*.1");
        let ip = ip_from_wildcard(&pattern, &mut rng(), &|_| true).unwrap();
        let IpAddr::V4(v4) = ip else {
            panic!("expected IPv4, got {ip}");
        };
        let octets = v4.octets();
        assert_eq!((octets[0], octets[1], octets[3]), (192, 168, 1));
    }

    #[test]
    fn test_ip_from_wildcard_v6() {
        let pattern = WildcardString::new("fe80::*");
        let ip = ip_from_wildcard(&pattern, &mut rng(), &|_| true).unwrap();
        assert!(ip.is_ipv6());
    }

    #[test]
    fn test_ip_from_wildcard_respects_accept() {
        let pattern = WildcardString::new("10.*");
        let first = ip_from_wildcard(&pattern, &mut rng(), &|_| true).unwrap();
        let second = ip_from_wildcard(&pattern, &mut rng(), &|ip| *ip != first).unwrap();
        assert_ne!(first, second);
        assert!(second.to_string().starts_with("10."));
    }

    #[test]
    fn test_synthesize_date_deterministic() {
        let d = synthesize_date(&mut rng(), false, &|_| true).unwrap();
        assert_eq!(d, "2000-01-01T00:00:00.000Z");
        let d = synthesize_date(&mut rng(), false, &|s| s != "2000-01-01T00:00:00.000Z").unwrap();
        assert_eq!(d, "2000-01-01T00:00:01.000Z");
    }

    #[test]
    fn test_synthesize_date_fuzzy_in_range() {
        let d = synthesize_date(&mut rng(), true, &|_| true).unwrap();
        let parsed = DateTime::parse_from_rfc3339(&d).unwrap();
        let ms = parsed.timestamp_millis();
        assert!((DATE_MIN_MS..DATE_MAX_MS).contains(&ms));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    proptest! {
        #[test]
        fn range_value_within_bounds(lo in -1000i64..1000, span in 0i64..1000, seed: u64, fuzzy: bool) {
            let hi = lo + span;
            let mut rng = StdRng::seed_from_u64(seed);
            let n = resolve_range(lo, hi, Anchor::Low, &BTreeSet::new(), &mut rng, fuzzy, &|_| true).unwrap();
            prop_assert!(lo <= n && n <= hi);
        }

        #[test]
        fn wildcard_expansion_keeps_literal_parts(prefix in "[a-z]{1,6}", suffix in "[a-z.]{1,6}", seed: u64) {
            let pattern = WildcardString::new(&format!("{prefix}*{suffix}"));
            let mut rng = StdRng::seed_from_u64(seed);
            let s = expand_wildcard(&pattern, &mut rng);
            prop_assert!(s.starts_with(&prefix));
            prop_assert!(s.ends_with(&suffix));
        }
    }
}
