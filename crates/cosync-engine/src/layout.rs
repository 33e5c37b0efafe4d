//! DN composition and RDN parsing.
//!
//! Every entry the engine touches is addressable by a deterministic DN
//! built from its identifier, its organization, and the store's base DN.

/// Name of the people container under each organization.
pub const PEOPLE_OU: &str = "People";

/// Name of the groups container under each organization.
pub const GROUPS_OU: &str = "Groups";

/// Escape special characters in DN attribute values per RFC 4514.
///
/// Characters that must be escaped: leading/trailing space, leading `#`,
/// the characters `, + " \ < > ; =`, and NUL.
pub fn escape_dn_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let last = value.chars().count() - 1;
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if i == 0 || i == last => result.push_str("\\20"),
            '#' if i == 0 => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

/// RDN of an organization entry.
pub fn org_rdn(co: &str) -> String {
    format!("o={}", escape_dn_value(co))
}

/// DN of an organization entry.
pub fn org_dn(base: &str, co: &str) -> String {
    format!("{},{}", org_rdn(co), base)
}

/// DN of an organization's people container.
pub fn people_dn(base: &str, co: &str) -> String {
    format!("ou={},{}", PEOPLE_OU, org_dn(base, co))
}

/// DN of an organization's groups container.
pub fn groups_dn(base: &str, co: &str) -> String {
    format!("ou={},{}", GROUPS_OU, org_dn(base, co))
}

/// DN of a person entry.
pub fn person_dn(base: &str, co: &str, uid: &str) -> String {
    format!("uid={},{}", escape_dn_value(uid), people_dn(base, co))
}

/// DN of a group entry.
pub fn group_dn(base: &str, co: &str, cn: &str) -> String {
    format!("cn={},{}", escape_dn_value(cn), groups_dn(base, co))
}

/// Undo [`escape_dn_value`]: resolve `\xx` hex pairs and `\c` escapes.
pub fn unescape_dn_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            None => result.push('\\'),
            Some(next) => match chars.peek().and_then(|low| hex_pair(next, *low)) {
                Some(byte) => {
                    chars.next();
                    result.push(byte as char);
                }
                None => result.push(next),
            },
        }
    }
    result
}

fn hex_pair(high: char, low: char) -> Option<u8> {
    let high = high.to_digit(16)?;
    let low = low.to_digit(16)?;
    Some((high * 16 + low) as u8)
}

/// Split off the first RDN of a DN as an `(attribute, value)` pair.
///
/// The value is returned unescaped, so feeding it back into the DN
/// composition helpers round-trips. Returns `None` when the DN has no
/// `attr=value` leading component.
pub fn first_rdn(dn: &str) -> Option<(&str, String)> {
    let rdn = match split_unescaped(dn, ',') {
        Some(index) => &dn[..index],
        None => dn,
    };
    let eq = split_unescaped(rdn, '=')?;
    let attribute = rdn[..eq].trim();
    let value = rdn[eq + 1..].trim();
    if attribute.is_empty() || value.is_empty() {
        return None;
    }
    Some((attribute, unescape_dn_value(value)))
}

/// The `uid` value of a DN whose first RDN is `uid=...`.
pub fn rdn_uid(dn: &str) -> Option<String> {
    first_rdn(dn)
        .filter(|(attribute, _)| attribute.eq_ignore_ascii_case("uid"))
        .map(|(_, value)| value)
}

/// Index of the first occurrence of `needle` not preceded by a backslash.
fn split_unescaped(haystack: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in haystack.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == needle {
            return Some(i);
        }
    }
    None
}
