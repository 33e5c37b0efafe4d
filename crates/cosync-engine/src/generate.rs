//! Entry generators.
//!
//! Pure transformations from a source record to a destination record.
//! No directory I/O happens here; a missing required attribute raises
//! [`SyncError::MissingAttribute`], which callers treat as "skip this
//! entry", never as a run failure.

use tracing::warn;

use cosync_core::entry::Entry;
use cosync_core::error::{SyncError, SyncResult};

use crate::layout;

/// Object classes every destination person entry carries.
pub const PERSON_CLASSES: [&str; 3] = ["inetOrgPerson", "person", "posixAccount"];

/// Attributes a source person must have for the entry to be written.
pub const PERSON_REQUIRED: [&str; 6] = ["uid", "cn", "sn", "homeDirectory", "uidNumber", "gidNumber"];

/// Attributes copied only when the source has them.
pub const PERSON_OPTIONAL: [&str; 2] = ["givenName", "mail"];

/// Object classes of a destination organization entry.
pub const ORGANIZATION_CLASSES: [&str; 3] = ["top", "organization", "extensibleObject"];

/// Object classes of the People/Groups container entries.
pub const CONTAINER_CLASSES: [&str; 2] = ["top", "organizationalUnit"];

/// Object classes of a destination group entry.
pub const GROUP_CLASSES: [&str; 1] = ["posixGroup"];

/// Attributes a source group must have for the entry to be written.
pub const GROUP_REQUIRED: [&str; 2] = ["cn", "gidNumber"];

const SSH_KEY_ATTR: &str = "sshPublicKey";
const SSH_KEY_CLASS: &str = "ldapPublicKey";
const PRINCIPAL_ATTR: &str = "eduPersonPrincipalName";
const PRINCIPAL_CLASS: &str = "eduPerson";

/// Build a destination organization entry from a source record.
///
/// Requires `o`; the display name is taken from the source `description`
/// when present, otherwise the organization is still generated without
/// one and a diagnostic is emitted.
pub fn generate_organization(source: &Entry, source_dn: &str) -> SyncResult<Entry> {
    let co = source
        .get_single("o")
        .ok_or_else(|| SyncError::missing_attribute("o", source_dn))?
        .to_string();

    let mut entry = Entry::new();
    for class in ORGANIZATION_CLASSES {
        entry.ensure_value("objectClass", class);
    }
    entry.set("o", co);

    match source.get_single("description") {
        Some(description) => entry.set("displayName", description.to_string()),
        None => warn!(dn = %source_dn, "source organization has no description; displayName not set"),
    }

    Ok(entry)
}

/// Build a container entry (`ou=People` / `ou=Groups`).
pub fn generate_container(ou: &str) -> Entry {
    let mut entry = Entry::new();
    for class in CONTAINER_CLASSES {
        entry.ensure_value("objectClass", class);
    }
    entry.set("ou", ou);
    entry
}

/// Build or merge a destination person entry from a source record.
///
/// When `existing` is given, generation starts from a fresh copy of it so
/// destination-only attributes this tool does not manage are preserved.
/// The base object classes are added only if missing, so repeated
/// application is idempotent. Presence of an SSH public key or a
/// federated principal name augments the class list with the
/// corresponding capability class.
pub fn generate_person(
    source: &Entry,
    source_dn: &str,
    existing: Option<&Entry>,
) -> SyncResult<Entry> {
    let mut entry = existing.cloned().unwrap_or_default();

    for class in PERSON_CLASSES {
        entry.ensure_value("objectClass", class);
    }

    for attribute in PERSON_REQUIRED {
        let values = source
            .get(attribute)
            .ok_or_else(|| SyncError::missing_attribute(attribute, source_dn))?;
        entry.set_values(attribute, values.to_vec());
    }

    for attribute in PERSON_OPTIONAL {
        if let Some(values) = source.get(attribute) {
            entry.set_values(attribute, values.to_vec());
        }
    }

    if let Some(values) = source.get(SSH_KEY_ATTR) {
        entry.set_values(SSH_KEY_ATTR, values.to_vec());
        entry.ensure_value("objectClass", SSH_KEY_CLASS);
    }

    if let Some(values) = source.get(PRINCIPAL_ATTR) {
        entry.set_values(PRINCIPAL_ATTR, values.to_vec());
        entry.ensure_value("objectClass", PRINCIPAL_CLASS);
    }

    Ok(entry)
}

/// Build or merge a destination group entry from a source record.
///
/// The member list is rebuilt from scratch: each source `member` DN is
/// resolved to its `uid` RDN value. A member reference without a `uid`
/// RDN is dropped with a warning; only a missing `cn` or `gidNumber`
/// skips the group itself.
pub fn generate_group(
    source: &Entry,
    source_dn: &str,
    existing: Option<&Entry>,
) -> SyncResult<Entry> {
    let mut entry = existing.cloned().unwrap_or_default();

    for class in GROUP_CLASSES {
        entry.ensure_value("objectClass", class);
    }

    for attribute in GROUP_REQUIRED {
        let values = source
            .get(attribute)
            .ok_or_else(|| SyncError::missing_attribute(attribute, source_dn))?;
        entry.set_values(attribute, values.to_vec());
    }

    entry.set_values("memberUid", member_uids(source, source_dn));

    Ok(entry)
}

/// Resolve a group's `member` DNs to their `uid` RDN values.
pub fn member_uids(source: &Entry, source_dn: &str) -> Vec<String> {
    let mut uids = Vec::new();
    for member in source.get("member").unwrap_or(&[]) {
        match layout::rdn_uid(member) {
            Some(uid) => uids.push(uid),
            None => {
                warn!(member = %member, dn = %source_dn, "member reference has no uid RDN; dropped");
            }
        }
    }
    uids
}
