// src/utils/cred_def.rs
//! Helpers for AnonCreds schema and credential definition identifiers.
//!
//! Two id shapes circulate in the wallet:
//! - legacy ("unqualified") ids, e.g. `WgWxqztrNooG92RXvxSTWv:3:CL:20:tag`
//! - did:indy qualified ids, e.g.
//!   `did:indy:sovrin:WgWxqztrNooG92RXvxSTWv/anoncreds/v0/CLAIM_DEF/20/tag`
//!
//! Bundle indexes are usually keyed by the legacy form, so lookups also try the
//! unqualified alias of a qualified id.

const INDY_DID_PREFIX: &str = "did:indy:";
const ANONCREDS_PATH: &str = "anoncreds";
const ANONCREDS_VERSION: &str = "v0";
const DEFAULT_CREDENTIAL_NAME: &str = "Credential";

/// Name and version extracted from a legacy schema id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaName {
    pub name: String,
    pub version: String,
}

/// Replaces `_`/`-` with spaces and upper-cases the first letter of every word.
fn humanize(raw: &str) -> String {
    raw.replace(&['_', '-'][..], " ")
        .split(' ')
        .map(upper_first)
        .collect::<Vec<_>>()
        .join(" ")
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parses the human readable name out of a legacy schema id.
///
/// `<did>:2:<name>:<version>` yields `<name>` (humanized) and `<version>`.
/// Anything that does not look like a schema id yields `Credential` / `1.0`.
pub fn parse_schema_from_id(schema_id: Option<&str>) -> SchemaName {
    let fallback = SchemaName {
        name: DEFAULT_CREDENTIAL_NAME.to_string(),
        version: "1.0".to_string(),
    };
    let Some(schema_id) = schema_id else {
        return fallback;
    };

    let parts: Vec<&str> = schema_id.split(':').collect();
    // The marker is a single digit segment followed by a name and a version
    for marker in 1..parts.len().saturating_sub(2) {
        let is_marker = parts[marker].len() == 1
            && parts[marker].chars().all(|c| c.is_ascii_digit());
        if is_marker && !parts[marker + 1].is_empty() {
            return SchemaName {
                name: humanize(parts[marker + 1]),
                version: parts[marker + 2..].join(":"),
            };
        }
    }
    fallback
}

/// Derives a credential name from a credential definition id.
///
/// The tag segment of a five-part legacy id is humanized. Tags that carry no
/// meaning (`default`, `credential`) fall back to the schema name, and finally
/// to `Credential`.
///
/// # Arguments
/// * `cred_def_id` - Credential definition id, if known
/// * `schema_id` - Schema id used when the tag is not descriptive
pub fn parse_cred_def_from_id(cred_def_id: Option<&str>, schema_id: Option<&str>) -> String {
    let mut name = DEFAULT_CREDENTIAL_NAME.to_string();
    if let Some(cred_def_id) = cred_def_id {
        let parts: Vec<&str> = cred_def_id.split(':').filter(|p| !p.is_empty()).collect();
        if parts.len() == 5 {
            name = humanize(parts[4]);
        }
    }

    let lowered = name.to_lowercase();
    if lowered == "default" || lowered == "credential" {
        name = match schema_id {
            Some(_) => parse_schema_from_id(schema_id).name,
            None => DEFAULT_CREDENTIAL_NAME.to_string(),
        };
    }
    name
}

/// Converts arbitrary text to "Start Case".
///
/// Words are split on any non-alphanumeric character, on lower-to-upper case
/// transitions, before the last capital of an acronym run (`XMLFile` gives
/// `XML File`) and between letters and digits. The first letter of every word is
/// upper-cased; the rest is kept as is.
pub fn start_case(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_uppercase()
                    && c.is_uppercase()
                    && next.map(|n| n.is_lowercase()).unwrap_or(false))
                || (prev.is_alphabetic() && c.is_numeric())
                || (prev.is_numeric() && c.is_alphabetic());
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| upper_first(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the legacy (unqualified) form of a did:indy schema or credential
/// definition id, or `None` when the id is not did:indy qualified.
///
/// # Examples
/// `did:indy:sovrin:staging:Ab12/anoncreds/v0/SCHEMA/degree/1.0` gives
/// `Ab12:2:degree:1.0`.
pub fn unqualified_identifier(identifier: &str) -> Option<String> {
    let rest = identifier.strip_prefix(INDY_DID_PREFIX)?;
    let (namespace_and_did, path) = rest.split_once('/')?;
    let (namespace, did) = namespace_and_did.rsplit_once(':')?;
    if namespace.is_empty() || did.is_empty() {
        return None;
    }

    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        [ANONCREDS_PATH, ANONCREDS_VERSION, "SCHEMA", name, version] => {
            Some(format!("{}:2:{}:{}", did, name, version))
        }
        [ANONCREDS_PATH, ANONCREDS_VERSION, "CLAIM_DEF", seq_no, tag] => {
            Some(format!("{}:3:CL:{}:{}", did, seq_no, tag))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cred_def_uses_tag() {
        let name = parse_cred_def_from_id(Some("Q6ZyHkUwPGRpJNv1Ut2Axs:3:CL:12345:student_card"), None);
        assert_eq!(name, "Student Card");

        let name = parse_cred_def_from_id(Some("Q6ZyHkUwPGRpJNv1Ut2Axs:3:CL:12345:employee-id"), None);
        assert_eq!(name, "Employee Id");
    }

    #[test]
    fn test_parse_cred_def_default_tag_falls_back_to_schema() {
        let name = parse_cred_def_from_id(
            Some("Q6ZyHkUwPGRpJNv1Ut2Axs:3:CL:12345:default"),
            Some("Q6ZyHkUwPGRpJNv1Ut2Axs:2:member_card:1.2"),
        );
        assert_eq!(name, "Member Card");

        let name = parse_cred_def_from_id(Some("Q6ZyHkUwPGRpJNv1Ut2Axs:3:CL:12345:default"), None);
        assert_eq!(name, "Credential");
    }

    #[test]
    fn test_parse_cred_def_unrecognised_shape() {
        assert_eq!(parse_cred_def_from_id(Some("not-a-cred-def"), None), "Credential");
        assert_eq!(parse_cred_def_from_id(None, None), "Credential");
    }

    #[test]
    fn test_parse_schema_from_id() {
        let schema = parse_schema_from_id(Some("Q6ZyHkUwPGRpJNv1Ut2Axs:2:unverified_person:0.1.0"));
        assert_eq!(schema.name, "Unverified Person");
        assert_eq!(schema.version, "0.1.0");

        let schema = parse_schema_from_id(Some("garbage"));
        assert_eq!(schema.name, "Credential");
        assert_eq!(schema.version, "1.0");
    }

    #[test]
    fn test_start_case() {
        assert_eq!(start_case("student card"), "Student Card");
        assert_eq!(start_case("Student Card"), "Student Card");
        assert_eq!(start_case("--foo-bar--"), "Foo Bar");
        assert_eq!(start_case("fooBar"), "Foo Bar");
        assert_eq!(start_case("__FOO_BAR__"), "FOO BAR");
        assert_eq!(start_case("XMLFile"), "XML File");
        assert_eq!(start_case("card2"), "Card 2");
        assert_eq!(start_case(""), "");
    }

    #[test]
    fn test_unqualified_identifier() {
        assert_eq!(
            unqualified_identifier("did:indy:sovrin:staging:Ab12/anoncreds/v0/SCHEMA/degree/1.0"),
            Some("Ab12:2:degree:1.0".to_string())
        );
        assert_eq!(
            unqualified_identifier("did:indy:bcovrin:test:Ab12/anoncreds/v0/CLAIM_DEF/20/tag"),
            Some("Ab12:3:CL:20:tag".to_string())
        );
        assert_eq!(unqualified_identifier("Ab12:3:CL:20:tag"), None);
        assert_eq!(unqualified_identifier("did:indy:Ab12/anoncreds/v0/SCHEMA/x/1"), None);
        assert_eq!(
            unqualified_identifier("did:indy:sovrin:Ab12/anoncreds/v0/REV_REG_DEF/1/2/3"),
            None
        );
    }
}
