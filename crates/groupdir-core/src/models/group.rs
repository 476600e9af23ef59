use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::ParseFailure;

/// A directory group, one `entry` of a group feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Full group address (`groupId`)
    pub address: String,
    /// Lowercased local part of the address
    pub url_name: String,
    pub name: Option<String>,
    pub email_permission: Option<String>,
    pub description: Option<String>,
    pub permission_preset: Option<String>,
    pub direct_member: Option<bool>,
}

impl Group {
    /// Build from the `apps:property` name/value pairs of an entry.
    /// Returns `None` if the entry has no `groupId`.
    pub fn from_properties(properties: &HashMap<String, String>) -> Option<Self> {
        let address = properties.get("groupId")?.clone();
        let text = |name: &str| properties.get(name).cloned();
        Some(Self {
            url_name: url_name(&address),
            address,
            name: text("groupName"),
            email_permission: text("emailPermission"),
            description: text("description"),
            permission_preset: text("permissionPreset"),
            direct_member: properties.get("directMember").and_then(|v| parse_bool(v)),
        })
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// A group membership, as returned when a member is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub member_type: Option<String>,
    pub direct_member: Option<bool>,
}

impl Member {
    pub fn from_properties(properties: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            member_id: properties.get("memberId")?.clone(),
            member_type: properties.get("memberType").cloned(),
            direct_member: properties.get("directMember").and_then(|v| parse_bool(v)),
        })
    }
}

fn url_name(address: &str) -> String {
    match address.split_once('@') {
        Some((local, domain)) if !domain.is_empty() => local.to_lowercase(),
        _ => address.to_lowercase(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn malformed(err: impl std::fmt::Display) -> ParseFailure {
    ParseFailure::Feed(err.to_string())
}

/// Collect the `apps:property` name/value pairs of every `entry` in a feed
/// (or of a lone `entry` document).
pub fn parse_entries(xml: &str) -> Result<Vec<HashMap<String, String>>, ParseFailure> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) if e.local_name().as_ref() == b"entry" => {
                current = Some(HashMap::new());
            }
            Event::End(e) if e.local_name().as_ref() == b"entry" => {
                if let Some(properties) = current.take() {
                    entries.push(properties);
                }
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"property" => {
                let Some(properties) = current.as_mut() else {
                    continue;
                };
                let mut name = None;
                let mut value = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(malformed)?;
                    match attr.key.local_name().as_ref() {
                        b"name" => name = Some(attr.unescape_value().map_err(malformed)?.into_owned()),
                        b"value" => value = Some(attr.unescape_value().map_err(malformed)?.into_owned()),
                        _ => {}
                    }
                }
                if let Some(name) = name {
                    properties.insert(name, value.unwrap_or_default());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

pub fn parse_groups(xml: &str) -> Result<Vec<Group>, ParseFailure> {
    let groups = parse_entries(xml)?
        .iter()
        .filter_map(|properties| {
            let group = Group::from_properties(properties);
            if group.is_none() {
                warn!(?properties, "Skipping group entry without groupId");
            }
            group
        })
        .collect();
    Ok(groups)
}

/// Parse an add-member response. An empty body means the service created the
/// membership without echoing it back.
pub fn parse_member(xml: &str, requested: &str) -> Result<Member, ParseFailure> {
    let entries = parse_entries(xml)?;
    Ok(entries
        .first()
        .and_then(Member::from_properties)
        .unwrap_or_else(|| Member {
            member_id: requested.to_string(),
            member_type: None,
            direct_member: None,
        }))
}

/// Atom entry sent to add `address` to a group.
pub fn member_entry(address: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<atom:entry xmlns:atom="http://www.w3.org/2005/Atom" "#,
            r#"xmlns:apps="http://schemas.google.com/apps/2006" "#,
            r#"xmlns:gd="http://schemas.google.com/g/2005">"#,
            r#"<apps:property name="memberId" value="{}"/></atom:entry>"#
        ),
        quick_xml::escape::escape(address)
    )
}
