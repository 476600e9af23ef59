//! Data models for directory entries.
//!
//! Directory responses are Atom feeds; each `entry` carries its fields as
//! `apps:property` name/value pairs.
//!
//! - `Group`: one group of the domain
//! - `Member`: a group membership

pub mod group;

pub use group::{member_entry, parse_entries, parse_groups, parse_member, Group, Member};
