//! Directory users and group members.
//!
//! Wire types mirror the Admin Directory JSON; the public types are what
//! reconciliation works with.

use serde::Deserialize;

/// A user as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub external_id: String,
    /// Lower-cased primary e-mail.
    pub primary_email: String,
    pub full_name: String,
    pub suspended: bool,
}

/// Kind of group member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberType {
    User,
    Group,
    Other(String),
}

/// Membership status of a group member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberStatus {
    Active,
    Other(String),
}

/// A member of a directory group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub id: String,
    pub email: String,
    pub member_type: MemberType,
    pub status: MemberStatus,
}

impl GroupMember {
    /// Only active, user-typed members count towards role membership.
    #[must_use]
    pub fn is_active_user(&self) -> bool {
        self.member_type == MemberType::User && self.status == MemberStatus::Active
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}

/// One page of a paginated list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Page<T> {
    #[serde(alias = "users", alias = "members", default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiName {
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiUser {
    pub id: String,
    pub primary_email: String,
    #[serde(default)]
    pub name: ApiName,
    #[serde(default)]
    pub suspended: bool,
}

impl From<ApiUser> for RemoteUser {
    fn from(user: ApiUser) -> Self {
        Self {
            external_id: user.id,
            primary_email: user.primary_email.to_lowercase(),
            full_name: user.name.full_name,
            suspended: user.suspended,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMember {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type", default)]
    pub member_type: String,
    #[serde(default)]
    pub status: String,
}

impl From<ApiMember> for GroupMember {
    fn from(member: ApiMember) -> Self {
        let member_type = match member.member_type.as_str() {
            "USER" => MemberType::User,
            "GROUP" => MemberType::Group,
            _ => MemberType::Other(member.member_type),
        };
        let status = match member.status.as_str() {
            "ACTIVE" => MemberStatus::Active,
            _ => MemberStatus::Other(member.status),
        };
        Self {
            id: member.id,
            email: member.email.to_lowercase(),
            member_type,
            status,
        }
    }
}
