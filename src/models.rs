use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema-less JSON document as stored in every collection.
pub type Document = Map<String, Value>;

/// Field holding the server-assigned identifier of a document.
pub const ID_FIELD: &str = "_id";

/// Privilege level of an identity. Anything other than `"admin"` is standard.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Standard,
}

/// Identity record from the `users` collection.
///
/// Only `email` and `role` are interpreted; every other profile field is
/// carried through untouched.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Identity {
    pub email: String,
    #[serde(default, deserialize_with = "role_or_standard")]
    pub role: Role,
    #[serde(flatten)]
    pub profile: Document,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// `role: null` and non-string roles fall back to standard privilege.
fn role_or_standard<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if s == "admin" => Role::Admin,
        _ => Role::Standard,
    })
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub email: String,
    pub iat: i64, // issued at, seconds since epoch
    pub exp: i64,
}

/// Acknowledgement of a single-document insert.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: String,
}

/// Outcome of an update or upsert.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<String>,
}

impl UpdateResult {
    pub(crate) fn unmatched() -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 0,
            upserted_id: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Body of `PUT /user/:email`: the upsert outcome plus a freshly issued token.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub result: UpdateResult,
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdminStatus {
    pub admin: bool,
}
