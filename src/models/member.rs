//! Team member model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    /// Lower values are listed first
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMemberInput {
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMemberInput {
    pub name: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl Member {
    pub fn from_input(input: CreateMemberInput) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: input.name,
            position: input.position,
            bio: input.bio,
            email: input.email,
            photo_url: input.photo_url,
            sort_order: input.sort_order,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, input: UpdateMemberInput) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if input.position.is_some() {
            self.position = input.position;
        }
        if input.bio.is_some() {
            self.bio = input.bio;
        }
        if input.email.is_some() {
            self.email = input.email;
        }
        if input.photo_url.is_some() {
            self.photo_url = input.photo_url;
        }
        if let Some(sort_order) = input.sort_order {
            self.sort_order = sort_order;
        }
        if let Some(is_active) = input.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_defaults_active() {
        let input: CreateMemberInput = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
        assert!(input.is_active);
        assert_eq!(input.sort_order, 0);
    }

    #[test]
    fn test_apply_keeps_unset_fields() {
        let input: CreateMemberInput =
            serde_json::from_str(r#"{"name":"Ada","position":"CTO"}"#).unwrap();
        let mut member = Member::from_input(input);
        member.apply(UpdateMemberInput {
            sort_order: Some(3),
            ..Default::default()
        });
        assert_eq!(member.position.as_deref(), Some("CTO"));
        assert_eq!(member.sort_order, 3);
    }
}
