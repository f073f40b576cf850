//! FAQ model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub id: i64,
    pub question: String,
    pub answer: String,
    /// Free-form grouping label
    pub category: Option<String>,
    pub sort_order: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaqFilter {
    pub published: Option<bool>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFaqInput {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFaqInput {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
    pub sort_order: Option<i32>,
    pub is_published: Option<bool>,
}

impl Faq {
    pub fn from_input(input: CreateFaqInput) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            question: input.question,
            answer: input.answer,
            category: input.category,
            sort_order: input.sort_order,
            is_published: input.is_published,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, input: UpdateFaqInput) {
        if let Some(question) = input.question {
            self.question = question;
        }
        if let Some(answer) = input.answer {
            self.answer = answer;
        }
        if input.category.is_some() {
            self.category = input.category;
        }
        if let Some(sort_order) = input.sort_order {
            self.sort_order = sort_order;
        }
        if let Some(is_published) = input.is_published {
            self.is_published = is_published;
        }
        self.updated_at = Utc::now();
    }
}
