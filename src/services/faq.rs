//! FAQ service

use crate::db::repositories::FaqRepository;
use crate::models::{CreateFaqInput, Faq, FaqFilter, ListParams, PagedResult, UpdateFaqInput};
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};
use std::sync::Arc;

pub struct FaqService {
    repo: Arc<dyn FaqRepository>,
}

impl FaqService {
    pub fn new(repo: Arc<dyn FaqRepository>) -> Self {
        Self { repo }
    }

    /// FAQs ordered by `sort_order`
    pub async fn list(&self, filter: &FaqFilter, params: &ListParams) -> ServiceResult<PagedResult<Faq>> {
        let all = self.repo.list(filter).await?;
        Ok(PagedResult::from_vec(all, params))
    }

    pub async fn categories(&self) -> ServiceResult<Vec<String>> {
        Ok(self.repo.list_categories().await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Faq> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("FAQ"))
    }

    pub async fn create(&self, input: CreateFaqInput) -> ServiceResult<Faq> {
        let mut faq = Faq::from_input(input);
        normalize(&mut faq);
        validate(&faq)?;
        Ok(self.repo.create(&faq).await?)
    }

    pub async fn update(&self, id: i64, input: UpdateFaqInput) -> ServiceResult<Faq> {
        let mut faq = self.get(id).await?;
        faq.apply(input);
        normalize(&mut faq);
        validate(&faq)?;
        Ok(self.repo.update(&faq).await?)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found("FAQ"));
        }
        Ok(())
    }
}

fn normalize(faq: &mut Faq) {
    faq.question = faq.question.trim().to_string();
    faq.category = faq
        .category
        .take()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
}

fn validate(faq: &Faq) -> ServiceResult<()> {
    require_non_empty("Question", &faq.question)?;
    require_max_len("Question", &faq.question, 500)?;
    require_non_empty("Answer", &faq.answer)
}
