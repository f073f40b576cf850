//! Team member service

use crate::db::repositories::MemberRepository;
use crate::models::{
    CreateMemberInput, ListParams, Member, MemberFilter, PagedResult, UpdateMemberInput,
};
use crate::services::user::validate_email;
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};
use std::sync::Arc;

pub struct MemberService {
    repo: Arc<dyn MemberRepository>,
}

impl MemberService {
    pub fn new(repo: Arc<dyn MemberRepository>) -> Self {
        Self { repo }
    }

    /// Members in display order
    pub async fn list(
        &self,
        filter: &MemberFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Member>> {
        let all = self.repo.list(filter).await?;
        Ok(PagedResult::from_vec(all, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Member> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member"))
    }

    pub async fn create(&self, input: CreateMemberInput) -> ServiceResult<Member> {
        let mut member = Member::from_input(input);
        normalize(&mut member);
        validate(&member)?;
        Ok(self.repo.create(&member).await?)
    }

    pub async fn update(&self, id: i64, input: UpdateMemberInput) -> ServiceResult<Member> {
        let mut member = self.get(id).await?;
        member.apply(input);
        normalize(&mut member);
        validate(&member)?;
        Ok(self.repo.update(&member).await?)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found("Member"));
        }
        Ok(())
    }
}

fn normalize(member: &mut Member) {
    member.name = member.name.trim().to_string();
    member.email = member
        .email
        .take()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
}

fn validate(member: &Member) -> ServiceResult<()> {
    require_non_empty("Name", &member.name)?;
    require_max_len("Name", &member.name, 100)?;
    if let Some(position) = &member.position {
        require_max_len("Position", position, 100)?;
    }
    if let Some(email) = &member.email {
        validate_email(email)?;
    }
    Ok(())
}
