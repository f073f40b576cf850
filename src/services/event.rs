//! Event service

use crate::db::repositories::EventRepository;
use crate::models::{
    CreateEventInput, Event, EventFilter, ListParams, PagedResult, UpdateEventInput,
};
use crate::services::slug::slug_or_derive;
use crate::services::{require_max_len, require_non_empty, ServiceError, ServiceResult};
use chrono::Utc;
use std::sync::Arc;

pub struct EventService {
    repo: Arc<dyn EventRepository>,
}

impl EventService {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    /// Events ordered by start time
    pub async fn list(
        &self,
        filter: &EventFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Event>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Event> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Event"))
    }

    pub async fn create(&self, input: CreateEventInput) -> ServiceResult<Event> {
        validate_title(&input.title)?;
        let slug = slug_or_derive(input.slug.as_deref(), &input.title)?;
        self.ensure_slug_free(&slug, None).await?;

        let now = Utc::now();
        let event = Event {
            id: 0,
            title: input.title.trim().to_string(),
            slug,
            description: input.description,
            location: input.location,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            status: input.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        check_range(&event)?;
        Ok(self.repo.create(&event).await?)
    }

    pub async fn update(&self, id: i64, input: UpdateEventInput) -> ServiceResult<Event> {
        let mut event = self.get(id).await?;

        if let Some(title) = input.title {
            validate_title(&title)?;
            event.title = title.trim().to_string();
        }
        if let Some(slug) = input.slug {
            let slug = slug_or_derive(Some(&slug), &event.title)?;
            if slug != event.slug {
                self.ensure_slug_free(&slug, Some(id)).await?;
                event.slug = slug;
            }
        }
        if input.description.is_some() {
            event.description = input.description;
        }
        if input.location.is_some() {
            event.location = input.location;
        }
        if let Some(starts_at) = input.starts_at {
            event.starts_at = starts_at;
        }
        if input.ends_at.is_some() {
            event.ends_at = input.ends_at;
        }
        if let Some(status) = input.status {
            event.status = status;
        }
        check_range(&event)?;

        event.updated_at = Utc::now();
        Ok(self.repo.update(&event).await?)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found("Event"));
        }
        Ok(())
    }

    async fn ensure_slug_free(&self, slug: &str, except_id: Option<i64>) -> ServiceResult<()> {
        match self.repo.get_by_slug(slug).await? {
            Some(existing) if Some(existing.id) != except_id => Err(ServiceError::conflict(
                format!("Event slug '{}' already exists", slug),
            )),
            _ => Ok(()),
        }
    }
}

fn validate_title(title: &str) -> ServiceResult<()> {
    require_non_empty("Title", title)?;
    require_max_len("Title", title, 200)
}

fn check_range(event: &Event) -> ServiceResult<()> {
    if !event.has_valid_range() {
        return Err(ServiceError::validation("ends_at cannot be before starts_at"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxEventRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::EventStatus;
    use chrono::{DateTime, Duration};

    async fn setup() -> EventService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        EventService::new(SqlxEventRepository::boxed(pool))
    }

    fn input(title: &str, starts_at: DateTime<Utc>) -> CreateEventInput {
        CreateEventInput {
            title: title.into(),
            slug: None,
            description: None,
            location: Some("Hall A".into()),
            starts_at,
            ends_at: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_range() {
        let service = setup().await;
        let start = Utc::now() + Duration::days(3);
        let mut bad = input("Launch", start);
        bad.ends_at = Some(start - Duration::hours(1));
        assert!(matches!(
            service.create(bad).await.unwrap_err(),
            ServiceError::Validation(_)
        ));

        let mut good = input("Launch", start);
        good.ends_at = Some(start + Duration::hours(2));
        let event = service.create(good).await.unwrap();
        assert_eq!(event.slug, "launch");
        assert_eq!(event.status, EventStatus::Draft);
    }

    #[tokio::test]
    async fn test_update_checks_range_against_stored_end() {
        let service = setup().await;
        let start = Utc::now() + Duration::days(3);
        let mut create = input("Launch", start);
        create.ends_at = Some(start + Duration::hours(2));
        let event = service.create(create).await.unwrap();

        let err = service
            .update(
                event.id,
                UpdateEventInput {
                    starts_at: Some(start + Duration::hours(5)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let updated = service
            .update(
                event.id,
                UpdateEventInput {
                    status: Some(EventStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, EventStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_slug_conflict_and_listing_order() {
        let service = setup().await;
        let now = Utc::now();
        service.create(input("Later", now + Duration::days(9))).await.unwrap();
        service.create(input("Sooner", now + Duration::days(1))).await.unwrap();
        service.create(input("Past", now - Duration::days(1))).await.unwrap();

        assert!(matches!(
            service.create(input("later", now)).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));

        let upcoming = EventFilter {
            upcoming: true,
            ..Default::default()
        };
        let page = service.list(&upcoming, &ListParams::default()).await.unwrap();
        let titles: Vec<_> = page.items.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Sooner", "Later"]);
    }

    #[tokio::test]
    async fn test_update_rejects_empty_slug() {
        let service = setup().await;
        let event = service
            .create(input("Launch", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        let err = service
            .update(
                event.id,
                UpdateEventInput {
                    slug: Some("!!!".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(service.get(event.id).await.unwrap().slug, "launch");
    }
}
