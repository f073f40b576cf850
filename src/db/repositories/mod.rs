//! Database repositories
//!
//! One repository per entity. Each trait has a `Sqlx*` implementation that
//! dispatches on the configured driver.

mod query;

pub mod asset;
pub mod category;
pub mod dashboard;
pub mod event;
pub mod faq;
pub mod member;
pub mod post;
pub mod role;
pub mod seed;
pub mod session;
pub mod settings;
pub mod tag;
pub mod user;

pub use asset::{AssetRepository, SqlxAssetRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use dashboard::{DashboardRepository, SqlxDashboardRepository, TableCounts};
pub use event::{EventRepository, SqlxEventRepository};
pub use faq::{FaqRepository, SqlxFaqRepository};
pub use member::{MemberRepository, SqlxMemberRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use role::{RoleRepository, SqlxRoleRepository};
pub use seed::{SeedData, SeedRepository, SeedSummary, SqlxSeedRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use settings::{Setting, SettingsRepository, SqlxSettingsRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
