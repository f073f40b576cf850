//! Data models
//!
//! Database entities, their list filters, and the request inputs that
//! create or update them.

mod asset;
mod category;
mod event;
mod faq;
mod member;
mod pagination;
mod post;
mod role;
mod session;
mod tag;
mod user;

pub use asset::{Asset, AssetFilter, UpdateAssetInput};
pub use category::{
    Category, CategoryTree, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput,
};
pub use event::{CreateEventInput, Event, EventFilter, EventStatus, UpdateEventInput};
pub use faq::{CreateFaqInput, Faq, FaqFilter, UpdateFaqInput};
pub use member::{CreateMemberInput, Member, MemberFilter, UpdateMemberInput};
pub use pagination::{ListParams, PagedResult, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use post::{CreatePostInput, Post, PostFilter, PostStatus, PostWithRelations, UpdatePostInput};
pub use role::{
    all_permission_names, permission_name, CreateRoleInput, Permission, Role,
    RoleWithPermissions, UpdateRoleInput, ACTIONS, RESOURCES,
};
pub use session::Session;
pub use tag::{CreateTagInput, Tag, TagWithCount, UpdateTagInput};
pub use user::{
    CreateAdminInput, CreateUserInput, Principal, UpdateUserInput, User, UserFilter,
    UserStatus, UserWithRoles, UserWithTemporaryPassword, SUPER_ADMIN_ROLE,
};
