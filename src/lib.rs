//! cms-admin - Admin backend for a content management system
//!
//! Users and roles, posts with categories and tags, uploaded assets,
//! members, events, FAQs and site settings behind a permission-checked
//! JSON API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
