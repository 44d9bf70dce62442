//! Concrete operations of the blog client, expressed as mediated operations.
//!
//! Each repository owns a [`ResourceMediator`](crate::mediator::ResourceMediator)
//! whose job namespace is the repository's name, samples connectivity once
//! per call, and hands back the lifecycle stream for the caller to drive.

mod account;
mod blog;

pub use account::{
  AccountRepository, JOB_GET_ACCOUNT_PROPERTIES, JOB_SAVE_ACCOUNT_PROPERTIES, JOB_UPDATE_PASSWORD,
};
pub use blog::{
  blog_list_view, BlogRepository, JOB_IS_AUTHOR_OF_BLOG_POST, JOB_RESTORE_BLOG_LIST_FROM_CACHE,
  JOB_SEARCH_BLOG_POSTS,
};
