mod cache;
mod types;

pub use cache::{
  BlogQueryKey, BLOG_ORDER_ASC, BLOG_ORDER_DESC, ORDER_BY_DATE_UPDATED, ORDER_BY_USERNAME,
};
pub use types::{
  AccountProperties, AccountView, AuthToken, AuthorshipView, BlogListView, BlogPost,
  GenericResponse,
};
