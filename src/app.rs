use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cache::SqliteStorage;
use crate::config::Config;
use crate::connectivity::{ConnectivityOracle, ManualConnectivity, TcpProbe};
use crate::mediator::{DisplayHint, LifecycleState, LifecycleStream, Notification};
use crate::models::{
  AccountProperties, AccountView, AuthToken, AuthorshipView, BlogListView, BlogQueryKey,
};
use crate::pagination::BlogPaginator;
use crate::repository::{AccountRepository, BlogRepository};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// Show account properties (cached first, then refreshed)
  Account,
  /// Save account properties
  UpdateAccount {
    #[arg(long)]
    email: String,
    #[arg(long)]
    username: String,
  },
  /// Change the account password
  ChangePassword {
    #[arg(long)]
    current: String,
    #[arg(long)]
    new: String,
    #[arg(long)]
    confirm: String,
  },
  /// Page through blog search results
  Search {
    #[arg(short, long, default_value = "")]
    query: String,
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Show the cached result of a blog search without going online
  Cached {
    #[arg(short, long, default_value = "")]
    query: String,
  },
  /// Check whether you wrote a blog post
  IsAuthor { slug: String },
}

/// Wires the repositories to the concrete cache, service and probe, and
/// runs one command against them.
pub struct App {
  config: Config,
  accounts: AccountRepository,
  blogs: BlogRepository,
}

impl App {
  pub fn new(config: Config, offline: bool) -> Result<Self> {
    let client = ApiClient::new(&config.api)?;
    let connectivity: Arc<dyn ConnectivityOracle> = if offline {
      Arc::new(ManualConnectivity::new(false))
    } else {
      Arc::new(TcpProbe::for_url(
        client.base_url(),
        Duration::from_millis(config.api.probe_timeout_ms),
      )?)
    };

    let cache_path = config.cache_path()?;
    let storage = Arc::new(SqliteStorage::open(&cache_path)?);
    info!(cache = %cache_path.display(), api = %client.base_url(), offline, "Starting");

    let service = Arc::new(client);
    let accounts = AccountRepository::new(
      service.clone(),
      Arc::clone(&storage),
      Arc::clone(&connectivity),
    );
    let blogs = BlogRepository::new(service, storage, connectivity, config.blog.page_size);

    Ok(Self {
      config,
      accounts,
      blogs,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    tokio::select! {
      result = self.execute(command) => result,
      _ = tokio::signal::ctrl_c() => {
        warn!("Interrupted, cancelling active jobs");
        self.accounts.cancel_active_jobs();
        self.blogs.cancel_active_jobs();
        Err(eyre!("Interrupted"))
      }
    }
  }

  async fn execute(&self, command: Command) -> Result<()> {
    match command {
      Command::Account => {
        let auth = Config::get_auth_token()?;
        let stream = self.accounts.get_account_properties(&auth).await?;
        drive(stream, print_account).await?;
      }
      Command::UpdateAccount { email, username } => {
        let auth = Config::get_auth_token()?;
        let properties = AccountProperties {
          pk: auth.account_pk,
          email,
          username,
        };
        let stream = self.accounts.save_account_properties(&auth, &properties).await?;
        drive(stream, print_account).await?;
      }
      Command::ChangePassword {
        current,
        new,
        confirm,
      } => {
        let auth = Config::get_auth_token()?;
        let stream = self
          .accounts
          .update_password(&auth, &current, &new, &confirm)
          .await?;
        drive(stream, print_account).await?;
      }
      Command::Search { query, pages } => {
        let auth = Config::get_auth_token()?;
        self.search(&auth, self.query_key(query), pages).await?;
      }
      Command::Cached { query } => {
        let stream = self
          .blogs
          .restore_blog_list_from_cache(&self.query_key(query), 1)
          .await?;
        drive(stream, print_blog_list).await?;
      }
      Command::IsAuthor { slug } => {
        let auth = Config::get_auth_token()?;
        let stream = self.blogs.is_author_of_blog_post(&auth, &slug).await?;
        drive(stream, print_authorship).await?;
      }
    }
    Ok(())
  }

  fn query_key(&self, query: String) -> BlogQueryKey {
    BlogQueryKey::new(
      query,
      self.config.blog.default_filter.clone(),
      self.config.blog.default_order.clone(),
    )
  }

  /// Load up to `pages` pages, stopping early once the query is exhausted.
  async fn search(&self, auth: &AuthToken, query: BlogQueryKey, pages: u32) -> Result<()> {
    let mut paginator = BlogPaginator::new(query);
    let mut page = paginator.load_first_page();
    let mut loaded = 0;

    loop {
      let mut stream = self
        .blogs
        .search_blog_posts(auth, paginator.query(), page)
        .await?;
      let mut last = None;
      while let Some(state) = stream.next().await {
        paginator.handle_incoming(&state);
        last = Some(state);
      }
      paginator.handle_stream_end();
      loaded += 1;

      match last {
        Some(LifecycleState::ErrorOccurred { notification, .. }) => {
          return Err(eyre!("{}", notification.message));
        }
        Some(LifecycleState::DataAvailable { info: Some(info), .. }) => print_notification(&info),
        _ => {}
      }

      if loaded >= pages {
        break;
      }
      match paginator.next_page() {
        Some(next) => page = next,
        None => break,
      }
    }

    println!(
      "{} posts, page {}{}",
      paginator.posts().len(),
      paginator.page(),
      if paginator.is_query_exhausted() {
        " (no more results)"
      } else {
        ""
      }
    );
    for post in paginator.posts() {
      println!("  {:<30} {:<16} {}", post.slug, post.username, post.title);
    }
    Ok(())
  }
}

/// Print every state of one invocation. An error state becomes the error
/// of the command.
async fn drive<V>(mut stream: LifecycleStream<V>, render: impl Fn(&V)) -> Result<()> {
  let mut finished = false;
  while let Some(state) = stream.next().await {
    match state {
      LifecycleState::Loading { cached, .. } => {
        println!("Loading...");
        if let Some(view) = &cached {
          render(view);
        }
      }
      LifecycleState::DataAvailable { view, info } => {
        if let Some(view) = &view {
          render(view);
        }
        if let Some(info) = &info {
          print_notification(info);
        }
        finished = true;
      }
      LifecycleState::ErrorOccurred { notification, .. } => {
        return Err(eyre!("{}", notification.message));
      }
    }
  }

  if finished {
    Ok(())
  } else {
    Err(eyre!("Cancelled"))
  }
}

fn print_notification(notification: &Notification) {
  match notification.hint {
    DisplayHint::Inline => println!("  {}", notification.message),
    DisplayHint::Toast => println!("» {}", notification.message),
    DisplayHint::Dialog => println!("[!] {}", notification.message),
  }
}

fn print_account(view: &AccountView) {
  match &view.account_properties {
    Some(properties) => println!(
      "#{}  {} <{}>",
      properties.pk, properties.username, properties.email
    ),
    None => println!("No account properties cached"),
  }
}

fn print_blog_list(view: &BlogListView) {
  println!("{} cached posts", view.posts.len());
  for post in &view.posts {
    println!("  {:<30} {:<16} {}", post.slug, post.username, post.title);
  }
}

fn print_authorship(view: &AuthorshipView) {
  if view.is_author {
    println!("You are the author of this post");
  } else {
    println!("You are not the author of this post");
  }
}
