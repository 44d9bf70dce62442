use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::api::api_types::{ApiBlogListResponse, ApiErrorBody};
use crate::api::OpenApiService;
use crate::config::ApiConfig;
use crate::mediator::ApiOutcome;
use crate::models::{AccountProperties, AuthToken, BlogPost, GenericResponse};

pub const ERROR_CHECK_NETWORK_CONNECTION: &str = "Check network connection.";
pub const ERROR_NETWORK_TIMEOUT: &str = "Network timeout. Please try again.";
pub const ERROR_UNKNOWN: &str = "Unknown error";

/// HTTP client for the blog service
#[derive(Clone)]
pub struct ApiClient {
  client: reqwest::Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid API url '{}': {}", config.url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("openblog/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn endpoint(&self, path: &str) -> std::result::Result<Url, String> {
    self
      .base_url
      .join(path)
      .map_err(|e| format!("Invalid endpoint {}: {}", path, e))
  }

  /// Authenticated request, with an urlencoded form body when `form` is set.
  fn request(
    &self,
    method: Method,
    url: Url,
    auth: &AuthToken,
    form: Option<&[(&str, &str)]>,
  ) -> reqwest::RequestBuilder {
    let request = self
      .client
      .request(method, url)
      .header(header::AUTHORIZATION, auth.header_value());
    match form {
      Some(fields) => request.form(fields),
      None => request,
    }
  }

  /// Send a request and turn whatever happens into exactly one outcome.
  async fn send<T: DeserializeOwned>(
    &self,
    method: Method,
    url: std::result::Result<Url, String>,
    auth: &AuthToken,
    form: Option<&[(&str, &str)]>,
  ) -> ApiOutcome<T> {
    let url = match url {
      Ok(url) => url,
      Err(message) => return ApiOutcome::transport_failure(message),
    };
    debug!(method = %method, url = %url, "Sending request");

    let response = match self.request(method, url, auth, form).send().await {
      Ok(response) => response,
      Err(e) => return transport_outcome(&e),
    };

    let status = response.status();
    match response.bytes().await {
      Ok(body) => outcome_from_parts(status, &body),
      Err(e) => transport_outcome(&e),
    }
  }
}

/// Map a transport fault to a failure with the synthetic status.
fn transport_outcome<T>(err: &reqwest::Error) -> ApiOutcome<T> {
  let message = if err.is_timeout() {
    ERROR_NETWORK_TIMEOUT.to_string()
  } else if err.is_connect() {
    ERROR_CHECK_NETWORK_CONNECTION.to_string()
  } else {
    let message = err.to_string();
    if message.is_empty() {
      ERROR_UNKNOWN.to_string()
    } else {
      message
    }
  };
  debug!(error = %err, "Transport failure");
  ApiOutcome::transport_failure(message)
}

/// Build the outcome of a completed HTTP exchange.
pub(crate) fn outcome_from_parts<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> ApiOutcome<T> {
  let code = status.as_u16();

  if status.is_success() {
    if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
      return ApiOutcome::Empty { status: code };
    }
    return match serde_json::from_slice(body) {
      Ok(body) => ApiOutcome::Success { body, status: code },
      Err(e) => ApiOutcome::Failure {
        status: code,
        message: format!("Failed to parse response: {}", e),
      },
    };
  }

  let message = serde_json::from_slice::<ApiErrorBody>(body)
    .ok()
    .and_then(ApiErrorBody::message)
    .or_else(|| {
      let text = String::from_utf8_lossy(body).trim().to_string();
      (!text.is_empty() && text.len() <= 200).then_some(text)
    })
    .or_else(|| status.canonical_reason().map(String::from))
    .unwrap_or_else(|| ERROR_UNKNOWN.to_string());

  ApiOutcome::Failure {
    status: code,
    message,
  }
}

#[async_trait]
impl OpenApiService for ApiClient {
  async fn get_account_properties(&self, auth: &AuthToken) -> ApiOutcome<AccountProperties> {
    self
      .send(Method::GET, self.endpoint("account/properties"), auth, None)
      .await
  }

  async fn save_account_properties(
    &self,
    auth: &AuthToken,
    email: &str,
    username: &str,
  ) -> ApiOutcome<GenericResponse> {
    let form = [("email", email), ("username", username)];
    self
      .send(
        Method::PUT,
        self.endpoint("account/properties/update"),
        auth,
        Some(&form[..]),
      )
      .await
  }

  async fn update_password(
    &self,
    auth: &AuthToken,
    current_password: &str,
    new_password: &str,
    confirm_new_password: &str,
  ) -> ApiOutcome<GenericResponse> {
    let form = [
      ("old_password", current_password),
      ("new_password", new_password),
      ("confirm_new_password", confirm_new_password),
    ];
    self
      .send(
        Method::PUT,
        self.endpoint("account/change_password/"),
        auth,
        Some(&form[..]),
      )
      .await
  }

  async fn search_blog_posts(
    &self,
    auth: &AuthToken,
    query: &str,
    ordering: &str,
    page: u32,
  ) -> ApiOutcome<Vec<BlogPost>> {
    let url = self.endpoint("blog/list").map(|mut url| {
      url
        .query_pairs_mut()
        .append_pair("search", query)
        .append_pair("ordering", ordering)
        .append_pair("page", &page.to_string());
      url
    });

    self
      .send::<ApiBlogListResponse>(Method::GET, url, auth, None)
      .await
      .map(ApiBlogListResponse::into_posts)
  }

  async fn is_author_of_blog_post(&self, auth: &AuthToken, slug: &str) -> ApiOutcome<GenericResponse> {
    let path = format!("blog/{}/is_author", slug);
    self
      .send(Method::GET, self.endpoint(&path), auth, None)
      .await
  }
}
