use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::api::OpenApiService;
use crate::cache::{CacheStore, EntityStore, SqliteStorage};
use crate::connectivity::ConnectivityOracle;
use crate::mediator::{
  DisplayHint, LifecycleStream, Notification, Operation, OperationConfig, ResourceMediator,
};
use crate::models::{AccountProperties, AccountView, AuthToken, GenericResponse};

pub const JOB_GET_ACCOUNT_PROPERTIES: &str = "get_account_properties";
pub const JOB_SAVE_ACCOUNT_PROPERTIES: &str = "save_account_properties";
pub const JOB_UPDATE_PASSWORD: &str = "update_password";

/// Account properties and password management.
pub struct AccountRepository {
  mediator: ResourceMediator,
  service: Arc<dyn OpenApiService>,
  accounts: Arc<EntityStore<AccountProperties>>,
  connectivity: Arc<dyn ConnectivityOracle>,
}

impl AccountRepository {
  pub fn new(
    service: Arc<dyn OpenApiService>,
    storage: Arc<SqliteStorage>,
    connectivity: Arc<dyn ConnectivityOracle>,
  ) -> Self {
    Self {
      mediator: ResourceMediator::new("AccountRepository"),
      service,
      accounts: Arc::new(EntityStore::new(storage)),
      connectivity,
    }
  }

  pub fn mediator(&self) -> &ResourceMediator {
    &self.mediator
  }

  /// Show the cached account right away, then refresh it from the network.
  pub async fn get_account_properties(&self, auth: &AuthToken) -> Result<LifecycleStream<AccountView>> {
    let config = OperationConfig::network(self.connectivity.is_connected().await)
      .cancel_if_offline(false)
      .load_from_cache_first(true);

    let reader = Arc::clone(&self.accounts);
    let writer = Arc::clone(&self.accounts);
    let service = Arc::clone(&self.service);
    let account_pk = auth.account_pk.to_string();
    let auth = auth.clone();

    let operation = Operation::<AccountProperties, AccountProperties, AccountView>::builder(
      JOB_GET_ACCOUNT_PROPERTIES,
      config,
    )
    .load_from_cache(move || reader.read(&account_pk), AccountView::from)
    .update_local_cache(move |properties: &AccountProperties| writer.write(properties))
    .create_call(move || async move { service.get_account_properties(&auth).await })
    .build()?;

    Ok(self.mediator.invoke(operation))
  }

  /// Submit new account properties. On success the submitted values are
  /// cached and the service's message is shown as a toast.
  pub async fn save_account_properties(
    &self,
    auth: &AuthToken,
    properties: &AccountProperties,
  ) -> Result<LifecycleStream<AccountView>> {
    let config = OperationConfig::network(self.connectivity.is_connected().await)
      .cancel_if_offline(true)
      .load_from_cache_first(false);

    let writer = Arc::clone(&self.accounts);
    let service = Arc::clone(&self.service);
    let submitted = properties.clone();
    let properties = properties.clone();
    let auth = auth.clone();

    let operation = Operation::<AccountProperties, GenericResponse, AccountView>::builder(
      JOB_SAVE_ACCOUNT_PROPERTIES,
      config,
    )
    .update_local_cache(move |_: &GenericResponse| writer.write(&submitted))
    .create_call(move || async move {
      service
        .save_account_properties(&auth, &properties.email, &properties.username)
        .await
    })
    .finish_from_response(toast)
    .build()?;

    Ok(self.mediator.invoke(operation))
  }

  /// Change the password. Nothing is cached.
  pub async fn update_password(
    &self,
    auth: &AuthToken,
    current_password: &str,
    new_password: &str,
    confirm_new_password: &str,
  ) -> Result<LifecycleStream<AccountView>> {
    let config = OperationConfig::network(self.connectivity.is_connected().await)
      .cancel_if_offline(true)
      .load_from_cache_first(false);

    let service = Arc::clone(&self.service);
    let auth = auth.clone();
    let passwords = (
      current_password.to_string(),
      new_password.to_string(),
      confirm_new_password.to_string(),
    );

    let operation =
      Operation::<(), GenericResponse, AccountView>::builder(JOB_UPDATE_PASSWORD, config)
        .create_call(move || async move {
          let (current, new, confirm) = passwords;
          service.update_password(&auth, &current, &new, &confirm).await
        })
        .finish_from_response(toast)
        .build()?;

    Ok(self.mediator.invoke(operation))
  }

  /// Cancel whatever this repository still has in flight.
  pub fn cancel_active_jobs(&self) {
    debug!(
      active = self.mediator.jobs().active_count(),
      "Cancelling account jobs"
    );
    self.mediator.cancel_all();
  }
}

fn toast(response: GenericResponse) -> (Option<AccountView>, Option<Notification>) {
  (
    None,
    Some(Notification::new(response.response, DisplayHint::Toast)),
  )
}
