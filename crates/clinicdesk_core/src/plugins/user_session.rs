//! User session plugin: connection screen, login/logout, account creation.
//!
//! # Invariants
//! - Credentials are checked inside a unit of work; the gate session is
//!   installed only after that unit of work has closed.
//! - A failed login leaves the previous session and navigation untouched.

use crate::bus::{EVENT_USER_ADDED, EVENT_USER_CONNECTED, EVENT_USER_DISCONNECTED};
use crate::model::user::{NewUser, User};
use crate::plugin::context::{HostServices, PluginContext, PluginError};
use crate::plugin::kernel::Plugin;
use crate::plugin::version::PluginValidator;
use crate::plugins::{fill_slot, guard, report, ViewSlot, MIN_HOST_VERSION};
use crate::repo::{RepoResult, UserRepository};
use crate::security::door_keeper::SessionContext;
use crate::security::permission::PermissionLevel;
use crate::shell::contribution::{ActionError, CommandResult, MenuContribution};
use crate::shell::navigation::View;
use crate::shell::status::StatusLevel;
use log::info;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};

pub const PLUGIN_ID: &str = "builtin.user_session";
pub const MENU_TEXT: &str = "Connection";
pub const ADD_USER_TEXT: &str = "Add user";

/// Checks credentials and opens a session on success.
pub fn connect(
    services: &HostServices,
    login: &str,
    password: &str,
) -> Result<SessionContext, ActionError> {
    let users = services
        .resolve::<dyn UserRepository>()
        .map_err(|err| ActionError::Failed(err.to_string()))?;
    let found = services
        .data
        .run(|uow| users.can_connect(uow, login, password))
        .map_err(ActionError::from);
    let user = match found {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("event=connect module=plugins status=error reason=bad_credentials");
            let err = ActionError::Failed("invalid login or password".to_string());
            services.write_status(StatusLevel::Warning, &format!("{MENU_TEXT}: {err}"));
            return Err(err);
        }
        Err(err) => {
            services.write_status(StatusLevel::Error, &format!("{MENU_TEXT}: {err}"));
            return Err(err);
        }
    };

    let session = SessionContext::new(user.id, user.display_name(), user.permission);
    services.door_keeper.login(session.clone());
    services.navigation.show_main_menu();
    services.write_status(
        StatusLevel::Info,
        &format!("Connected as {}", session.display_name),
    );
    services.bus.publish(
        EVENT_USER_CONNECTED,
        json!({ "id": user.id, "login": user.login }),
    );
    Ok(session)
}

/// Closes the current session. Returns whether one was open.
pub fn disconnect(services: &HostServices) -> bool {
    let Some(session) = services.door_keeper.logout() else {
        return false;
    };
    services.write_status(
        StatusLevel::Info,
        &format!("{} disconnected", session.display_name),
    );
    services
        .bus
        .publish(EVENT_USER_DISCONNECTED, json!({ "id": session.user_id }));
    true
}

/// Creates an account for an admin session, then announces it.
///
/// Failures are reported to the status sink like the "Add user" form.
pub fn add_user(services: &HostServices, user: &NewUser) -> Result<User, ActionError> {
    let result = services
        .resolve::<dyn UserRepository>()
        .map_err(|err| ActionError::Failed(err.to_string()))
        .and_then(|users| create_account(services, users.as_ref(), user));
    report(services, ADD_USER_TEXT, result)
}

fn create_account(
    services: &HostServices,
    users: &dyn UserRepository,
    user: &NewUser,
) -> Result<User, ActionError> {
    guard(services, ADD_USER_TEXT, PermissionLevel::Admin)?;
    let created = services.data.run(|uow| users.create_user(uow, user))?;
    services.write_status(
        StatusLevel::Info,
        &format!("User `{}` added", created.login),
    );
    services.bus.publish(
        EVENT_USER_ADDED,
        json!({ "id": created.id, "login": created.login }),
    );
    Ok(created)
}

/// Connection screen listing the known accounts.
pub struct ConnectionView {
    services: HostServices,
    users: Arc<dyn UserRepository>,
    rows: Mutex<Vec<User>>,
}

impl ConnectionView {
    pub fn refresh(&self) -> RepoResult<()> {
        let rows = self.services.data.run(|uow| self.users.list_users(uow))?;
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = rows;
        Ok(())
    }

    pub fn users(&self) -> Vec<User> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn connect(&self, login: &str, password: &str) -> Result<SessionContext, ActionError> {
        connect(&self.services, login, password)
    }

    pub fn disconnect(&self) -> bool {
        disconnect(&self.services)
    }
}

impl View for ConnectionView {
    fn name(&self) -> &str {
        "connection"
    }
}

/// Account creation form, reached from the "Add user" context entry.
pub struct AddUserView {
    services: HostServices,
    users: Arc<dyn UserRepository>,
    connection: Arc<ConnectionView>,
}

impl AddUserView {
    /// Creates the account and returns to the connection screen.
    pub fn submit(&self, user: &NewUser) -> CommandResult {
        report(&self.services, ADD_USER_TEXT, self.try_submit(user))
    }

    fn try_submit(&self, user: &NewUser) -> CommandResult {
        create_account(&self.services, self.users.as_ref(), user)?;
        self.services
            .navigation
            .navigate(self.connection.clone(), ADD_USER_TEXT);
        Ok(())
    }
}

impl View for AddUserView {
    fn name(&self) -> &str {
        "add_user"
    }
}

#[derive(Default)]
pub struct UserSessionPlugin {
    connection: ViewSlot<ConnectionView>,
    add_user: ViewSlot<AddUserView>,
}

impl UserSessionPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_slot(&self) -> ViewSlot<ConnectionView> {
        Arc::clone(&self.connection)
    }

    pub fn add_user_slot(&self) -> ViewSlot<AddUserView> {
        Arc::clone(&self.add_user)
    }
}

impl Plugin for UserSessionPlugin {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    fn validator(&self) -> PluginValidator {
        PluginValidator::minimum(MIN_HOST_VERSION)
    }

    fn initialise(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        let users = ctx.resolve::<dyn UserRepository>()?;
        let services = ctx.services().clone();
        let connection = Arc::new(ConnectionView {
            services: services.clone(),
            users: Arc::clone(&users),
            rows: Mutex::new(Vec::new()),
        });
        let add_user = Arc::new(AddUserView {
            services: services.clone(),
            users,
            connection: Arc::clone(&connection),
        });

        let view = Arc::clone(&connection);
        let menu_services = services.clone();
        ctx.add_to_application_menu(
            MenuContribution::new(MENU_TEXT, move || {
                report(&menu_services, MENU_TEXT, view.refresh().map_err(Into::into))?;
                menu_services.navigation.navigate(view.clone(), MENU_TEXT);
                Ok(())
            })
            .with_icon("connection")
            .with_order(1),
        );

        let form = Arc::clone(&add_user);
        ctx.add_to_context_menu(
            MenuContribution::new(ADD_USER_TEXT, move || {
                services.navigation.navigate(form.clone(), ADD_USER_TEXT);
                Ok(())
            })
            .with_icon("add_user")
            .with_order(10)
            .requires(PermissionLevel::Admin),
        );

        let view = Arc::clone(&connection);
        ctx.subscribe(EVENT_USER_ADDED, move |_| Ok(view.refresh()?));

        fill_slot(&self.connection, connection)?;
        fill_slot(&self.add_user, add_user)
    }
}
