//! Plugin kernel: discovery, validation, initialisation, teardown.
//!
//! # Responsibility
//! - Own every plugin instance and its descriptor.
//! - Drive `Unloaded -> Validated -> Initialized`, or `-> Failed`.
//! - Commit a plugin's staged contributions only after it initialises.
//!
//! # Invariants
//! - One failing plugin never aborts loading of the others.
//! - A failed plugin contributes nothing and holds no bus subscriptions.
//! - Plugin ids are unique within one kernel.

use crate::plugin::catalog::PluginCatalog;
use crate::plugin::context::{HostServices, PluginContext, PluginError};
use crate::plugin::descriptor::{is_valid_plugin_id, PluginDescriptor, PluginState};
use crate::plugin::version::{HostVersion, PluginValidator};
use crate::shell::contribution::ContributionRegistry;
use crate::shell::ShellSurface;
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Contract implemented by every feature plugin.
///
/// Construction must be infallible; `initialise` is the only fallible hook.
pub trait Plugin: Send {
    fn id(&self) -> &str;

    /// Declared host version and how it is compared.
    fn validator(&self) -> PluginValidator;

    fn initialise(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError>;

    /// Called once at kernel shutdown for initialised plugins.
    fn teardown(&mut self) {}
}

/// Discovery-time kernel errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    DuplicatePluginId(String),
    InvalidPluginId(String),
}

impl Display for KernelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicatePluginId(id) => write!(f, "plugin id already registered: {id}"),
            Self::InvalidPluginId(id) => write!(f, "invalid plugin id: `{id}`"),
        }
    }
}

impl Error for KernelError {}

/// Outcome of one [`PluginKernel::load_all`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub initialized: Vec<String>,
    pub failed: Vec<(String, PluginError)>,
}

struct LoadedPlugin {
    descriptor: PluginDescriptor,
    plugin: Box<dyn Plugin>,
}

pub struct PluginKernel {
    host_version: HostVersion,
    services: HostServices,
    registry: ContributionRegistry,
    plugins: Vec<LoadedPlugin>,
    disabled: BTreeSet<String>,
}

impl PluginKernel {
    pub fn new(host_version: HostVersion, services: HostServices) -> Self {
        let registry = ContributionRegistry::new(services.door_keeper.clone());
        Self {
            host_version,
            services,
            registry,
            plugins: Vec::new(),
            disabled: BTreeSet::new(),
        }
    }

    /// Plugins with these ids are recorded as failed instead of initialised.
    pub fn with_disabled<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Adds one plugin in the `Unloaded` state.
    pub fn discover(&mut self, plugin: Box<dyn Plugin>) -> Result<(), KernelError> {
        let id = plugin.id().trim().to_string();
        if !is_valid_plugin_id(&id) {
            return Err(KernelError::InvalidPluginId(id));
        }
        if self.plugins.iter().any(|loaded| loaded.descriptor.id == id) {
            return Err(KernelError::DuplicatePluginId(id));
        }

        let descriptor = PluginDescriptor::discovered(&id, plugin.validator());
        info!(
            "event=plugin_discover module=plugin status=ok plugin_id={id} declared={} mode={}",
            descriptor.declared_version,
            descriptor.mode.as_str()
        );
        self.plugins.push(LoadedPlugin { descriptor, plugin });
        Ok(())
    }

    /// Discovers every plugin of `catalog`; rejected ones are logged and returned.
    pub fn discover_catalog(&mut self, catalog: &PluginCatalog) -> Vec<KernelError> {
        let mut rejected = Vec::new();
        for plugin in catalog.instantiate() {
            if let Err(err) = self.discover(plugin) {
                warn!("event=plugin_discover module=plugin status=error error={err}");
                rejected.push(err);
            }
        }
        rejected
    }

    /// Validates and initialises every `Unloaded` plugin in discovery order.
    pub fn load_all(&mut self) -> LoadReport {
        let mut report = LoadReport::default();
        for loaded in self.plugins.iter_mut() {
            if loaded.descriptor.state != PluginState::Unloaded {
                continue;
            }
            let id = loaded.descriptor.id.clone();

            match load_one(
                loaded,
                self.host_version,
                &self.disabled,
                &self.services,
                &mut self.registry,
            ) {
                Ok(()) => report.initialized.push(id),
                Err(err) => report.failed.push((id, err)),
            }
        }
        info!(
            "event=plugin_load_all module=plugin status=ok initialized={} failed={}",
            report.initialized.len(),
            report.failed.len()
        );
        report
    }

    pub fn state(&self, id: &str) -> Option<PluginState> {
        self.descriptor(id).map(|descriptor| descriptor.state)
    }

    pub fn descriptor(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins
            .iter()
            .map(|loaded| &loaded.descriptor)
            .find(|descriptor| descriptor.id == id)
    }

    /// Descriptors in discovery order.
    pub fn descriptors(&self) -> Vec<&PluginDescriptor> {
        self.plugins.iter().map(|loaded| &loaded.descriptor).collect()
    }

    pub fn registry(&self) -> &ContributionRegistry {
        &self.registry
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }

    pub fn host_version(&self) -> HostVersion {
        self.host_version
    }

    pub fn render_into(&self, shell: &mut dyn ShellSurface) {
        self.registry.render_into(shell);
    }

    /// Tears down initialised plugins in reverse order and drops all descriptors.
    pub fn shutdown(&mut self) {
        for loaded in self.plugins.iter_mut().rev() {
            if loaded.descriptor.state != PluginState::Initialized {
                continue;
            }
            let id = loaded.descriptor.id.as_str();
            if catch_unwind(AssertUnwindSafe(|| loaded.plugin.teardown())).is_err() {
                error!("event=plugin_teardown module=plugin status=error plugin_id={id} error=teardown_panicked");
            }
            let subscriptions = self.services.bus.unsubscribe_owner(id);
            let contributions = self.registry.remove_owner(id);
            info!(
                "event=plugin_teardown module=plugin status=ok plugin_id={id} subscriptions={subscriptions} contributions={contributions}"
            );
        }
        self.plugins.clear();
    }
}

impl Drop for PluginKernel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn load_one(
    loaded: &mut LoadedPlugin,
    host_version: HostVersion,
    disabled: &BTreeSet<String>,
    services: &HostServices,
    registry: &mut ContributionRegistry,
) -> Result<(), PluginError> {
    let descriptor = &mut loaded.descriptor;
    let id = descriptor.id.clone();

    if disabled.contains(&id) {
        info!("event=plugin_load module=plugin status=skip plugin_id={id} reason=disabled");
        descriptor.fail(PluginError::Disabled);
        return Err(PluginError::Disabled);
    }

    if !descriptor.validator().is_compatible_with(host_version) {
        let err = PluginError::Compatibility {
            declared: descriptor.declared_version,
            host: host_version,
            mode: descriptor.mode,
        };
        warn!("event=plugin_validate module=plugin status=error plugin_id={id} error={err}");
        descriptor.fail(err.clone());
        return Err(err);
    }
    descriptor.state = PluginState::Validated;

    let mut ctx = PluginContext::new(&id, services);
    let outcome = catch_unwind(AssertUnwindSafe(|| loaded.plugin.initialise(&mut ctx)))
        .unwrap_or_else(|_| Err(PluginError::Initialization("initialise panicked".to_string())));

    if let Err(err) = outcome {
        let removed = services.bus.unsubscribe_owner(&id);
        error!(
            "event=plugin_initialise module=plugin status=error plugin_id={id} error={err} removed_subscriptions={removed}"
        );
        loaded.descriptor.fail(err.clone());
        return Err(err);
    }

    let staged = ctx.into_staged();
    let contributions = staged.len();
    for (kind, contribution) in staged {
        registry.register(kind, &id, contribution);
    }
    loaded.descriptor.state = PluginState::Initialized;
    info!(
        "event=plugin_initialise module=plugin status=ok plugin_id={id} contributions={contributions}"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{KernelError, Plugin, PluginKernel};
    use crate::bus::NotificationBus;
    use crate::db::DataSession;
    use crate::factory::{ComponentFactory, FactoryError};
    use crate::plugin::context::{HostServices, PluginContext, PluginError};
    use crate::plugin::descriptor::PluginState;
    use crate::plugin::version::{HostVersion, PluginValidator};
    use crate::repo::TagRepository;
    use crate::security::door_keeper::DoorKeeper;
    use crate::shell::contribution::{MenuContribution, MenuKind};
    use crate::shell::navigation::NavigationHost;
    use crate::shell::status::StatusBoard;
    use std::sync::Arc;

    const HOST: HostVersion = HostVersion::new(3, 1, 0, 0);

    fn services() -> HostServices {
        HostServices {
            door_keeper: Arc::new(DoorKeeper::new()),
            components: Arc::new(ComponentFactory::new()),
            navigation: Arc::new(NavigationHost::new()),
            bus: Arc::new(NotificationBus::new()),
            status: Arc::new(StatusBoard::new()),
            data: Arc::new(DataSession::open_in_memory().expect("in-memory session")),
        }
    }

    enum Behaviour {
        Succeed,
        FailAfterStaging,
        Panic,
        NeedsTags,
    }

    struct ScriptedPlugin {
        id: &'static str,
        validator: PluginValidator,
        behaviour: Behaviour,
    }

    impl ScriptedPlugin {
        fn boxed(id: &'static str, declared: HostVersion, behaviour: Behaviour) -> Box<Self> {
            Box::new(Self {
                id,
                validator: PluginValidator::minimum(declared),
                behaviour,
            })
        }
    }

    impl Plugin for ScriptedPlugin {
        fn id(&self) -> &str {
            self.id
        }

        fn validator(&self) -> PluginValidator {
            self.validator
        }

        fn initialise(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
            ctx.subscribe("scripted.event", |_| Ok(()));
            ctx.add_to_application_menu(MenuContribution::new(self.id, || Ok(())));
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::FailAfterStaging => {
                    Err(PluginError::Initialization("refused".to_string()))
                }
                Behaviour::Panic => panic!("scripted plugin exploded"),
                Behaviour::NeedsTags => ctx.resolve::<dyn TagRepository>().map(|_| ()),
            }
        }
    }

    #[test]
    fn failed_plugins_are_isolated_and_leave_nothing_behind() {
        let mut kernel = PluginKernel::new(HOST, services());
        let too_new = HostVersion::new(4, 0, 0, 0);
        kernel
            .discover(ScriptedPlugin::boxed("future", too_new, Behaviour::Succeed))
            .expect("discover future");
        kernel
            .discover(ScriptedPlugin::boxed("refuses", HOST, Behaviour::FailAfterStaging))
            .expect("discover refuses");
        kernel
            .discover(ScriptedPlugin::boxed("panics", HOST, Behaviour::Panic))
            .expect("discover panics");
        kernel
            .discover(ScriptedPlugin::boxed("healthy", HOST, Behaviour::Succeed))
            .expect("discover healthy");

        let report = kernel.load_all();
        assert_eq!(report.initialized, vec!["healthy".to_string()]);
        assert_eq!(report.failed.len(), 3);
        assert!(matches!(
            kernel.descriptor("future").and_then(|d| d.failure.clone()),
            Some(PluginError::Compatibility { .. })
        ));
        assert_eq!(kernel.state("refuses"), Some(PluginState::Failed));
        assert_eq!(kernel.state("panics"), Some(PluginState::Failed));
        assert_eq!(kernel.state("healthy"), Some(PluginState::Initialized));

        let menu = kernel.registry().entries(MenuKind::Application);
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].owner(), "healthy");
        assert_eq!(kernel.services().bus.subscriber_count("scripted.event"), 1);
    }

    #[test]
    fn missing_capability_fails_initialisation_only_for_that_plugin() {
        let mut kernel = PluginKernel::new(HOST, services());
        kernel
            .discover(ScriptedPlugin::boxed("needs_tags", HOST, Behaviour::NeedsTags))
            .expect("discover needs_tags");
        kernel
            .discover(ScriptedPlugin::boxed("sibling", HOST, Behaviour::Succeed))
            .expect("discover sibling");

        let report = kernel.load_all();
        assert_eq!(report.initialized, vec!["sibling".to_string()]);

        let failed = kernel.descriptor("needs_tags").expect("descriptor");
        assert_eq!(failed.state, PluginState::Failed);
        assert!(matches!(
            failed.failure,
            Some(PluginError::Capability(FactoryError::MissingCapability(_)))
        ));
        assert_eq!(kernel.state("sibling"), Some(PluginState::Initialized));
        let menu = kernel.registry().entries(MenuKind::Application);
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].owner(), "sibling");
        assert_eq!(kernel.services().bus.subscriber_count("scripted.event"), 1);
    }

    #[test]
    fn duplicate_and_invalid_ids_are_rejected_at_discovery() {
        let mut kernel = PluginKernel::new(HOST, services());
        kernel
            .discover(ScriptedPlugin::boxed("same", HOST, Behaviour::Succeed))
            .expect("first discover");
        assert_eq!(
            kernel.discover(ScriptedPlugin::boxed("same", HOST, Behaviour::Succeed)),
            Err(KernelError::DuplicatePluginId("same".to_string()))
        );
        assert!(matches!(
            kernel.discover(ScriptedPlugin::boxed("Bad Id", HOST, Behaviour::Succeed)),
            Err(KernelError::InvalidPluginId(_))
        ));
    }

    #[test]
    fn disabled_plugins_are_skipped() {
        let mut kernel = PluginKernel::new(HOST, services()).with_disabled(["off"]);
        kernel
            .discover(ScriptedPlugin::boxed("off", HOST, Behaviour::Succeed))
            .expect("discover off");

        let report = kernel.load_all();
        assert_eq!(report.failed, vec![("off".to_string(), PluginError::Disabled)]);
        assert!(kernel.registry().is_empty());
    }

    #[test]
    fn shutdown_removes_contributions_and_subscriptions() {
        let services = services();
        let bus = Arc::clone(&services.bus);
        let mut kernel = PluginKernel::new(HOST, services);
        kernel
            .discover(ScriptedPlugin::boxed("healthy", HOST, Behaviour::Succeed))
            .expect("discover");
        kernel.load_all();
        assert_eq!(bus.subscriber_count("scripted.event"), 1);

        kernel.shutdown();
        assert_eq!(bus.subscriber_count("scripted.event"), 0);
        assert!(kernel.registry().is_empty());
        assert!(kernel.descriptors().is_empty());
    }
}
