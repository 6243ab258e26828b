//! Static catalog of plugin constructors.

use crate::plugin::kernel::Plugin;

type Constructor = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Ordered list of plugin constructors the kernel discovers from.
#[derive(Default)]
pub struct PluginCatalog {
    constructors: Vec<Constructor>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, constructor: impl Fn() -> Box<dyn Plugin> + Send + Sync + 'static) -> Self {
        self.add(constructor);
        self
    }

    pub fn add(&mut self, constructor: impl Fn() -> Box<dyn Plugin> + Send + Sync + 'static) {
        self.constructors.push(Box::new(constructor));
    }

    /// Builds one fresh instance per constructor, in catalog order.
    pub fn instantiate(&self) -> Vec<Box<dyn Plugin>> {
        self.constructors.iter().map(|constructor| constructor()).collect()
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}
