//! Platform → adapter lookup table.
//!
//! The orchestration core is written once against [`AdapterFactory`];
//! concrete adapters register here and are picked by the platform of the
//! store being processed.

use std::{collections::HashMap, sync::Arc};

use shopkeep_core::{adapter::AdapterFactory, review::Platform};

#[derive(Default)]
pub struct AdapterRegistry {
  factories: HashMap<Platform, Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `factory` under its own platform, replacing any previous
  /// registration.
  pub fn register(&mut self, factory: Arc<dyn AdapterFactory>) {
    self.factories.insert(factory.platform(), factory);
  }

  pub fn get(&self, platform: Platform) -> Option<Arc<dyn AdapterFactory>> {
    self.factories.get(&platform).cloned()
  }

  pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
    self.factories.keys().copied()
  }
}
