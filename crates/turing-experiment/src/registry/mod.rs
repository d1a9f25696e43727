//! Registries of compiled-in experiment engines.
//!
//! A [`Registry`] maps engine names to constructors. Registries are plain
//! values owned by the composition root: engines register during start-up
//! and lookups may then run concurrently from any thread. Constructors run
//! outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use strum::Display;
use tracing::debug;

use crate::error::ExperimentError;
use crate::manager::ExperimentManager;
use crate::runner::ExperimentRunner;

const REGISTRY_TARGET: &str = "turing_experiment::registry";

/// Kind of component a registry constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Component {
    /// Experiment managers.
    #[strum(serialize = "experiment manager")]
    Manager,
    /// Experiment runners.
    #[strum(serialize = "experiment runner")]
    Runner,
}

/// Constructor building a component from an engine configuration.
pub type Constructor<T> = Arc<dyn Fn(&Value) -> Result<Arc<T>, ExperimentError> + Send + Sync>;

/// Name to constructor registry.
pub struct Registry<T: ?Sized> {
    component: Component,
    constructors: RwLock<HashMap<String, Constructor<T>>>,
}

/// Registry of experiment manager constructors.
pub type ManagerRegistry = Registry<dyn ExperimentManager>;

/// Registry of experiment runner constructors.
pub type RunnerRegistry = Registry<dyn ExperimentRunner>;

impl<T: ?Sized> Registry<T> {
    /// Creates an empty registry for `component`.
    #[must_use]
    pub fn new(component: Component) -> Self {
        Self {
            component,
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the kind of component this registry constructs.
    #[must_use]
    pub const fn component(&self) -> Component {
        self.component
    }

    /// Registers `constructor` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::DuplicateRegistration`] when `name` is
    /// already taken.
    pub fn register<F>(&self, name: impl Into<String>, constructor: F) -> Result<(), ExperimentError>
    where
        F: Fn(&Value) -> Result<Arc<T>, ExperimentError> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut constructors = self
            .constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if constructors.contains_key(&name) {
            return Err(ExperimentError::DuplicateRegistration {
                component: self.component,
                name,
            });
        }
        debug!(target: REGISTRY_TARGET, component = %self.component, engine = %name, "registered engine");
        constructors.insert(name, Arc::new(constructor));
        Ok(())
    }

    /// Constructs the component registered under `name` from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::NotFound`] for unknown names and propagates
    /// constructor failures.
    pub fn get(&self, name: &str, config: &Value) -> Result<Arc<T>, ExperimentError> {
        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ExperimentError::NotFound {
                component: self.component,
                name: name.to_owned(),
            })?;
        constructor(config)
    }

    /// Returns `true` when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for Registry<dyn ExperimentManager> {
    fn default() -> Self {
        Self::new(Component::Manager)
    }
}

impl Default for Registry<dyn ExperimentRunner> {
    fn default() -> Self {
        Self::new(Component::Runner)
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("component", &self.component)
            .field("names", &self.names())
            .finish()
    }
}
