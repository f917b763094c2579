//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::provider::{
    CreateInstance, Instance, InstanceAction, InstanceId, LifecycleState, Location, Provider,
    ProviderError, ProviderFuture, SshKey,
};
use crate::shape::Sku;

/// Scripted provider double that returns pre-seeded responses in FIFO
/// order and records every call, so tests can assert scan order and
/// attempt accounting without a real transport.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvider {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    availability: VecDeque<Result<bool, ProviderError>>,
    probes: Vec<(Sku, Location)>,
    reads: VecDeque<Result<Instance, ProviderError>>,
    read_count: usize,
    creates: VecDeque<Result<Instance, ProviderError>>,
    created: Vec<CreateInstance>,
    ssh_keys: Vec<SshKey>,
    ssh_key_queries: usize,
    actions: Vec<(InstanceId, InstanceAction)>,
    listed: Vec<Instance>,
}

impl ScriptedProvider {
    /// Creates a provider double with no queued responses. Unseeded probes
    /// report no capacity; unseeded reads report the instance missing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queues one capacity-probe response.
    pub fn push_probe(&self, response: Result<bool, ProviderError>) {
        self.lock().availability.push_back(response);
    }

    /// Queues one `get_instance` response.
    pub fn push_read(&self, response: Result<Instance, ProviderError>) {
        self.lock().reads.push_back(response);
    }

    /// Queues `get_instance` responses for a sequence of states, all
    /// describing the same instance.
    pub fn push_read_states(&self, template: &Instance, states: &[LifecycleState]) {
        for state in states {
            let mut snapshot = template.clone();
            snapshot.state = *state;
            self.push_read(Ok(snapshot));
        }
    }

    /// Queues one `create_instance` response.
    pub fn push_create(&self, response: Result<Instance, ProviderError>) {
        self.lock().creates.push_back(response);
    }

    /// Replaces the account's registered SSH keys.
    pub fn set_ssh_keys(&self, keys: Vec<SshKey>) {
        self.lock().ssh_keys = keys;
    }

    /// Sets the response for `list_instances`.
    pub fn set_listed(&self, instances: Vec<Instance>) {
        self.lock().listed = instances;
    }

    /// Returns every `(sku, location)` pair probed so far, in order.
    #[must_use]
    pub fn probe_log(&self) -> Vec<(Sku, Location)> {
        self.lock().probes.clone()
    }

    /// Returns locations probed so far, in order.
    #[must_use]
    pub fn probed_locations(&self) -> Vec<Location> {
        self.lock()
            .probes
            .iter()
            .map(|(_, location)| location.clone())
            .collect()
    }

    /// Number of `get_instance` calls made so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.lock().read_count
    }

    /// Number of `list_ssh_keys` calls made so far.
    #[must_use]
    pub fn ssh_key_queries(&self) -> usize {
        self.lock().ssh_key_queries
    }

    /// Every create spec passed to the provider, in order.
    #[must_use]
    pub fn created(&self) -> Vec<CreateInstance> {
        self.lock().created.clone()
    }

    /// Every lifecycle action performed, in order.
    #[must_use]
    pub fn actions(&self) -> Vec<(InstanceId, InstanceAction)> {
        self.lock().actions.clone()
    }
}

/// Builds an instance snapshot for tests.
#[must_use]
pub fn instance(id: &str, state: LifecycleState) -> Instance {
    Instance {
        id: InstanceId::from(id),
        hostname: format!("{id}-host"),
        state,
        sku: Sku::from("1B300.30V"),
        public_ip: None,
        location: None,
        script_id: None,
    }
}

/// Builds a registered SSH key for tests.
#[must_use]
pub fn ssh_key(id: &str) -> SshKey {
    SshKey {
        id: id.to_owned(),
        name: format!("key-{id}"),
    }
}

impl Provider for ScriptedProvider {
    fn list_instances<'a>(&'a self, _status: Option<&'a str>) -> ProviderFuture<'a, Vec<Instance>> {
        let result = Ok(self.lock().listed.clone());
        Box::pin(async move { result })
    }

    fn get_instance<'a>(&'a self, id: &'a InstanceId) -> ProviderFuture<'a, Instance> {
        let result = {
            let mut inner = self.lock();
            inner.read_count += 1;
            inner
                .reads
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::NotFound(id.clone())))
        };
        Box::pin(async move { result })
    }

    fn create_instance<'a>(&'a self, spec: &'a CreateInstance) -> ProviderFuture<'a, Instance> {
        let result = {
            let mut inner = self.lock();
            inner.created.push(spec.clone());
            inner.creates.pop_front().unwrap_or_else(|| {
                Err(ProviderError::Transport(String::from(
                    "no scripted create response",
                )))
            })
        };
        Box::pin(async move { result })
    }

    fn perform_action<'a>(
        &'a self,
        id: &'a InstanceId,
        action: InstanceAction,
    ) -> ProviderFuture<'a, ()> {
        self.lock().actions.push((id.clone(), action));
        Box::pin(async move { Ok(()) })
    }

    fn capacity_available<'a>(
        &'a self,
        sku: &'a Sku,
        _spot: bool,
        location: &'a Location,
    ) -> ProviderFuture<'a, bool> {
        let result = {
            let mut inner = self.lock();
            inner.probes.push((sku.clone(), location.clone()));
            inner.availability.pop_front().unwrap_or(Ok(false))
        };
        Box::pin(async move { result })
    }

    fn list_ssh_keys(&self) -> ProviderFuture<'_, Vec<SshKey>> {
        let result = {
            let mut inner = self.lock();
            inner.ssh_key_queries += 1;
            Ok(inner.ssh_keys.clone())
        };
        Box::pin(async move { result })
    }
}
