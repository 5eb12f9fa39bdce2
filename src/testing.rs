//! In-memory Kong used by unit tests.

use crate::instance::Instance;
use crate::kong::{
    AdminApiError, Connector, Consumer, GatewayClient, Plugin, PluginScope, ResourceRef, Route,
    Service,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    next_id: u64,
    services: Vec<Service>,
    routes: Vec<Route>,
    consumers: Vec<Consumer>,
    plugins: BTreeMap<String, Plugin>,
    fail_listing: bool,
    fail_updates: bool,
    update_calls: Vec<String>,
}

impl State {
    fn id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", kind, self.next_id)
    }
}

/// Stateful fake; clones share the same store.
#[derive(Clone, Default)]
pub struct FakeKong {
    state: Arc<Mutex<State>>,
}

impl FakeKong {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_service(&self, name: &str) -> Service {
        self.insert_service(Service {
            name: Some(name.to_string()),
            protocol: Some("https".to_string()),
            host: Some(format!("{}.org", name)),
            port: Some(443),
            path: Some("/request".to_string()),
            enabled: Some(true),
            ..Default::default()
        })
    }

    pub fn insert_service(&self, mut service: Service) -> Service {
        self.with_state(|s| {
            if service.id.is_none() {
                service.id = Some(s.id("service"));
            }
            s.services.push(service.clone());
            service
        })
    }

    pub fn add_route(&self, service: &Service, name: &str) -> Route {
        self.insert_route(
            service,
            Route {
                name: Some(name.to_string()),
                paths: vec!["/products".to_string()],
                ..Default::default()
            },
        )
    }

    pub fn insert_route(&self, service: &Service, mut route: Route) -> Route {
        self.with_state(|s| {
            if route.id.is_none() {
                route.id = Some(s.id("route"));
            }
            route.service = service.id.clone().map(ResourceRef::new);
            s.routes.push(route.clone());
            route
        })
    }

    pub fn add_consumer(&self, username: &str) -> Consumer {
        self.with_state(|s| {
            let consumer = Consumer {
                id: Some(s.id("consumer")),
                username: Some(username.to_string()),
                custom_id: None,
            };
            s.consumers.push(consumer.clone());
            consumer
        })
    }

    pub fn plugin(&self, id: &str) -> Option<Plugin> {
        self.with_state(|s| s.plugins.get(id).cloned())
    }

    pub fn plugin_count(&self) -> usize {
        self.with_state(|s| s.plugins.len())
    }

    pub fn fail_listing(&self) {
        self.with_state(|s| s.fail_listing = true);
    }

    pub fn fail_updates(&self) {
        self.with_state(|s| s.fail_updates = true);
    }

    /// Plugin ids passed to `update_plugin`, in call order.
    pub fn update_calls(&self) -> Vec<String> {
        self.with_state(|s| s.update_calls.clone())
    }
}

fn matches(id: &Option<String>, name: &Option<String>, key: &str) -> bool {
    id.as_deref() == Some(key) || name.as_deref() == Some(key)
}

fn in_scope(plugin: &Plugin, scope: PluginScope<'_>) -> bool {
    match scope {
        PluginScope::Service(id) => plugin.service.as_ref().map(|r| r.id.as_str()) == Some(id),
        PluginScope::Route(id) => plugin.route.as_ref().map(|r| r.id.as_str()) == Some(id),
    }
}

#[async_trait]
impl GatewayClient for FakeKong {
    async fn find_service(&self, id_or_name: &str) -> Result<Service, AdminApiError> {
        self.with_state(|s| {
            s.services
                .iter()
                .find(|svc| matches(&svc.id, &svc.name, id_or_name))
                .cloned()
                .ok_or_else(|| AdminApiError::NotFound(format!("/services/{}", id_or_name)))
        })
    }

    async fn find_route(
        &self,
        _service_id: &str,
        id_or_name: &str,
    ) -> Result<Route, AdminApiError> {
        self.with_state(|s| {
            s.routes
                .iter()
                .find(|r| matches(&r.id, &r.name, id_or_name))
                .cloned()
                .ok_or_else(|| AdminApiError::NotFound(format!("/routes/{}", id_or_name)))
        })
    }

    async fn find_consumer(&self, id_or_name: &str) -> Result<Consumer, AdminApiError> {
        self.with_state(|s| {
            s.consumers
                .iter()
                .find(|c| matches(&c.id, &c.username, id_or_name))
                .cloned()
                .ok_or_else(|| AdminApiError::NotFound(format!("/consumers/{}", id_or_name)))
        })
    }

    async fn list_services(&self) -> Result<Vec<Service>, AdminApiError> {
        self.with_state(|s| {
            if s.fail_listing {
                return Err(AdminApiError::Transport("connection refused".to_string()));
            }
            Ok(s.services.clone())
        })
    }

    async fn list_routes_for_service(&self, service_id: &str) -> Result<Vec<Route>, AdminApiError> {
        self.with_state(|s| {
            Ok(s.routes
                .iter()
                .filter(|r| r.service_id() == Some(service_id))
                .cloned()
                .collect())
        })
    }

    async fn create_plugin(
        &self,
        scope: PluginScope<'_>,
        plugin: &Plugin,
    ) -> Result<Plugin, AdminApiError> {
        self.with_state(|s| {
            let mut created = plugin.clone();
            created.id = Some(s.id("plugin"));
            match scope {
                PluginScope::Service(id) => created.service = Some(ResourceRef::new(id)),
                PluginScope::Route(id) => created.route = Some(ResourceRef::new(id)),
            }
            s.plugins
                .insert(created.id.clone().unwrap_or_default(), created.clone());
            Ok(created)
        })
    }

    async fn update_plugin(
        &self,
        scope: PluginScope<'_>,
        plugin_id: &str,
        enabled: bool,
    ) -> Result<Plugin, AdminApiError> {
        self.with_state(|s| {
            s.update_calls.push(plugin_id.to_string());
            if s.fail_updates {
                return Err(AdminApiError::Status {
                    status: 500,
                    body: "update rejected".to_string(),
                });
            }
            match s.plugins.get_mut(plugin_id) {
                Some(plugin) if in_scope(plugin, scope) => {
                    plugin.enabled = enabled;
                    Ok(plugin.clone())
                }
                _ => Err(AdminApiError::NotFound(format!(
                    "{}/{}",
                    scope.plugins_path(),
                    plugin_id
                ))),
            }
        })
    }

    async fn delete_plugin(
        &self,
        scope: PluginScope<'_>,
        plugin_id: &str,
    ) -> Result<(), AdminApiError> {
        self.with_state(|s| {
            let known = s
                .plugins
                .get(plugin_id)
                .is_some_and(|plugin| in_scope(plugin, scope));
            if !known {
                return Err(AdminApiError::NotFound(format!(
                    "{}/{}",
                    scope.plugins_path(),
                    plugin_id
                )));
            }
            s.plugins.remove(plugin_id);
            Ok(())
        })
    }
}

/// Connects every instance to its registered fake; unknown instances fail.
#[derive(Clone, Default)]
pub struct FakeConnector {
    fallback: Option<FakeKong>,
    instances: HashMap<String, FakeKong>,
}

impl FakeConnector {
    /// Every instance talks to the same fake.
    pub fn new(kong: FakeKong) -> Self {
        Self {
            fallback: Some(kong),
            instances: HashMap::new(),
        }
    }

    pub fn with_instance(mut self, name: &str, kong: FakeKong) -> Self {
        self.instances.insert(name.to_string(), kong);
        self
    }
}

impl Connector for FakeConnector {
    fn connect(&self, instance: &Instance) -> Result<Arc<dyn GatewayClient>, AdminApiError> {
        self.instances
            .get(&instance.name)
            .or(self.fallback.as_ref())
            .map(|kong| Arc::new(kong.clone()) as Arc<dyn GatewayClient>)
            .ok_or_else(|| AdminApiError::InvalidClient(format!("no fake for {}", instance.name)))
    }
}
