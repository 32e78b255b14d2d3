use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::analytics::callback::DebugCallback;
use crate::analytics::config::{debug_enabled, Config};
use crate::analytics::constants::{
    ANONYMOUS_ID_PREFIX, BATCH_SIZE, DEPLOYMENT_ID_PROPERTY, FLUSH_INTERVAL,
};
use crate::analytics::deployment::Deployment;
use crate::transport::constants::LOG_TARGET;
use crate::transport::{
    BatchingClient, CoreClient, CoreConfig, Group, Message, NoopClient, Properties, Track,
};
use uuid::Uuid;

type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone, Debug, Default)]
struct Identity {
    deployment_id: Option<String>,
    deployment: Option<Deployment>,
}

/// Identity fields behind a single mutex. Callers only get closures run under the lock.
#[derive(Debug, Default)]
struct IdentityCell(Mutex<Identity>);

impl IdentityCell {
    fn read<R>(&self, f: impl FnOnce(&Identity) -> R) -> R {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    fn update(&self, f: impl FnOnce(&mut Identity)) {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}

/// Analytics client shared by the whole process.
///
/// Construction never fails: when analytics are disabled, or the transport cannot be built, the
/// client is backed by a transport that drops everything. Delivery problems are only ever
/// reported through debug logging.
///
/// ```
/// use cf_analytics::analytics::{Client, Config, Deployment};
///
/// let client = Client::new(Config::DISABLED);
/// client.set_deployment(Some(Deployment::new("dep-1", "1.0.0", "prod")));
/// client.track("deployment_started", Default::default());
/// client.close();
/// ```
pub struct Client {
    identity: IdentityCell,
    transport: Box<dyn CoreClient>,
    uid: IdGenerator,
    debug: bool,
    closed: AtomicBool,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.transport.endpoint_url())
            .field("debug", &self.debug)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl Client {
    /// Creates a client for `config`, reading `CF_ANALYTICS_DEBUG` once to decide whether
    /// diagnostics are logged.
    pub fn new(config: Config) -> Self {
        Self::with_debug(config, debug_enabled())
    }

    /// Creates a client from [`Config::from_env`].
    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    /// Creates a client with an explicit debug setting instead of reading the environment.
    pub fn with_debug(config: Config, debug: bool) -> Self {
        if !config.enabled {
            return Self::from_transport(Box::new(NoopClient), debug);
        }

        let core_config = CoreConfig::new(config.resolved_endpoint())
            .with_callback(Arc::new(DebugCallback::new(debug)))
            .with_verbose(config.verbose)
            .with_interval(FLUSH_INTERVAL)
            .with_batch_size(BATCH_SIZE);

        match BatchingClient::new(core_config) {
            Ok(transport) => {
                if debug {
                    log::info!(
                        target: LOG_TARGET,
                        "configured analytics client config={}",
                        serde_json::to_string(&config).unwrap_or_default()
                    );
                }
                Self::from_transport(Box::new(transport), debug)
            }
            Err(err) => {
                log::error!(target: LOG_TARGET, "error setting client: {err}");
                Self::from_transport(Box::new(NoopClient), debug)
            }
        }
    }

    pub(crate) fn from_transport(transport: Box<dyn CoreClient>, debug: bool) -> Self {
        Self {
            identity: IdentityCell::default(),
            transport,
            uid: Arc::new(|| format!("{ANONYMOUS_ID_PREFIX}{}", Uuid::now_v7())),
            debug,
            closed: AtomicBool::new(false),
        }
    }

    /// Endpoint of the underlying transport. Empty when analytics are disabled.
    pub fn endpoint_url(&self) -> &str {
        self.transport.endpoint_url()
    }

    /// Sets the deployment ID. An empty ID is ignored and keeps the current value.
    pub fn set_deployment_id(&self, deployment_id: impl Into<String>) {
        let deployment_id = deployment_id.into();
        if deployment_id.is_empty() {
            return;
        }
        if self.debug {
            log::info!(target: LOG_TARGET, "set deployment deployment.id={deployment_id}");
        }
        self.identity
            .update(|identity| identity.deployment_id = Some(deployment_id));
    }

    /// Replaces the deployment information. `None` clears it.
    pub fn set_deployment(&self, deployment: Option<Deployment>) {
        if self.debug {
            log::info!(target: LOG_TARGET, "set deployment deployment={deployment:?}");
        }
        self.identity
            .update(|identity| identity.deployment = deployment);
    }

    /// Records an event. Events are attributed to the deployment ID when one is set, otherwise
    /// to a fresh anonymous ID.
    pub fn track(&self, event: impl Into<String>, mut properties: Properties) {
        if self.is_closed() {
            return;
        }
        let (deployment_id, group_id) = self.identity.read(|identity| {
            (
                identity.deployment_id.clone(),
                identity.deployment.as_ref().map(|d| d.id.clone()),
            )
        });

        if let Some(group_id) = group_id {
            if !properties.contains_key(DEPLOYMENT_ID_PROPERTY) {
                properties.insert(DEPLOYMENT_ID_PROPERTY, group_id);
            }
        }

        self.enqueue(Message::from(Track {
            anonymous_id: deployment_id.unwrap_or_else(|| (self.uid)()),
            event: event.into(),
            properties,
            ..Default::default()
        }));
    }

    /// Sends a group call carrying the current deployment's traits. Does nothing when no
    /// deployment is set.
    pub fn identify_deployment(&self) {
        if self.is_closed() {
            return;
        }
        let Some((deployment_id, deployment)) = self.identity.read(|identity| {
            identity
                .deployment
                .clone()
                .map(|deployment| (identity.deployment_id.clone(), deployment))
        }) else {
            return;
        };

        self.enqueue(Message::from(Group {
            anonymous_id: deployment_id.unwrap_or_else(|| (self.uid)()),
            group_id: deployment.id.clone(),
            traits: deployment.traits(),
            ..Default::default()
        }));
    }

    /// Flushes queued events and shuts the transport down. Further calls, including repeated
    /// `close` calls, do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.debug {
            log::info!(
                target: LOG_TARGET,
                "closing analytics client url={}",
                self.transport.endpoint_url()
            );
        }
        if let Err(err) = self.transport.close() {
            log::error!(target: LOG_TARGET, "error closing client: {err}");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn enqueue(&self, message: Message) {
        if let Err(err) = self.transport.enqueue(message) {
            if self.debug {
                log::warn!(target: LOG_TARGET, "dropping analytics event: {err}");
            }
        }
    }

    #[cfg(test)]
    fn with_id_generator(mut self, uid: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.uid = Arc::new(uid);
        self
    }

    #[cfg(test)]
    fn deployment_id(&self) -> Option<String> {
        self.identity.read(|identity| identity.deployment_id.clone())
    }

    #[cfg(test)]
    fn deployment(&self) -> Option<Deployment> {
        self.identity.read(|identity| identity.deployment.clone())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{captured_for_current_thread, install_capture_logger};
    use crate::transport::error::{internal_error, TransportResult};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Default, Clone)]
    struct RecordingTransport {
        messages: Arc<Mutex<Vec<Message>>>,
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl CoreClient for RecordingTransport {
        fn enqueue(&self, message: Message) -> TransportResult<()> {
            message.validate()?;
            self.messages.lock().unwrap().push(message);
            Ok(())
        }

        fn endpoint_url(&self) -> &str {
            "http://recording.test"
        }

        fn close(&self) -> TransportResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(internal_error("flush failed"));
            }
            Ok(())
        }
    }

    impl RecordingTransport {
        fn take_messages(&self) -> Vec<Message> {
            self.messages.lock().unwrap().clone()
        }
    }

    fn recording_client(debug: bool) -> (Client, RecordingTransport) {
        let transport = RecordingTransport::default();
        let client = Client::from_transport(Box::new(transport.clone()), debug);
        (client, transport)
    }

    #[test]
    fn disabled_client_uses_noop_transport() {
        let client = Client::with_debug(Config::DISABLED, false);
        assert_eq!(client.endpoint_url(), "");
        client.track("ignored", Properties::new());
        client.close();
    }

    #[test]
    fn invalid_endpoint_falls_back_to_noop() {
        install_capture_logger();
        let config = Config::DEFAULT.with_endpoint("not a url");
        let client = Client::with_debug(config, false);
        assert_eq!(client.endpoint_url(), "");
        client.track("ignored", Properties::new());
        client.close();

        let records = captured_for_current_thread();
        assert!(records
            .iter()
            .any(|r| r.message.starts_with("error setting client")));
    }

    #[test]
    fn enabled_client_targets_resolved_endpoint() {
        let client = Client::with_debug(Config::DEFAULT.with_endpoint(""), false);
        assert_eq!(client.endpoint_url(), "https://t.commonfate.io");
        drop(client);
    }

    #[test]
    fn empty_deployment_id_is_ignored() {
        let (client, _) = recording_client(false);
        client.set_deployment_id("dep-1");
        client.set_deployment_id("");
        assert_eq!(client.deployment_id(), Some("dep-1".to_string()));
    }

    #[test]
    fn deployment_id_reads_back_last_value() {
        let (client, _) = recording_client(false);
        assert_eq!(client.deployment_id(), None);
        client.set_deployment_id("dep-1");
        client.set_deployment_id(String::from("dep-2"));
        assert_eq!(client.deployment_id(), Some("dep-2".to_string()));
    }

    #[test]
    fn set_deployment_replaces_and_none_clears() {
        let (client, _) = recording_client(false);
        client.set_deployment(Some(Deployment::new("d1", "1.0.0", "prod")));
        client.set_deployment(Some(Deployment::new("d2", "2.0.0", "")));
        assert_eq!(client.deployment(), Some(Deployment::new("d2", "2.0.0", "")));

        client.set_deployment(None);
        assert_eq!(client.deployment(), None);
    }

    #[test]
    fn default_id_generator_produces_unique_anonymous_ids() {
        let (client, _) = recording_client(false);
        let first = (client.uid)();
        let second = (client.uid)();
        assert!(first.starts_with("anon_"));
        assert!(Uuid::parse_str(&first["anon_".len()..]).is_ok());
        assert_ne!(first, second);
    }

    #[test]
    fn track_uses_generated_id_without_deployment() {
        let (client, transport) = recording_client(false);
        let client = client.with_id_generator(|| "anon_fixed".to_string());
        client.track("signup", Properties::new().set("plan", "pro"));

        let messages = transport.take_messages();
        assert_eq!(messages.len(), 1);
        let Message::Track(track) = &messages[0] else {
            panic!("expected track message");
        };
        assert_eq!(track.anonymous_id, "anon_fixed");
        assert_eq!(track.event, "signup");
        assert_eq!(track.properties.get("plan"), Some(&json!("pro")));
        assert!(!track.properties.contains_key("deploymentId"));
    }

    #[test]
    fn track_attributes_events_to_deployment() {
        let (client, transport) = recording_client(false);
        client.set_deployment_id("dep-1");
        client.set_deployment(Some(Deployment::new("d1", "1.2.3", "prod")));
        client.track("login", Properties::new());
        client.track("login", Properties::new().set("deploymentId", "override"));

        let messages = transport.take_messages();
        let tracks: Vec<&Track> = messages
            .iter()
            .filter_map(|m| match m {
                Message::Track(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].anonymous_id, "dep-1");
        assert_eq!(tracks[0].properties.get("deploymentId"), Some(&json!("d1")));
        assert_eq!(
            tracks[1].properties.get("deploymentId"),
            Some(&json!("override"))
        );
    }

    #[test]
    fn identify_deployment_sends_group_traits() {
        let (client, transport) = recording_client(false);
        let client = client.with_id_generator(|| "anon_group".to_string());

        client.identify_deployment();
        assert!(transport.take_messages().is_empty());

        client.set_deployment(Some(Deployment::new("d1", "1.2.3", "prod")));
        client.identify_deployment();

        let messages = transport.take_messages();
        assert_eq!(messages.len(), 1);
        let Message::Group(group) = &messages[0] else {
            panic!("expected group message");
        };
        assert_eq!(group.group_id, "d1");
        assert_eq!(group.anonymous_id, "anon_group");
        assert_eq!(
            serde_json::to_value(&group.traits).unwrap(),
            json!({"version": "1.2.3", "groupType": "deployment", "id": "d1", "stage": "prod"})
        );
    }

    #[test]
    fn close_is_idempotent_and_stops_emission() {
        let (client, transport) = recording_client(false);
        client.close();
        client.close();
        client.track("late", Properties::new());
        drop(client);

        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert!(transport.take_messages().is_empty());
    }

    #[test]
    fn close_errors_are_logged_not_raised() {
        install_capture_logger();
        let transport = RecordingTransport {
            fail_close: true,
            ..Default::default()
        };
        let client = Client::from_transport(Box::new(transport.clone()), true);
        client.close();

        let records = captured_for_current_thread();
        assert!(records
            .iter()
            .any(|r| r.message == "closing analytics client url=http://recording.test"));
        assert!(records
            .iter()
            .any(|r| r.message.contains("error closing client: flush failed")));
    }

    #[test]
    fn enqueue_errors_are_swallowed() {
        let (client, transport) = recording_client(false);
        client.track("", Properties::new());
        assert!(transport.take_messages().is_empty());
    }

    #[test]
    fn concurrent_mutators_leave_one_submitted_state() {
        let (client, transport) = recording_client(false);
        let client = Arc::new(client);
        let threads = 8;

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let client = Arc::clone(&client);
                thread::spawn(move || {
                    for _ in 0..200 {
                        client.set_deployment_id(format!("dep-{i}"));
                        client.set_deployment(Some(Deployment::new(
                            format!("d{i}"),
                            format!("1.{i}.0"),
                            "prod",
                        )));
                        client.track("tick", Properties::new());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let submitted_ids: Vec<String> = (0..threads).map(|i| format!("dep-{i}")).collect();
        let deployment_id = client.deployment_id().unwrap();
        assert!(submitted_ids.contains(&deployment_id));

        let deployment = client.deployment().unwrap();
        let index = deployment.id.trim_start_matches('d');
        assert_eq!(deployment.version, format!("1.{index}.0"));
        assert_eq!(deployment.stage, "prod");

        assert_eq!(transport.take_messages().len(), threads * 200);
    }
}
