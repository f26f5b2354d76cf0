//! Per-client command dispatch and connection recovery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::command::Command;
use crate::engine::{ControlLink, Value};
use crate::error::BridgeError;
use crate::Result;

/// Monitor plug-in instance expected alongside the pooling plug-in when
/// no explicit pool path is configured.
const MONITOR_ID: &str = "doasvm_mon";

/// Variable suffixes under the pooling plug-in's base path.
const WNDLEN_SUFFIX: &str = ".pooling_wndlen";
const ALPHA_SUFFIX: &str = ".alpha";
const TYPE_SUFFIX: &str = ".pooling_type";

/// Beamformer selector payloads.
const BEAMFORMER_ON: &str = "Bf";
const BEAMFORMER_OFF: &str = "NoBf";

/// Path settings a session needs to resolve its targets.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Id of the pooling plug-in instance under client control.
    pub pooling_id: String,
    /// Explicit pool read path; derived from the plug-in path if unset.
    pub pool_path: Option<String>,
    /// Absolute path of the beamformer selector.
    pub beamformer_path: String,
}

/// Outcome of executing one command against the engine.
///
/// The recovery policy lives in a single match over this type: a
/// recoverable failure triggers one reopen, an ignorable one is logged,
/// and in both cases the triggering message is dropped.
enum Outcome {
    /// Handled, nothing to send back.
    Done,
    /// Handled, push this value to the client.
    Reply(Value),
    /// Link failure that warrants a reopen.
    Recoverable(BridgeError),
    /// Failure worth logging; the connection itself is fine.
    Ignorable(BridgeError),
}

/// One client session's view of the bridge.
///
/// Holds a reference to the process-wide shared link; every engine
/// operation runs under the link's mutex, so concurrent sessions are
/// serialized at the link boundary and a reopen can never interleave
/// with an in-flight call.
#[derive(Debug)]
pub struct SessionBridge<L: ControlLink> {
    link: Arc<Mutex<L>>,
    plugin_path: String,
    pool_path: String,
    beamformer_path: String,
    poll_interval: Option<Duration>,
}

impl<L: ControlLink> SessionBridge<L> {
    /// Resolve the pooling plug-in and fix this session's paths.
    ///
    /// Fails with [`BridgeError::NotFound`] if no instance matches the
    /// configured pooling id; the session is refused in that case.
    pub async fn new(link: Arc<Mutex<L>>, settings: &BridgeSettings) -> Result<Self> {
        let plugin_path = {
            let mut link = link.lock().await;
            link.find(&settings.pooling_id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| BridgeError::NotFound(settings.pooling_id.clone()))?
        };

        let pool_path = match &settings.pool_path {
            Some(path) => path.clone(),
            None => derive_pool_path(&plugin_path, &settings.pooling_id),
        };
        debug!(plugin = %plugin_path, pool = %pool_path, "session paths resolved");

        Ok(Self {
            link,
            plugin_path,
            pool_path,
            beamformer_path: settings.beamformer_path.clone(),
            poll_interval: None,
        })
    }

    /// Dispatch one inbound text frame.
    ///
    /// Returns the value to push back, if any. Link failures never
    /// escape: a timeout or broken connection triggers one reopen and
    /// drops the message, everything else is logged and dropped. The
    /// session stays usable either way.
    pub async fn handle_message(&mut self, text: &str) -> Option<Value> {
        let command = Command::from_text(text);
        if command == Command::Unknown {
            info!(message = text, "ignoring unrecognized message");
            return None;
        }

        match self.execute(&command).await {
            Outcome::Done => None,
            Outcome::Reply(value) => Some(value),
            Outcome::Recoverable(err) => {
                warn!(%err, "engine connection lost, attempting to reopen");
                self.reopen().await;
                None
            }
            Outcome::Ignorable(err) => {
                warn!(%err, message = text, "error handling message");
                None
            }
        }
    }

    /// Run one polling tick: read the pool variable under the same
    /// recovery policy as a client-triggered fetch.
    pub async fn poll_data(&mut self) -> Option<Value> {
        match self.fetch_data().await {
            Outcome::Reply(value) => Some(value),
            Outcome::Recoverable(err) => {
                warn!(%err, "engine connection lost, attempting to reopen");
                self.reopen().await;
                None
            }
            Outcome::Ignorable(err) => {
                warn!(%err, "error reading pool data");
                None
            }
            Outcome::Done => None,
        }
    }

    /// The client-requested polling cadence, if any.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// The resolved pool read path.
    pub fn pool_path(&self) -> &str {
        &self.pool_path
    }

    async fn execute(&mut self, command: &Command) -> Outcome {
        match command {
            Command::FetchData => self.fetch_data().await,
            Command::SetPoolingWindow(wndlen) => {
                debug!(wndlen, "setting pooling window length");
                let path = format!("{}{WNDLEN_SUFFIX}", self.plugin_path);
                self.set(&path, Value::Float(*wndlen)).await
            }
            Command::SetPoolingAlpha(alpha) => {
                debug!(alpha, "setting pooling alpha");
                let path = format!("{}{ALPHA_SUFFIX}", self.plugin_path);
                self.set(&path, Value::Float(*alpha)).await
            }
            Command::SetPoolingType(pooling_type) => {
                debug!(%pooling_type, "setting pooling type");
                let path = format!("{}{TYPE_SUFFIX}", self.plugin_path);
                self.set(&path, Value::from(pooling_type.as_str())).await
            }
            Command::SetBeamformer(enabled) => {
                debug!(enabled, "switching beamformer");
                let token = if *enabled {
                    BEAMFORMER_ON
                } else {
                    BEAMFORMER_OFF
                };
                let path = self.beamformer_path.clone();
                self.set(&path, Value::from(token)).await
            }
            Command::SetPollInterval(seconds) => {
                let seconds = *seconds;
                self.poll_interval = (seconds.is_finite() && seconds > 0.0)
                    .then(|| Duration::from_secs_f64(seconds));
                debug!(seconds, "poll interval updated");
                Outcome::Done
            }
            // Filtered out in handle_message; nothing to do.
            Command::Unknown => Outcome::Done,
        }
    }

    async fn fetch_data(&mut self) -> Outcome {
        let result = {
            let mut link = self.link.lock().await;
            link.get(&self.pool_path).await
        };
        match result {
            Ok(value) => Outcome::Reply(value),
            Err(err) => split_failure(err),
        }
    }

    async fn set(&mut self, path: &str, value: Value) -> Outcome {
        let result = {
            let mut link = self.link.lock().await;
            link.set(path, &value).await
        };
        match result {
            Ok(()) => Outcome::Done,
            Err(err) => split_failure(err),
        }
    }

    /// One recovery attempt. A failed reopen is only logged; the next
    /// recoverable failure triggers another attempt.
    async fn reopen(&mut self) {
        let mut link = self.link.lock().await;
        match link.reopen().await {
            Ok(()) => info!("engine connection reopened"),
            Err(err) => warn!(%err, "reopen failed"),
        }
    }
}

/// Sort a link failure into the recovery policy's two bins.
fn split_failure(err: BridgeError) -> Outcome {
    if err.is_recoverable() {
        Outcome::Recoverable(err)
    } else {
        Outcome::Ignorable(err)
    }
}

/// Derive the pool read path from the pooling plug-in path.
///
/// Replacement is per path segment: a segment must equal the pooling id
/// exactly to be substituted with the monitor id, so an id that happens
/// to occur inside another segment is left alone.
fn derive_pool_path(plugin_path: &str, pooling_id: &str) -> String {
    let monitor_path = plugin_path
        .split('.')
        .map(|segment| {
            if segment == pooling_id {
                MONITOR_ID
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join(".");
    format!("{monitor_path}.pool")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted in-memory link recording every call.
    #[derive(Default, Debug)]
    struct MockLink {
        find_result: Vec<String>,
        pool_value: Option<Value>,
        failures: VecDeque<BridgeError>,
        find_calls: Vec<String>,
        get_calls: Vec<String>,
        set_calls: Vec<(String, String)>,
        reopen_calls: usize,
    }

    impl MockLink {
        fn with_plugin(path: &str) -> Self {
            Self {
                find_result: vec![path.to_string()],
                pool_value: Some(Value::Vector(vec![0.1, 0.9])),
                ..Self::default()
            }
        }

        fn fail_next(&mut self, err: BridgeError) {
            self.failures.push_back(err);
        }
    }

    impl ControlLink for MockLink {
        async fn find(&mut self, id: &str) -> Result<Vec<String>> {
            self.find_calls.push(id.to_string());
            if let Some(err) = self.failures.pop_front() {
                return Err(err);
            }
            Ok(self.find_result.clone())
        }

        async fn get(&mut self, path: &str) -> Result<Value> {
            self.get_calls.push(path.to_string());
            if let Some(err) = self.failures.pop_front() {
                return Err(err);
            }
            Ok(self.pool_value.clone().unwrap())
        }

        async fn set(&mut self, path: &str, value: &Value) -> Result<()> {
            self.set_calls.push((path.to_string(), value.to_string()));
            if let Some(err) = self.failures.pop_front() {
                return Err(err);
            }
            Ok(())
        }

        async fn reopen(&mut self) -> Result<()> {
            self.reopen_calls += 1;
            Ok(())
        }
    }

    fn settings() -> BridgeSettings {
        BridgeSettings {
            pooling_id: "pool".into(),
            pool_path: None,
            beamformer_path: "mha.doachain.post.select".into(),
        }
    }

    async fn session(
        link: MockLink,
        settings: &BridgeSettings,
    ) -> (SessionBridge<MockLink>, Arc<Mutex<MockLink>>) {
        let link = Arc::new(Mutex::new(link));
        let bridge = SessionBridge::new(Arc::clone(&link), settings)
            .await
            .unwrap();
        (bridge, link)
    }

    #[test]
    fn test_derive_pool_path_by_segment() {
        assert_eq!(
            derive_pool_path("mha.doachain.pool.pool_instance", "pool_instance"),
            "mha.doachain.pool.doasvm_mon.pool"
        );
        // An id that is a substring of another segment is left alone.
        assert_eq!(
            derive_pool_path("mha.doachain.pool_instance.pool", "pool"),
            "mha.doachain.pool_instance.doasvm_mon.pool"
        );
    }

    #[tokio::test]
    async fn test_explicit_pool_path_wins() {
        let mut config = settings();
        config.pool_path = Some("mha.custom.pool".into());
        let (bridge, _) = session(MockLink::with_plugin("mha.doachain.pool"), &config).await;
        assert_eq!(bridge.pool_path(), "mha.custom.pool");
    }

    #[tokio::test]
    async fn test_construction_fails_when_id_missing() {
        let link = Arc::new(Mutex::new(MockLink::default()));
        let err = SessionBridge::new(Arc::clone(&link), &settings())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_send_data_replies_with_pool_value() {
        let (mut bridge, link) = session(MockLink::with_plugin("mha.doachain.pool"), &settings()).await;

        let reply = bridge.handle_message(r#"{"command": "send_data"}"#).await;
        assert_eq!(reply, Some(Value::Vector(vec![0.1, 0.9])));

        let link = link.lock().await;
        assert_eq!(link.get_calls, vec!["mha.doachain.doasvm_mon.pool"]);
        assert_eq!(link.reopen_calls, 0);
    }

    #[tokio::test]
    async fn test_set_commands_hit_documented_paths() {
        let (mut bridge, link) = session(MockLink::with_plugin("mha.doachain.pool"), &settings()).await;

        assert!(bridge
            .handle_message(r#"{"new_pooling_wndlen": 25}"#)
            .await
            .is_none());
        assert!(bridge
            .handle_message(r#"{"new_pooling_alpha": 0.9}"#)
            .await
            .is_none());
        assert!(bridge
            .handle_message(r#"{"new_pooling_type": "mean"}"#)
            .await
            .is_none());
        assert!(bridge.handle_message(r#"{"beamformer": true}"#).await.is_none());
        assert!(bridge.handle_message(r#"{"beamformer": false}"#).await.is_none());

        let link = link.lock().await;
        assert_eq!(
            link.set_calls,
            vec![
                ("mha.doachain.pool.pooling_wndlen".to_string(), "25".to_string()),
                ("mha.doachain.pool.alpha".to_string(), "0.9".to_string()),
                ("mha.doachain.pool.pooling_type".to_string(), "mean".to_string()),
                ("mha.doachain.post.select".to_string(), "Bf".to_string()),
                ("mha.doachain.post.select".to_string(), "NoBf".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_new_interval_is_local_only() {
        let (mut bridge, link) = session(MockLink::with_plugin("mha.doachain.pool"), &settings()).await;

        assert!(bridge.handle_message(r#"{"new_interval": 0.5}"#).await.is_none());
        assert_eq!(bridge.poll_interval(), Some(Duration::from_millis(500)));

        // Zero disables polling again.
        assert!(bridge.handle_message(r#"{"new_interval": 0}"#).await.is_none());
        assert_eq!(bridge.poll_interval(), None);

        let link = link.lock().await;
        assert!(link.get_calls.is_empty());
        assert!(link.set_calls.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_triggers_exactly_one_reopen() {
        let mut mock = MockLink::with_plugin("mha.doachain.pool");
        mock.fail_next(BridgeError::Timeout);
        let (mut bridge, link) = session(mock, &settings()).await;

        assert!(bridge
            .handle_message(r#"{"new_pooling_wndlen": 25}"#)
            .await
            .is_none());
        assert_eq!(link.lock().await.reopen_calls, 1);

        // The session keeps working; the dropped message is not retried.
        let reply = bridge.handle_message(r#"{"command": "send_data"}"#).await;
        assert_eq!(reply, Some(Value::Vector(vec![0.1, 0.9])));
        assert_eq!(link.lock().await.reopen_calls, 1);
    }

    #[tokio::test]
    async fn test_broken_connection_triggers_reopen() {
        let mut mock = MockLink::with_plugin("mha.doachain.pool");
        mock.fail_next(BridgeError::ConnectionBroken("pipe closed".into()));
        let (mut bridge, link) = session(mock, &settings()).await;

        assert!(bridge.handle_message(r#"{"command": "send_data"}"#).await.is_none());
        assert_eq!(link.lock().await.reopen_calls, 1);
    }

    #[tokio::test]
    async fn test_invalid_value_does_not_reopen() {
        let mut mock = MockLink::with_plugin("mha.doachain.pool");
        mock.fail_next(BridgeError::InvalidValue("garbled".into()));
        let (mut bridge, link) = session(mock, &settings()).await;

        assert!(bridge.handle_message(r#"{"command": "send_data"}"#).await.is_none());
        assert_eq!(link.lock().await.reopen_calls, 0);

        // Still responsive.
        let reply = bridge.handle_message(r#"{"command": "send_data"}"#).await;
        assert_eq!(reply, Some(Value::Vector(vec![0.1, 0.9])));
    }

    #[tokio::test]
    async fn test_unknown_message_touches_nothing() {
        let (mut bridge, link) = session(MockLink::with_plugin("mha.doachain.pool"), &settings()).await;

        assert!(bridge.handle_message(r#"{"volume": 11}"#).await.is_none());
        assert!(bridge.handle_message("not json").await.is_none());

        let link = link.lock().await;
        assert!(link.get_calls.is_empty());
        assert!(link.set_calls.is_empty());
        assert_eq!(link.reopen_calls, 0);
    }

    #[tokio::test]
    async fn test_poll_data_uses_fetch_path() {
        let (mut bridge, link) = session(MockLink::with_plugin("mha.doachain.pool"), &settings()).await;

        let value = bridge.poll_data().await;
        assert_eq!(value, Some(Value::Vector(vec![0.1, 0.9])));
        assert_eq!(link.lock().await.get_calls, vec!["mha.doachain.doasvm_mon.pool"]);
    }
}
