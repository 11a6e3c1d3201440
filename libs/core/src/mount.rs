//! Mount Lifecycle Controller for the embedded chat runtime.
//!
//! The runtime manipulates markup on its own, so it must not exist before the client has
//! painted once. The controller sequences `Unmounted -> Mounting -> Mounted` around that signal,
//! owns the single runtime handle of a panel, and releases it on unmount.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::profile::ProfileSnapshot;
use crate::runtime_config::{ConfigMemo, DismissCallback, RuntimeConfig, Theme};
use crate::telemetry::span_for_panel;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MountState {
    Unmounted,
    Mounting,
    Mounted,
}

impl MountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountState::Unmounted => "unmounted",
            MountState::Mounting => "mounting",
            MountState::Mounted => "mounted",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RenderPass {
    Server,
    Client,
}

/// What the host should draw for the chat area.
#[derive(Clone, Debug, PartialEq)]
pub enum PanelView {
    Placeholder,
    Runtime(Arc<RuntimeConfig>),
    Error { message: String, retryable: bool },
}

/// Control handle of one live runtime instance.
pub trait RuntimeHandle {
    /// Pushes a new configuration into the live runtime.
    fn apply(&mut self, config: Arc<RuntimeConfig>);

    fn release(self)
    where
        Self: Sized;
}

/// Creates runtime instances. Implemented by the embedding host.
pub trait RuntimeHost {
    type Handle: RuntimeHandle;

    fn acquire(&mut self, config: Arc<RuntimeConfig>) -> Result<Self::Handle, BridgeError>;
}

/// Inputs the runtime configuration is derived from.
#[derive(Clone, Debug)]
pub struct PanelInputs {
    pub profile: Option<ProfileSnapshot>,
    /// `None` while the host has not resolved a concrete theme.
    pub theme: Option<Theme>,
    pub on_dismiss: DismissCallback,
}

pub struct MountController<H: RuntimeHost> {
    bridge: BridgeConfig,
    host: H,
    inputs: PanelInputs,
    memo: ConfigMemo,
    state: MountState,
    handle: Option<H::Handle>,
    applied: Option<Arc<RuntimeConfig>>,
    error: Option<BridgeError>,
    attempted: bool,
    terminated: bool,
}

impl<H: RuntimeHost> MountController<H> {
    pub fn new(bridge: BridgeConfig, host: H, inputs: PanelInputs) -> Self {
        Self {
            bridge,
            host,
            inputs,
            memo: ConfigMemo::new(),
            state: MountState::Unmounted,
            handle: None,
            applied: None,
            error: None,
            attempted: false,
            terminated: false,
        }
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn error(&self) -> Option<&BridgeError> {
        self.error.as_ref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Read-only: rendering never moves the state machine. Server passes always get the
    /// placeholder so server and client markup agree until the client has painted.
    pub fn render(&self, pass: RenderPass) -> PanelView {
        if pass == RenderPass::Server || self.terminated {
            return PanelView::Placeholder;
        }
        match (self.state, &self.applied, &self.error) {
            (MountState::Mounted, Some(config), _) => PanelView::Runtime(Arc::clone(config)),
            (MountState::Mounting, _, Some(err)) => PanelView::Error {
                message: err.user_message().to_string(),
                retryable: err.is_retryable(),
            },
            _ => PanelView::Placeholder,
        }
    }

    /// Signal that the client finished its first paint. Only the first call has an effect.
    pub fn on_client_painted(&mut self) -> MountState {
        if self.terminated || self.state != MountState::Unmounted {
            return self.state;
        }
        let _span = span_for_panel("client_painted", self.state).entered();
        self.state = MountState::Mounting;
        debug!("chat panel mounting");
        self.try_acquire();
        self.state
    }

    /// Replaces the inputs. A live runtime only receives a new configuration when the
    /// memoized key changed. Returns whether the runtime was reconfigured.
    pub fn update_inputs(&mut self, inputs: PanelInputs) -> bool {
        self.inputs = inputs;
        if self.terminated {
            return false;
        }
        match self.state {
            MountState::Unmounted => false,
            MountState::Mounting => {
                // First acquisition may have been deferred on an unresolved theme.
                if !self.attempted {
                    self.try_acquire();
                }
                false
            }
            MountState::Mounted => self.reconfigure(),
        }
    }

    /// Manual retry after a failed acquisition. Issues exactly one new attempt.
    pub fn retry(&mut self) -> MountState {
        if self.terminated
            || self.state != MountState::Mounting
            || !self.error.as_ref().is_some_and(BridgeError::is_retryable)
        {
            return self.state;
        }
        let _span = span_for_panel("retry", self.state).entered();
        info!("retrying chat runtime acquisition");
        self.error = None;
        self.attempted = false;
        self.try_acquire();
        self.state
    }

    /// Releases the runtime handle. Terminal: later signals are ignored.
    pub fn unmount(&mut self) {
        if self.terminated {
            return;
        }
        let _span = span_for_panel("unmount", self.state).entered();
        if let Some(handle) = self.handle.take() {
            handle.release();
            debug!("chat runtime handle released");
        }
        self.applied = None;
        self.state = MountState::Unmounted;
        self.terminated = true;
    }

    fn try_acquire(&mut self) {
        let Some(theme) = self.inputs.theme else {
            debug!("theme unresolved; deferring runtime acquisition");
            return;
        };
        self.attempted = true;
        let config = self.memo.get_or_build(
            &self.bridge,
            self.inputs.profile.as_ref(),
            theme,
            &self.inputs.on_dismiss,
        );
        match self.host.acquire(Arc::clone(&config)) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.applied = Some(config);
                self.error = None;
                self.state = MountState::Mounted;
                info!("chat runtime mounted");
            }
            Err(err) => {
                warn!(error = %err.diagnostic(), "chat runtime acquisition failed");
                self.error = Some(err);
            }
        }
    }

    fn reconfigure(&mut self) -> bool {
        let Some(theme) = self.inputs.theme else {
            return false;
        };
        let config = self.memo.get_or_build(
            &self.bridge,
            self.inputs.profile.as_ref(),
            theme,
            &self.inputs.on_dismiss,
        );
        if matches!(&self.applied, Some(current) if Arc::ptr_eq(current, &config)) {
            return false;
        }
        if let Some(handle) = self.handle.as_mut() {
            handle.apply(Arc::clone(&config));
        }
        self.applied = Some(config);
        true
    }
}

impl<H: RuntimeHost> Drop for MountController<H> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Log {
        acquired: usize,
        applied: usize,
        released: usize,
    }

    struct FakeHost {
        log: Arc<Mutex<Log>>,
        failures: usize,
        misconfigured: bool,
    }

    struct FakeHandle {
        log: Arc<Mutex<Log>>,
    }

    impl RuntimeHandle for FakeHandle {
        fn apply(&mut self, _config: Arc<RuntimeConfig>) {
            self.log.lock().unwrap().applied += 1;
        }

        fn release(self) {
            self.log.lock().unwrap().released += 1;
        }
    }

    impl RuntimeHost for FakeHost {
        type Handle = FakeHandle;

        fn acquire(&mut self, _config: Arc<RuntimeConfig>) -> Result<FakeHandle, BridgeError> {
            self.log.lock().unwrap().acquired += 1;
            if self.misconfigured {
                return Err(BridgeError::ConfigurationIncomplete("CHATKIT_DOMAIN_KEY"));
            }
            if self.failures > 0 {
                self.failures -= 1;
                return Err(BridgeError::RuntimeUnavailable("domain key refused".into()));
            }
            Ok(FakeHandle {
                log: Arc::clone(&self.log),
            })
        }
    }

    fn controller(
        failures: usize,
        theme: Option<Theme>,
    ) -> (MountController<FakeHost>, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let host = FakeHost {
            log: Arc::clone(&log),
            failures,
            misconfigured: false,
        };
        let inputs = PanelInputs {
            profile: Some(ProfileSnapshot::with_first_name("Jane")),
            theme,
            on_dismiss: DismissCallback::noop(),
        };
        let bridge = BridgeConfig::development("http://localhost:8000").unwrap();
        (MountController::new(bridge, host, inputs), log)
    }

    #[test]
    fn server_pass_never_leaves_unmounted() {
        let (controller, log) = controller(0, Some(Theme::Dark));
        for _ in 0..3 {
            assert_eq!(controller.render(RenderPass::Server), PanelView::Placeholder);
        }
        assert_eq!(controller.state(), MountState::Unmounted);
        assert_eq!(log.lock().unwrap().acquired, 0);
    }

    #[test]
    fn paint_mounts_exactly_once() {
        let (mut controller, log) = controller(0, Some(Theme::Dark));
        assert_eq!(controller.render(RenderPass::Client), PanelView::Placeholder);
        assert_eq!(controller.on_client_painted(), MountState::Mounted);
        assert_eq!(controller.on_client_painted(), MountState::Mounted);
        assert_eq!(log.lock().unwrap().acquired, 1);
        match controller.render(RenderPass::Client) {
            PanelView::Runtime(config) => assert_eq!(config.header_title(), "Jane's AI Twin"),
            other => panic!("unexpected view: {other:?}"),
        }
        assert_eq!(controller.render(RenderPass::Server), PanelView::Placeholder);
    }

    #[test]
    fn unresolved_theme_defers_acquisition() {
        let (mut controller, log) = controller(0, None);
        assert_eq!(controller.on_client_painted(), MountState::Mounting);
        assert_eq!(log.lock().unwrap().acquired, 0);

        let resolved = PanelInputs {
            theme: Some(Theme::Light),
            ..controller.inputs.clone()
        };
        controller.update_inputs(resolved);
        assert_eq!(controller.state(), MountState::Mounted);
        assert_eq!(log.lock().unwrap().acquired, 1);
    }

    #[test]
    fn failed_acquisition_surfaces_error_without_looping() {
        let (mut controller, log) = controller(1, Some(Theme::Dark));
        assert_eq!(controller.on_client_painted(), MountState::Mounting);
        assert!(matches!(
            controller.render(RenderPass::Client),
            PanelView::Error {
                retryable: true,
                ..
            }
        ));

        // Input churn does not trigger silent retries.
        let inputs = controller.inputs.clone();
        controller.update_inputs(inputs);
        assert_eq!(log.lock().unwrap().acquired, 1);

        assert_eq!(controller.retry(), MountState::Mounted);
        assert_eq!(log.lock().unwrap().acquired, 2);
        assert!(controller.error().is_none());
        assert_eq!(controller.retry(), MountState::Mounted);
        assert_eq!(log.lock().unwrap().acquired, 2);
    }

    #[test]
    fn non_retryable_failure_ignores_retry() {
        let (mut controller, log) = controller(0, Some(Theme::Dark));
        controller.host.misconfigured = true;
        assert_eq!(controller.on_client_painted(), MountState::Mounting);
        assert!(matches!(
            controller.render(RenderPass::Client),
            PanelView::Error {
                retryable: false,
                ..
            }
        ));

        assert_eq!(controller.retry(), MountState::Mounting);
        assert_eq!(log.lock().unwrap().acquired, 1);
        assert!(matches!(
            controller.error(),
            Some(BridgeError::ConfigurationIncomplete(_))
        ));
    }

    #[test]
    fn only_key_changes_reconfigure_runtime() {
        let (mut controller, log) = controller(0, Some(Theme::Dark));
        controller.on_client_painted();

        let mut inputs = controller.inputs.clone();
        inputs.profile = Some(ProfileSnapshot {
            headline: Some("unrelated edit".into()),
            ..ProfileSnapshot::with_first_name("Jane")
        });
        assert!(!controller.update_inputs(inputs.clone()));

        inputs.theme = Some(Theme::Light);
        assert!(controller.update_inputs(inputs.clone()));

        inputs.theme = None;
        assert!(!controller.update_inputs(inputs));
        assert_eq!(log.lock().unwrap().applied, 1);
    }

    #[test]
    fn unmount_releases_handle_and_is_terminal() {
        let (mut controller, log) = controller(0, Some(Theme::Dark));
        controller.on_client_painted();
        controller.unmount();
        assert!(controller.is_terminated());
        assert_eq!(controller.state(), MountState::Unmounted);
        assert_eq!(controller.on_client_painted(), MountState::Unmounted);
        drop(controller);
        let log = log.lock().unwrap();
        assert_eq!(log.released, 1);
        assert_eq!(log.acquired, 1);
    }

    #[test]
    fn drop_releases_live_handle() {
        let (mut controller, log) = controller(0, Some(Theme::Dark));
        controller.on_client_painted();
        drop(controller);
        assert_eq!(log.lock().unwrap().released, 1);
    }
}
