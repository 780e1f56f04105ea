//! Scripted transport and recording capabilities for controller tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use super::{
    AuthProvider, Capabilities, CurrentUser, Navigator, NoticeKind, Notifier, SyncController,
};
use crate::api::{ApiError, ApiRequest, Transport};

struct Scripted {
    response: Result<Option<Value>, ApiError>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Answers requests in call order from a queue of scripted responses.
#[derive(Default)]
pub(crate) struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub(crate) fn respond(&self, response: Result<Option<Value>, ApiError>) {
        self.script.lock().unwrap().push_back(Scripted {
            response,
            gate: None,
        });
    }

    pub(crate) fn respond_ok(&self, body: Value) {
        self.respond(Ok(Some(body)));
    }

    /// Queues a response that is only released once `gate` fires.
    pub(crate) fn respond_after(
        &self,
        response: Result<Option<Value>, ApiError>,
        gate: oneshot::Receiver<()>,
    ) {
        self.script.lock().unwrap().push_back(Scripted {
            response,
            gate: Some(gate),
        });
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        self.calls.lock().unwrap().push(request);
        let scripted = self.script.lock().unwrap().pop_front();

        let Some(scripted) = scripted else {
            return Err(ApiError::Transport("no scripted response".to_string()));
        };
        if let Some(gate) = scripted.gate {
            let _ = gate.await;
        }
        scripted.response
    }
}

/// Records everything the controller tells its host.
pub(crate) struct Recorder {
    user: Option<CurrentUser>,
    notices: Mutex<Vec<(NoticeKind, String)>>,
    navigations: AtomicUsize,
    logouts: AtomicUsize,
}

impl Recorder {
    pub(crate) fn signed_in() -> Self {
        Self {
            user: Some(CurrentUser {
                id: 7,
                username: "ada".to_string(),
            }),
            notices: Mutex::new(Vec::new()),
            navigations: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn signed_out() -> Self {
        Self {
            user: None,
            ..Self::signed_in()
        }
    }

    pub(crate) fn messages(&self, kind: NoticeKind) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub(crate) fn errors(&self) -> Vec<String> {
        self.messages(NoticeKind::Error)
    }

    pub(crate) fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub(crate) fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl AuthProvider for Recorder {
    fn current_user(&self) -> Option<CurrentUser> {
        self.user.clone()
    }

    fn logout(&self) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}

impl Notifier for Recorder {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().unwrap().push((kind, message.to_string()));
    }
}

impl Navigator for Recorder {
    fn navigate_home(&self) {
        self.navigations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Controller wired to a fresh mock transport and a signed-in recorder.
pub(crate) fn harness() -> (SyncController, Arc<MockTransport>, Arc<Recorder>) {
    harness_with(Recorder::signed_in())
}

pub(crate) fn harness_with(
    recorder: Recorder,
) -> (SyncController, Arc<MockTransport>, Arc<Recorder>) {
    let transport = Arc::new(MockTransport::default());
    let recorder = Arc::new(recorder);
    let capabilities = Capabilities::new(recorder.clone(), recorder.clone(), recorder.clone());
    let controller = SyncController::new(transport.clone(), capabilities);
    (controller, transport, recorder)
}
