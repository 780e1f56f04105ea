use futures::future::{AbortHandle, Abortable, Aborted};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::state::{OpState, Operation};
use super::{Capabilities, NoticeKind, SyncError};
use crate::address::{PageKey, ResourceAddress};
use crate::api::{ApiError, ApiRequest, Transport};
use crate::patch::{local_fields, Patch};
use crate::snapshot::Snapshot;

/// What happens to local state when deleting the flat (profile) resource fails.
///
/// The flat delete clears the snapshot and navigates home before the server
/// answers, unlike every other operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatDeletePolicy {
    /// The cleared snapshot stays cleared; the failure is only reported.
    #[default]
    Irreversible,
    /// The pre-delete snapshot is put back, as `update` does.
    RestoreOnFailure,
}

impl fmt::Display for FlatDeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatDeletePolicy::Irreversible => write!(f, "irreversible"),
            FlatDeletePolicy::RestoreOnFailure => write!(f, "restore_on_failure"),
        }
    }
}

impl FromStr for FlatDeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "irreversible" => Ok(FlatDeletePolicy::Irreversible),
            "restore_on_failure" => Ok(FlatDeletePolicy::RestoreOnFailure),
            other => Err(format!(
                "unknown flat delete policy '{}' (expected irreversible or restore_on_failure)",
                other
            )),
        }
    }
}

/// The snapshot plus a counter bumped whenever it is replaced wholesale.
#[derive(Debug, Default)]
struct PageSlot {
    data: Snapshot,
    epoch: u64,
}

impl PageSlot {
    fn replace(&mut self, data: Snapshot) -> Snapshot {
        self.epoch += 1;
        std::mem::replace(&mut self.data, data)
    }
}

#[derive(Debug, Default)]
struct LoadSlot {
    generation: u64,
    in_flight: Option<AbortHandle>,
}

/// Owns the page snapshot and keeps it in step with the server.
///
/// Every operation reports its failures to the notifier before returning
/// them, so callers may ignore the `Err` or branch on it.
///
/// The snapshot lock is never held across an `.await`. Overlapping
/// mutations are not serialised: if two updates race, whichever resolves
/// last decides the final state, and a rollback restores the snapshot taken
/// before *its* mutation. A rollback never undoes a later load or reset.
pub struct SyncController {
    transport: Arc<dyn Transport>,
    capabilities: Capabilities,
    snapshot: Mutex<PageSlot>,
    load: Mutex<LoadSlot>,
    flat_delete: FlatDeletePolicy,
}

impl SyncController {
    pub fn new(transport: Arc<dyn Transport>, capabilities: Capabilities) -> Self {
        Self {
            transport,
            capabilities,
            snapshot: Mutex::new(PageSlot::default()),
            load: Mutex::new(LoadSlot::default()),
            flat_delete: FlatDeletePolicy::default(),
        }
    }

    pub fn with_flat_delete(mut self, policy: FlatDeletePolicy) -> Self {
        self.flat_delete = policy;
        self
    }

    pub fn flat_delete_policy(&self) -> FlatDeletePolicy {
        self.flat_delete
    }

    /// A copy of the current page data.
    pub fn snapshot(&self) -> Snapshot {
        self.lock_page().data.clone()
    }

    /// Page the snapshot currently holds.
    pub fn page(&self) -> Option<PageKey> {
        self.lock_page().data.page()
    }

    /// Drops the page data and cancels any in-flight load.
    pub fn reset(&self) {
        {
            let mut slot = self.lock_load();
            if let Some(handle) = slot.in_flight.take() {
                handle.abort();
            }
            slot.generation += 1;
        }
        self.lock_page().replace(Snapshot::Empty);
    }

    /// Fetches `page` and replaces the snapshot with it.
    ///
    /// A later `load` cancels this one; the cancelled call returns
    /// [`SyncError::Cancelled`] without notifying.
    pub async fn load(&self, page: PageKey) -> Result<(), SyncError> {
        let result = self.load_page(page).await;
        if result.is_ok() {
            self.notify(NoticeKind::Success, "Data fetch successful");
        }
        self.finish(result)
    }

    /// Creates an entity under `parent` and merges the server's copy into
    /// the snapshot. Nothing is inserted before the server answers.
    pub async fn create(
        &self,
        page: &PageKey,
        payload: Patch,
        parent: &ResourceAddress,
    ) -> Result<Value, SyncError> {
        let result = self.create_entity(page, payload, parent).await;
        if result.is_ok() {
            self.notify(NoticeKind::Success, "Item created successfully");
        }
        self.finish(result)
    }

    /// Applies `patch` locally, sends it, and restores the previous snapshot
    /// if the server rejects it.
    ///
    /// Sensitive fields are sent but never merged locally. The response is
    /// returned as-is and not merged back.
    pub async fn update(
        &self,
        address: &ResourceAddress,
        patch: Patch,
    ) -> Result<Option<Value>, SyncError> {
        let result = self.update_entity(address, patch).await;
        if result.is_ok() {
            self.notify(NoticeKind::Success, "Item updated successfully");
        }
        self.finish(result)
    }

    /// Deletes the entity at `address`.
    ///
    /// Nested entities are removed locally only after the server confirms.
    /// The flat resource is cleared up front and the host navigates home;
    /// see [`FlatDeletePolicy`] for what a failure does.
    pub async fn remove(&self, address: &ResourceAddress) -> Result<(), SyncError> {
        let result = match address {
            ResourceAddress::Flat => self.remove_flat().await,
            nested => self.remove_nested(nested).await,
        };
        self.finish(result)
    }

    async fn load_page(&self, page: PageKey) -> Result<(), SyncError> {
        if self.capabilities.auth.current_user().is_none() {
            return Err(SyncError::NotAuthenticated);
        }

        let (handle, registration) = AbortHandle::new_pair();
        let generation = self.begin_load(handle);

        let request = self.transport.send(ApiRequest::get(page.path()));
        match Abortable::new(request, registration).await {
            Err(Aborted) => Err(SyncError::Cancelled),
            Ok(result) => self.commit_load(generation, &page, result),
        }
    }

    fn begin_load(&self, handle: AbortHandle) -> u64 {
        let mut slot = self.lock_load();
        if let Some(previous) = slot.in_flight.replace(handle) {
            tracing::debug!("aborting superseded page load");
            previous.abort();
        }
        slot.generation += 1;
        slot.generation
    }

    fn commit_load(
        &self,
        generation: u64,
        page: &PageKey,
        result: Result<Option<Value>, ApiError>,
    ) -> Result<(), SyncError> {
        let mut slot = self.lock_load();
        if slot.generation != generation {
            tracing::debug!(page = %page, "discarding stale page load");
            return Err(SyncError::Cancelled);
        }
        slot.in_flight = None;

        let body = result?.ok_or_else(|| SyncError::Decode("empty page body".to_string()))?;
        let data = Snapshot::from_page(page, body).map_err(|e| SyncError::Decode(e.to_string()))?;
        self.lock_page().replace(data);
        tracing::debug!(page = %page, "page loaded");
        Ok(())
    }

    async fn create_entity(
        &self,
        page: &PageKey,
        payload: Patch,
        parent: &ResourceAddress,
    ) -> Result<Value, SyncError> {
        if let (PageKey::Profile(_), ResourceAddress::Flat) = (page, parent) {
            return Err(SyncError::InvalidAddress(
                "profiles are not created through a session".to_string(),
            ));
        }
        let path = parent.collection_path(page).ok_or_else(|| {
            SyncError::InvalidAddress(format!("{} cannot contain other items", parent))
        })?;
        if *parent != ResourceAddress::Flat && !self.has_container(parent) {
            return Err(SyncError::NotFound(*parent));
        }

        let mut op = Operation::start("create", parent);
        op.advance(OpState::Pending);
        let response = match self.transport.send(ApiRequest::post(path, payload)).await {
            Ok(response) => response,
            Err(e) => {
                op.advance(OpState::RolledBack);
                return Err(e.into());
            }
        };
        op.advance(OpState::Committed);

        let entity = unwrap_envelope(response, parent.child_envelope())?;
        self.merge_created(parent, entity.clone());
        Ok(entity)
    }

    fn has_container(&self, parent: &ResourceAddress) -> bool {
        self.lock_page().data.children_mut(parent).is_some()
    }

    fn merge_created(&self, parent: &ResourceAddress, entity: Value) {
        let mut slot = self.lock_page();
        match slot.data.children_mut(parent) {
            Some(children) => {
                if let Err(e) = children.upsert(entity) {
                    tracing::warn!(parent = %parent, "created item could not be merged: {}", e);
                }
            }
            None => {
                tracing::debug!(parent = %parent, "container no longer loaded, skipping merge")
            }
        }
    }

    async fn update_entity(
        &self,
        address: &ResourceAddress,
        patch: Patch,
    ) -> Result<Option<Value>, SyncError> {
        let mut op = Operation::start("update", address);
        let (path, previous, epoch) = self.apply_optimistic(address, &patch)?;
        op.advance(OpState::Pending);

        match self.transport.send(ApiRequest::patch(path, patch)).await {
            Ok(response) => {
                op.advance(OpState::Committed);
                Ok(response)
            }
            Err(e) => {
                if self.restore_unless_replaced(previous, epoch) {
                    tracing::warn!(address = %address, "update rejected, snapshot restored");
                }
                op.advance(OpState::RolledBack);
                Err(e.into())
            }
        }
    }

    /// Merges the non-sensitive part of `patch` and returns the request path
    /// together with the snapshot as it was before and its epoch.
    fn apply_optimistic(
        &self,
        address: &ResourceAddress,
        patch: &Patch,
    ) -> Result<(String, Snapshot, u64), SyncError> {
        let mut slot = self.lock_page();
        let page = slot.data.page().ok_or(SyncError::NotFound(*address))?;
        let previous = slot.data.clone();

        let entity = slot
            .data
            .resolve_mut(address)
            .ok_or(SyncError::NotFound(*address))?;
        entity
            .apply(&local_fields(patch))
            .map_err(|e| SyncError::InvalidPatch(e.to_string()))?;

        Ok((address.entity_path(&page), previous, slot.epoch))
    }

    async fn remove_flat(&self) -> Result<(), SyncError> {
        let mut op = Operation::start("remove", ResourceAddress::Flat);
        let (page, previous, epoch) = self.take_flat()?;
        op.advance(OpState::Pending);
        self.capabilities.navigator.navigate_home();

        let path = ResourceAddress::Flat.entity_path(&page);
        match self.transport.send(ApiRequest::delete(path)).await {
            Ok(_) => {
                op.advance(OpState::Committed);
                self.notify(NoticeKind::Success, "Account deleted");
                self.capabilities.auth.logout();
                Ok(())
            }
            Err(e) => {
                if self.flat_delete == FlatDeletePolicy::RestoreOnFailure {
                    self.restore_unless_replaced(previous, epoch);
                }
                op.advance(OpState::RolledBack);
                Err(e.into())
            }
        }
    }

    fn take_flat(&self) -> Result<(PageKey, Snapshot, u64), SyncError> {
        let mut slot = self.lock_page();
        match slot.data.page() {
            Some(page @ PageKey::Profile(_)) => {
                let previous = slot.replace(Snapshot::Empty);
                Ok((page, previous, slot.epoch))
            }
            _ => Err(SyncError::NotFound(ResourceAddress::Flat)),
        }
    }

    /// Puts `previous` back if the snapshot is still the one from `epoch`.
    ///
    /// A load or reset in between wins; returns whether anything was restored.
    fn restore_unless_replaced(&self, previous: Snapshot, epoch: u64) -> bool {
        let mut slot = self.lock_page();
        if slot.epoch != epoch {
            tracing::debug!("snapshot replaced since the operation began, not restoring");
            return false;
        }
        slot.data = previous;
        true
    }

    async fn remove_nested(&self, address: &ResourceAddress) -> Result<(), SyncError> {
        let mut op = Operation::start("remove", address);
        let page = self.resolved_page(address)?;
        op.advance(OpState::Pending);

        let path = address.entity_path(&page);
        if let Err(e) = self.transport.send(ApiRequest::delete(path)).await {
            op.advance(OpState::RolledBack);
            return Err(e.into());
        }
        op.advance(OpState::Committed);

        if !self.lock_page().data.remove(address) {
            tracing::debug!(address = %address, "deleted item already gone from snapshot");
        }
        self.notify(NoticeKind::Success, "Item deleted successfully");
        Ok(())
    }

    fn resolved_page(&self, address: &ResourceAddress) -> Result<PageKey, SyncError> {
        let mut slot = self.lock_page();
        match slot.data.page() {
            Some(page) if slot.data.contains(address) => Ok(page),
            _ => Err(SyncError::NotFound(*address)),
        }
    }

    fn finish<T>(&self, result: Result<T, SyncError>) -> Result<T, SyncError> {
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    fn report(&self, err: &SyncError) {
        if err.is_silent() {
            tracing::debug!("{}", err);
            return;
        }
        tracing::warn!("{}", err);
        for message in err.messages() {
            self.notify(NoticeKind::Error, &message);
        }
    }

    fn notify(&self, kind: NoticeKind, message: &str) {
        self.capabilities.notifier.notify(kind, message);
    }

    fn lock_page(&self) -> MutexGuard<'_, PageSlot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_load(&self) -> MutexGuard<'_, LoadSlot> {
        self.load.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Takes the created entity out of `{"course": {...}}`-style envelopes.
fn unwrap_envelope(response: Option<Value>, key: Option<&str>) -> Result<Value, SyncError> {
    let body = response.ok_or_else(|| SyncError::Decode("empty create response".to_string()))?;
    if let (Value::Object(fields), Some(key)) = (&body, key) {
        if let Some(inner @ Value::Object(_)) = fields.get(key) {
            return Ok(inner.clone());
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, FETCH_FAILED};
    use crate::models::{Course, Note, Profile, Topic};
    use crate::patch::patch_from;
    use crate::sync::testing::{harness, harness_with, MockTransport, Recorder};
    use serde_json::json;
    use tokio::sync::oneshot;

    fn algebra_page() -> Value {
        json!({"courses": [{"id": 1, "name": "Algebra", "topics": []}]})
    }

    async fn loaded(
        controller: &SyncController,
        transport: &MockTransport,
        body: Value,
        page: PageKey,
    ) {
        transport.respond_ok(body);
        controller.load(page).await.unwrap();
    }

    fn name_too_short() -> ApiError {
        ApiError::from_response(422, br#"{"name": ["too short"]}"#)
    }

    #[tokio::test]
    async fn test_load_replaces_snapshot() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        assert_eq!(
            controller.snapshot(),
            Snapshot::Courses(vec![Course::new(1, "Algebra")])
        );
        assert_eq!(transport.calls()[0], ApiRequest::get("/api/v1/courses"));
        assert_eq!(
            recorder.messages(NoticeKind::Success),
            vec!["Data fetch successful".to_string()]
        );
    }

    #[tokio::test]
    async fn test_load_requires_user() {
        let (controller, transport, recorder) = harness_with(Recorder::signed_out());

        let result = controller.load(PageKey::Courses).await;
        assert_eq!(result, Err(SyncError::NotAuthenticated));
        assert!(transport.calls().is_empty());
        assert_eq!(recorder.errors(), vec!["Not logged in".to_string()]);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_snapshot() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;
        let before = controller.snapshot();

        transport.respond(Err(ApiError::Transport("connection refused".to_string())));
        assert!(controller.load(PageKey::Profile(7)).await.is_err());

        assert_eq!(controller.snapshot(), before);
        assert_eq!(recorder.errors(), vec![FETCH_FAILED.to_string()]);
    }

    #[tokio::test]
    async fn test_superseded_load_cannot_clobber_newer_page() {
        let (controller, transport, recorder) = harness();
        let (release, gate) = oneshot::channel();
        transport.respond_after(
            Ok(Some(json!({"id": 7, "username": "ada"}))),
            gate,
        );
        transport.respond_ok(algebra_page());

        let profile = controller.load(PageKey::Profile(7));
        let courses = async {
            let result = controller.load(PageKey::Courses).await;
            let _ = release.send(());
            result
        };
        let (profile, courses) = tokio::join!(profile, courses);

        assert_eq!(profile, Err(SyncError::Cancelled));
        assert_eq!(courses, Ok(()));
        assert_eq!(controller.page(), Some(PageKey::Courses));
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test]
    async fn test_update_success_merges_only_target() {
        let (controller, transport, recorder) = harness();
        loaded(
            &controller,
            &transport,
            json!({"courses": [
                {"id": 1, "name": "Algebra", "topics": []},
                {"id": 2, "name": "Physics", "topics": []}
            ]}),
            PageKey::Courses,
        )
        .await;

        transport.respond_ok(json!({"id": 1, "name": "Linear Algebra (server)"}));
        let patch = patch_from([("name", json!("Linear Algebra"))]);
        controller
            .update(&ResourceAddress::Course(1), patch.clone())
            .await
            .unwrap();

        assert_eq!(
            controller.snapshot(),
            Snapshot::Courses(vec![
                Course::new(1, "Linear Algebra"),
                Course::new(2, "Physics")
            ])
        );
        assert_eq!(
            transport.calls()[1],
            ApiRequest::patch("/api/v1/courses/1", patch)
        );
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejected_restores_snapshot() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;
        let before = controller.snapshot();

        transport.respond(Err(name_too_short()));
        let result = controller
            .update(
                &ResourceAddress::Course(1),
                patch_from([("name", json!("Linear Algebra"))]),
            )
            .await;

        assert!(matches!(result, Err(SyncError::Api(ApiError::Validation { .. }))));
        assert_eq!(controller.snapshot(), before);
        assert_eq!(recorder.errors(), vec!["name: too short".to_string()]);
    }

    #[tokio::test]
    async fn test_update_unresolved_makes_no_call() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        for address in [
            ResourceAddress::Course(3),
            ResourceAddress::Topic(1, 5),
            ResourceAddress::Note(1, 5, 9),
            ResourceAddress::Flat,
        ] {
            let result = controller.update(&address, patch_from([("name", json!("x"))])).await;
            assert_eq!(result, Err(SyncError::NotFound(address)));
        }

        assert_eq!(transport.calls().len(), 1);
        assert_eq!(recorder.errors(), vec!["Item not found".to_string(); 4]);
    }

    #[tokio::test]
    async fn test_update_on_empty_snapshot_is_not_found() {
        let (controller, transport, _recorder) = harness();
        let result = controller
            .update(&ResourceAddress::Course(1), patch_from([("name", json!("x"))]))
            .await;

        assert_eq!(result, Err(SyncError::NotFound(ResourceAddress::Course(1))));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_nesting_fails_resolution() {
        let (controller, transport, _recorder) = harness();
        loaded(
            &controller,
            &transport,
            json!({"courses": [
                {"id": 1, "name": "Algebra", "topics": [{"id": 5, "name": "Groups", "notes": []}]},
                {"id": 2, "name": "Physics", "topics": [{"id": 6, "name": "Optics", "notes": [
                    {"id": 9, "content": "refraction"}
                ]}]}
            ]}),
            PageKey::Courses,
        )
        .await;

        let result = controller
            .update(
                &ResourceAddress::Note(1, 6, 9),
                patch_from([("content", json!("x"))]),
            )
            .await;
        assert_eq!(result, Err(SyncError::NotFound(ResourceAddress::Note(1, 6, 9))));

        let result = controller.remove(&ResourceAddress::Topic(2, 5)).await;
        assert_eq!(result, Err(SyncError::NotFound(ResourceAddress::Topic(2, 5))));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_profile_update_keeps_passwords_out_of_snapshot() {
        let (controller, transport, _recorder) = harness();
        loaded(
            &controller,
            &transport,
            json!({"id": 7, "username": "ada", "email": "ada@example.com"}),
            PageKey::Profile(7),
        )
        .await;

        transport.respond_ok(json!({"id": 7, "username": "ada_l"}));
        let patch = patch_from([
            ("username", json!("ada_l")),
            ("current_password", json!("secret-1")),
            ("new_password", json!("secret-2")),
        ]);
        controller.update(&ResourceAddress::Flat, patch.clone()).await.unwrap();

        let profile = controller.snapshot().profile().cloned().unwrap();
        assert_eq!(profile, Profile::new(7, "ada_l").with_email("ada@example.com"));
        assert!(profile.extra.is_empty());

        let sent = &transport.calls()[1];
        assert_eq!(sent.path, "/api/v1/profile/7");
        assert_eq!(sent.body, Some(Value::Object(patch)));
    }

    #[tokio::test]
    async fn test_update_never_rekeys_entity() {
        let (controller, transport, _recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        transport.respond_ok(json!({"id": 1, "name": "Optics"}));
        let patch = patch_from([("id", json!(99)), ("name", json!("Optics"))]);
        controller.update(&ResourceAddress::Course(1), patch).await.unwrap();

        assert_eq!(
            controller.snapshot().courses().unwrap(),
            &[Course::new(1, "Optics")]
        );
        transport.respond_ok(json!({"id": 1, "name": "Optics II"}));
        controller
            .update(
                &ResourceAddress::Course(1),
                patch_from([("name", json!("Optics II"))]),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_invalid_patch_is_rejected_locally() {
        let (controller, transport, _recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;
        let before = controller.snapshot();

        let result = controller
            .update(&ResourceAddress::Course(1), patch_from([("name", json!(42))]))
            .await;

        assert!(matches!(result, Err(SyncError::InvalidPatch(_))));
        assert_eq!(controller.snapshot(), before);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_create_is_not_speculative() {
        let (controller, transport, _recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;
        let before = controller.snapshot();

        let (release, gate) = oneshot::channel();
        transport.respond_after(Ok(Some(json!({"id": 5, "name": "Groups"}))), gate);

        let create = controller.create(
            &PageKey::Courses,
            patch_from([("name", json!("Groups"))]),
            &ResourceAddress::Course(1),
        );
        let observe = async {
            let during = controller.snapshot();
            let _ = release.send(());
            during
        };
        let (created, during) = tokio::join!(create, observe);

        assert_eq!(during, before);
        assert_eq!(created.unwrap()["id"], 5);
        assert_eq!(
            controller.snapshot(),
            Snapshot::Courses(vec![
                Course::new(1, "Algebra").with_topics(vec![Topic::new(5, "Groups")])
            ])
        );
        assert_eq!(transport.calls()[1].path, "/api/v1/courses/1/topics");
    }

    #[tokio::test]
    async fn test_create_course_unwraps_envelope() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        transport.respond_ok(json!({
            "message": "Created successfully",
            "course": {"id": 2, "name": "Physics", "creator_id": 7}
        }));
        let created = controller
            .create(
                &PageKey::Courses,
                patch_from([("name", json!("Physics"))]),
                &ResourceAddress::Flat,
            )
            .await
            .unwrap();

        assert_eq!(created["name"], "Physics");
        assert_eq!(transport.calls()[1].path, "/api/v1/courses/new");
        let courses = controller.snapshot().courses().unwrap().to_vec();
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[1].extra["creator_id"], 7);
        assert_eq!(
            recorder.messages(NoticeKind::Success).last().map(String::as_str),
            Some("Item created successfully")
        );
    }

    #[tokio::test]
    async fn test_create_note_under_topic() {
        let (controller, transport, _recorder) = harness();
        loaded(
            &controller,
            &transport,
            json!({"courses": [{"id": 1, "name": "Algebra", "topics": [
                {"id": 5, "name": "Groups", "notes": []}
            ]}]}),
            PageKey::Courses,
        )
        .await;

        transport.respond_ok(json!({"id": 9, "content": "closure"}));
        controller
            .create(
                &PageKey::Courses,
                patch_from([("content", json!("closure"))]),
                &ResourceAddress::Topic(1, 5),
            )
            .await
            .unwrap();

        let notes = controller.snapshot().courses().unwrap()[0].topics[0].notes.clone();
        assert_eq!(notes, vec![Note::new(9, "closure")]);
        assert_eq!(
            transport.calls()[1].path,
            "/api/v1/courses/1/topics/5/notes"
        );
    }

    #[tokio::test]
    async fn test_create_failure_leaves_snapshot() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;
        let before = controller.snapshot();

        transport.respond(Err(ApiError::Status {
            status: 500,
            message: "Failed to create".to_string(),
        }));
        let result = controller
            .create(
                &PageKey::Courses,
                patch_from([("name", json!("Physics"))]),
                &ResourceAddress::Flat,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(controller.snapshot(), before);
        assert_eq!(recorder.errors(), vec!["Failed to create".to_string()]);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_parents_without_calling() {
        let (controller, transport, _recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;
        let payload = patch_from([("name", json!("x"))]);

        let missing = controller
            .create(&PageKey::Courses, payload.clone(), &ResourceAddress::Course(4))
            .await;
        assert_eq!(missing, Err(SyncError::NotFound(ResourceAddress::Course(4))));

        let note = controller
            .create(&PageKey::Courses, payload.clone(), &ResourceAddress::Note(1, 2, 3))
            .await;
        assert!(matches!(note, Err(SyncError::InvalidAddress(_))));

        let profile = controller
            .create(&PageKey::Profile(7), payload, &ResourceAddress::Flat)
            .await;
        assert!(matches!(profile, Err(SyncError::InvalidAddress(_))));

        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_nested_after_confirmation() {
        let (controller, transport, _recorder) = harness();
        let page = json!({"courses": [{"id": 1, "name": "Algebra", "topics": [
            {"id": 5, "name": "Groups", "notes": []}
        ]}]});
        loaded(&controller, &transport, page, PageKey::Courses).await;
        let before = controller.snapshot();

        transport.respond(Err(ApiError::Transport("reset".to_string())));
        assert!(controller.remove(&ResourceAddress::Topic(1, 5)).await.is_err());
        assert_eq!(controller.snapshot(), before);

        transport.respond(Ok(None));
        controller.remove(&ResourceAddress::Topic(1, 5)).await.unwrap();
        assert_eq!(
            controller.snapshot(),
            Snapshot::Courses(vec![Course::new(1, "Algebra")])
        );

        let deletes: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|call| call.method == Method::Delete)
            .collect();
        assert_eq!(deletes.len(), 2);
        assert_eq!(deletes[0].path, "/api/v1/courses/1/topics/5");
    }

    #[tokio::test]
    async fn test_remove_flat_success_logs_out() {
        let (controller, transport, recorder) = harness();
        loaded(
            &controller,
            &transport,
            json!({"id": 7, "username": "ada"}),
            PageKey::Profile(7),
        )
        .await;

        transport.respond(Ok(None));
        controller.remove(&ResourceAddress::Flat).await.unwrap();

        assert!(controller.snapshot().is_empty());
        assert_eq!(recorder.navigations(), 1);
        assert_eq!(recorder.logouts(), 1);
        assert_eq!(transport.calls()[1], ApiRequest::delete("/api/v1/profile/7"));
    }

    #[tokio::test]
    async fn test_remove_flat_failure_is_irreversible_by_default() {
        let (controller, transport, recorder) = harness();
        loaded(
            &controller,
            &transport,
            json!({"id": 7, "username": "ada"}),
            PageKey::Profile(7),
        )
        .await;

        transport.respond(Err(ApiError::Status {
            status: 500,
            message: "Could not delete".to_string(),
        }));
        assert!(controller.remove(&ResourceAddress::Flat).await.is_err());

        assert!(controller.snapshot().is_empty());
        assert_eq!(recorder.navigations(), 1);
        assert_eq!(recorder.logouts(), 0);
        assert_eq!(recorder.errors(), vec!["Could not delete".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_flat_failure_restores_when_configured() {
        let (controller, transport, _recorder) = harness();
        let controller = controller.with_flat_delete(FlatDeletePolicy::RestoreOnFailure);
        loaded(
            &controller,
            &transport,
            json!({"id": 7, "username": "ada"}),
            PageKey::Profile(7),
        )
        .await;
        let before = controller.snapshot();

        transport.respond(Err(ApiError::Transport("refused".to_string())));
        assert!(controller.remove(&ResourceAddress::Flat).await.is_err());
        assert_eq!(controller.snapshot(), before);
    }

    #[tokio::test]
    async fn test_remove_flat_without_profile_is_not_found() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        let result = controller.remove(&ResourceAddress::Flat).await;
        assert_eq!(result, Err(SyncError::NotFound(ResourceAddress::Flat)));
        assert_eq!(recorder.navigations(), 0);
        assert_eq!(transport.calls().len(), 1);
    }

    // Overlapping updates are not serialised: the first update's rollback
    // restores the snapshot it took, erasing the second, committed update.
    #[tokio::test]
    async fn test_racing_updates_last_resolution_wins() {
        let (controller, transport, _recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        let (release, gate) = oneshot::channel();
        transport.respond_after(Err(name_too_short()), gate);
        transport.respond_ok(json!({"id": 1, "name": "Geometry"}));

        let first = controller.update(
            &ResourceAddress::Course(1),
            patch_from([("name", json!("Linear Algebra"))]),
        );
        let second = async {
            let result = controller
                .update(
                    &ResourceAddress::Course(1),
                    patch_from([("name", json!("Geometry"))]),
                )
                .await;
            let _ = release.send(());
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_err());
        assert!(second.is_ok());
        assert_eq!(controller.snapshot().courses().unwrap()[0].name, "Algebra");
    }

    #[tokio::test]
    async fn test_rollback_keeps_newer_page_load() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        let (release, gate) = oneshot::channel();
        transport.respond_after(Err(name_too_short()), gate);
        transport.respond_ok(json!({"id": 7, "username": "ada"}));

        let update = controller.update(
            &ResourceAddress::Course(1),
            patch_from([("name", json!("A"))]),
        );
        let reload = async {
            let result = controller.load(PageKey::Profile(7)).await;
            let _ = release.send(());
            result
        };
        let (update, reload) = tokio::join!(update, reload);

        assert!(update.is_err());
        assert!(reload.is_ok());
        assert_eq!(controller.page(), Some(PageKey::Profile(7)));
        assert_eq!(recorder.errors(), vec!["name: too short".to_string()]);
    }

    #[tokio::test]
    async fn test_rollback_after_reset_stays_empty() {
        let (controller, transport, _recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        let (release, gate) = oneshot::channel();
        transport.respond_after(Err(name_too_short()), gate);

        let update = controller.update(
            &ResourceAddress::Course(1),
            patch_from([("name", json!("A"))]),
        );
        let logout = async {
            controller.reset();
            let _ = release.send(());
        };
        let (update, ()) = tokio::join!(update, logout);

        assert!(update.is_err());
        assert!(controller.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_stale_load_response_is_discarded() {
        let (controller, transport, recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;
        let stale = controller.lock_load().generation;
        loaded(
            &controller,
            &transport,
            json!({"id": 7, "username": "ada"}),
            PageKey::Profile(7),
        )
        .await;

        let result = controller.commit_load(stale, &PageKey::Courses, Ok(Some(algebra_page())));
        assert_eq!(result, Err(SyncError::Cancelled));
        assert_eq!(controller.page(), Some(PageKey::Profile(7)));
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test]
    async fn test_remove_flat_restore_skipped_after_reset() {
        let (controller, transport, _recorder) = harness();
        let controller = controller.with_flat_delete(FlatDeletePolicy::RestoreOnFailure);
        loaded(
            &controller,
            &transport,
            json!({"id": 7, "username": "ada"}),
            PageKey::Profile(7),
        )
        .await;

        let (release, gate) = oneshot::channel();
        transport.respond_after(Err(ApiError::Transport("refused".to_string())), gate);

        let remove = controller.remove(&ResourceAddress::Flat);
        let logout = async {
            controller.reset();
            let _ = release.send(());
        };
        let (remove, ()) = tokio::join!(remove, logout);

        assert!(remove.is_err());
        assert!(controller.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_snapshot() {
        let (controller, transport, _recorder) = harness();
        loaded(&controller, &transport, algebra_page(), PageKey::Courses).await;

        controller.reset();
        assert!(controller.snapshot().is_empty());
        assert_eq!(controller.page(), None);
    }

    #[test]
    fn test_flat_delete_policy_parse() {
        assert_eq!(
            "restore-on-failure".parse::<FlatDeletePolicy>(),
            Ok(FlatDeletePolicy::RestoreOnFailure)
        );
        assert_eq!(
            "Irreversible".parse::<FlatDeletePolicy>(),
            Ok(FlatDeletePolicy::Irreversible)
        );
        assert!("sometimes".parse::<FlatDeletePolicy>().is_err());
    }

    #[test]
    fn test_unwrap_envelope() {
        let body = json!({"message": "ok", "course": {"id": 1}});
        assert_eq!(
            unwrap_envelope(Some(body), Some("course")).unwrap(),
            json!({"id": 1})
        );
        let bare = json!({"id": 2, "name": "Optics"});
        assert_eq!(
            unwrap_envelope(Some(bare.clone()), Some("topic")).unwrap(),
            bare
        );
        assert!(unwrap_envelope(None, Some("note")).is_err());
    }
}
