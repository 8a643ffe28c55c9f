//! Dashboard view state
//!
//! `DashboardState` is a pure state machine: callers feed it events
//! (`begin_*`/`finish_*`) and it hands back the request to issue, if any.
//! `Dashboard` couples it with a [`MetricsApi`] for the common case of
//! issuing each request right away.
//!
//! View: `Loading -> Ready | Error`. Inside `Ready` the form is either
//! `Idle` (empty draft for a new record) or `Editing` (draft taken from a
//! selected record). Failures never leave the view; they land in a
//! dismissible inline error.

use teamboard_protocol::{
    DeleteAck, Metric, MetricFilter, MetricId, MetricPayload, ValidationError,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ClientError, MetricsApi};

/// List view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Ready(Vec<Metric>),
    Error(String),
}

/// Form sub-state
#[derive(Debug, Clone, PartialEq)]
pub enum FormState {
    Idle(MetricPayload),
    Editing { id: MetricId, draft: MetricPayload },
}

impl Default for FormState {
    fn default() -> Self {
        FormState::Idle(MetricPayload::default())
    }
}

/// Request a successful `begin_submit` asks the caller to issue
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitCommand {
    Create(MetricPayload),
    Update(MetricId, MetricPayload),
}

/// Why a submit or delete was not started
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejected {
    #[error("A request is already in flight")]
    Busy,

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("No delete awaiting confirmation")]
    NothingToConfirm,
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    view: ViewState,
    form: FormState,
    inline_error: Option<String>,
    in_flight: bool,
    pending_delete: Option<MetricId>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            view: ViewState::Loading,
            form: FormState::default(),
            inline_error: None,
            in_flight: false,
            pending_delete: None,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn inline_error(&self) -> Option<&str> {
        self.inline_error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn pending_delete(&self) -> Option<MetricId> {
        self.pending_delete
    }

    /// Records currently shown, empty unless `Ready`
    pub fn records(&self) -> &[Metric] {
        match &self.view {
            ViewState::Ready(records) => records,
            _ => &[],
        }
    }

    /// A list fetch is starting
    ///
    /// A ready list stays on screen while it is refreshed.
    pub fn begin_fetch(&mut self) {
        if !matches!(self.view, ViewState::Ready(_)) {
            self.view = ViewState::Loading;
        }
    }

    pub fn finish_fetch(&mut self, result: Result<Vec<Metric>, ClientError>) {
        match result {
            Ok(records) => {
                // The record being edited may have been deleted elsewhere.
                if let FormState::Editing { id, .. } = self.form {
                    if !records.iter().any(|m| m.id == id) {
                        self.form = FormState::default();
                    }
                }
                self.view = ViewState::Ready(records);
            }
            Err(e) => {
                warn!("Failed to fetch metrics: {}", e);
                self.view = ViewState::Error(e.to_string());
            }
        }
    }

    /// Start editing a listed record; `false` if it is not listed
    pub fn select(&mut self, id: MetricId) -> bool {
        let Some(draft) = self
            .records()
            .iter()
            .find(|m| m.id == id)
            .map(MetricPayload::from)
        else {
            return false;
        };

        self.form = FormState::Editing { id, draft };
        true
    }

    pub fn cancel_edit(&mut self) {
        self.form = FormState::default();
    }

    /// Mutable access to the draft of whichever form is showing
    pub fn draft_mut(&mut self) -> &mut MetricPayload {
        match &mut self.form {
            FormState::Idle(draft) => draft,
            FormState::Editing { draft, .. } => draft,
        }
    }

    /// Validate the draft and mark a submit as in flight
    pub fn begin_submit(&mut self) -> Result<SubmitCommand, Rejected> {
        if self.in_flight {
            return Err(Rejected::Busy);
        }

        let draft = match &self.form {
            FormState::Idle(draft) => draft,
            FormState::Editing { draft, .. } => draft,
        };
        if let Err(e) = draft.validate() {
            self.inline_error = Some(e.to_string());
            return Err(e.into());
        }

        self.in_flight = true;
        Ok(match &self.form {
            FormState::Idle(draft) => SubmitCommand::Create(draft.clone()),
            FormState::Editing { id, draft } => SubmitCommand::Update(*id, draft.clone()),
        })
    }

    /// Returns `true` when the list should be fetched again
    pub fn finish_submit(&mut self, result: Result<Metric, ClientError>) -> bool {
        self.in_flight = false;

        match result {
            Ok(metric) => {
                debug!("Saved metric {}", metric.id);
                self.form = FormState::default();
                self.inline_error = None;
                true
            }
            Err(e) => {
                self.inline_error = Some(e.to_string());
                false
            }
        }
    }

    /// Ask for confirmation before deleting; nothing is sent yet
    pub fn request_delete(&mut self, id: MetricId) {
        self.pending_delete = Some(id);
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Confirm the pending delete and mark it as in flight
    pub fn confirm_delete(&mut self) -> Result<MetricId, Rejected> {
        if self.in_flight {
            return Err(Rejected::Busy);
        }

        let id = self.pending_delete.take().ok_or(Rejected::NothingToConfirm)?;
        self.in_flight = true;
        Ok(id)
    }

    /// Returns `true` when the list should be fetched again
    pub fn finish_delete(&mut self, result: Result<DeleteAck, ClientError>) -> bool {
        self.in_flight = false;

        match result {
            Ok(ack) => {
                if matches!(&self.form, FormState::Editing { id, .. } if *id == ack.id) {
                    self.form = FormState::default();
                }
                self.inline_error = None;
                true
            }
            Err(e) => {
                self.inline_error = Some(e.to_string());
                false
            }
        }
    }

    pub fn dismiss_error(&mut self) {
        self.inline_error = None;
    }
}

/// Dashboard bound to an API
pub struct Dashboard<A> {
    api: A,
    filter: MetricFilter,
    state: DashboardState,
}

impl<A: MetricsApi> Dashboard<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            filter: MetricFilter::default(),
            state: DashboardState::new(),
        }
    }

    pub fn with_filter(mut self, filter: MetricFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DashboardState {
        &mut self.state
    }

    pub fn set_filter(&mut self, filter: MetricFilter) {
        self.filter = filter;
    }

    pub async fn refresh(&mut self) {
        self.state.begin_fetch();
        let result = self.api.list(&self.filter).await;
        self.state.finish_fetch(result);
    }

    /// Submit the form; `Ok(false)` means the request failed and the
    /// inline error says why
    pub async fn submit(&mut self) -> Result<bool, Rejected> {
        let result = match self.state.begin_submit()? {
            SubmitCommand::Create(payload) => self.api.create(&payload).await,
            SubmitCommand::Update(id, payload) => self.api.update(id, &payload).await,
        };

        let saved = self.state.finish_submit(result);
        if saved {
            self.refresh().await;
        }
        Ok(saved)
    }

    /// Issue the delete confirmed by the user
    pub async fn confirm_delete(&mut self) -> Result<bool, Rejected> {
        let id = self.state.confirm_delete()?;
        let result = self.api.delete(id).await;

        let deleted = self.state.finish_delete(result);
        if deleted {
            self.refresh().await;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use teamboard_protocol::StatusReport;

    /// In-memory stand-in for the HTTP API
    #[derive(Default)]
    struct FakeApi {
        records: Mutex<Vec<Metric>>,
        fail_list: AtomicBool,
        fail_writes: AtomicBool,
        deletes: AtomicUsize,
    }

    fn api_error(status: u16, code: &str, message: &str) -> ClientError {
        ClientError::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    #[async_trait]
    impl MetricsApi for FakeApi {
        async fn status(&self) -> Result<StatusReport, ClientError> {
            Ok(StatusReport::new(true, Utc::now()))
        }

        async fn list(&self, _filter: &MetricFilter) -> Result<Vec<Metric>, ClientError> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(api_error(500, "internal", "Internal Server Error"));
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn get(&self, id: MetricId) -> Result<Metric, ClientError> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| api_error(404, "not_found", "Metric not found"))
        }

        async fn create(&self, payload: &MetricPayload) -> Result<Metric, ClientError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(api_error(500, "internal", "Internal Server Error"));
            }
            let metric = payload
                .validate()
                .unwrap()
                .into_metric(MetricId::new(), Utc::now());
            self.records.lock().unwrap().push(metric.clone());
            Ok(metric)
        }

        async fn update(&self, id: MetricId, payload: &MetricPayload) -> Result<Metric, ClientError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(api_error(500, "internal", "Internal Server Error"));
            }
            let mut records = self.records.lock().unwrap();
            let slot = records
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| api_error(404, "not_found", "Metric not found"))?;
            *slot = payload.validate().unwrap().into_metric(id, Utc::now());
            Ok(slot.clone())
        }

        async fn delete(&self, id: MetricId) -> Result<DeleteAck, ClientError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|m| m.id != id);
            if records.len() == before {
                return Err(api_error(404, "not_found", "Metric not found"));
            }
            Ok(DeleteAck::new(id))
        }
    }

    fn fill(state: &mut DashboardState, name: &str, team: &str, role: &str) {
        *state.draft_mut() = MetricPayload::new(name, team, role);
    }

    #[tokio::test]
    async fn test_refresh_reaches_ready() {
        let mut dash = Dashboard::new(FakeApi::default());
        assert_eq!(dash.state().view(), &ViewState::Loading);

        dash.refresh().await;
        assert_eq!(dash.state().view(), &ViewState::Ready(vec![]));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_error_until_retry() {
        let api = FakeApi::default();
        api.fail_list.store(true, Ordering::SeqCst);
        let mut dash = Dashboard::new(api);

        dash.refresh().await;
        assert!(matches!(dash.state().view(), ViewState::Error(_)));

        dash.api.fail_list.store(false, Ordering::SeqCst);
        dash.refresh().await;
        assert!(matches!(dash.state().view(), ViewState::Ready(_)));
    }

    #[tokio::test]
    async fn test_create_resets_form_and_refetches() {
        let mut dash = Dashboard::new(FakeApi::default());
        dash.refresh().await;

        fill(dash.state_mut(), "Ada", "Eng", "SWE");
        assert_eq!(dash.submit().await, Ok(true));

        assert_eq!(dash.state().form(), &FormState::default());
        assert_eq!(dash.state().records().len(), 1);
        assert_eq!(dash.state().records()[0].name, "Ada");
    }

    #[tokio::test]
    async fn test_edit_flow() {
        let mut dash = Dashboard::new(FakeApi::default());
        fill(dash.state_mut(), "Ada", "Eng", "SWE");
        dash.submit().await.unwrap();
        let id = dash.state().records()[0].id;

        assert!(dash.state_mut().select(id));
        match dash.state().form() {
            FormState::Editing { id: editing, draft } => {
                assert_eq!(*editing, id);
                assert_eq!(draft.team.as_deref(), Some("Eng"));
            }
            other => panic!("expected editing, got {other:?}"),
        }

        dash.state_mut().draft_mut().team = Some("Research".into());
        assert_eq!(dash.submit().await, Ok(true));
        assert_eq!(dash.state().form(), &FormState::default());
        assert_eq!(dash.state().records()[0].team, "Research");
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_form() {
        let mut dash = Dashboard::new(FakeApi::default());
        dash.refresh().await;
        dash.api.fail_writes.store(true, Ordering::SeqCst);

        fill(dash.state_mut(), "Ada", "Eng", "SWE");
        assert_eq!(dash.submit().await, Ok(false));

        assert_eq!(
            dash.state().form(),
            &FormState::Idle(MetricPayload::new("Ada", "Eng", "SWE"))
        );
        assert!(dash.state().inline_error().is_some());
        assert!(!dash.state().is_busy());

        dash.state_mut().dismiss_error();
        assert!(dash.state().inline_error().is_none());
    }

    #[tokio::test]
    async fn test_invalid_draft_not_sent() {
        let mut dash = Dashboard::new(FakeApi::default());
        fill(dash.state_mut(), "Ada", "", "SWE");

        let result = dash.submit().await;
        assert!(matches!(result, Err(Rejected::Invalid(ValidationError::MissingField("team")))));
        assert!(dash.api.records.lock().unwrap().is_empty());
        assert!(dash.state().inline_error().unwrap().contains("team"));
    }

    #[test]
    fn test_second_submit_while_in_flight_rejected() {
        let mut state = DashboardState::new();
        fill(&mut state, "Ada", "Eng", "SWE");

        assert!(matches!(state.begin_submit(), Ok(SubmitCommand::Create(_))));
        assert_eq!(state.begin_submit(), Err(Rejected::Busy));

        state.finish_submit(Err(api_error(500, "internal", "boom")));
        assert!(state.begin_submit().is_ok());
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let mut dash = Dashboard::new(FakeApi::default());
        fill(dash.state_mut(), "Ada", "Eng", "SWE");
        dash.submit().await.unwrap();
        let id = dash.state().records()[0].id;

        // Nothing confirmed yet
        assert_eq!(dash.confirm_delete().await, Err(Rejected::NothingToConfirm));

        dash.state_mut().request_delete(id);
        assert_eq!(dash.api.deletes.load(Ordering::SeqCst), 0);

        dash.state_mut().cancel_delete();
        assert_eq!(dash.confirm_delete().await, Err(Rejected::NothingToConfirm));
        assert_eq!(dash.api.deletes.load(Ordering::SeqCst), 0);

        dash.state_mut().request_delete(id);
        assert_eq!(dash.confirm_delete().await, Ok(true));
        assert_eq!(dash.api.deletes.load(Ordering::SeqCst), 1);
        assert!(dash.state().records().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_edited_record_resets_form() {
        let mut dash = Dashboard::new(FakeApi::default());
        fill(dash.state_mut(), "Ada", "Eng", "SWE");
        dash.submit().await.unwrap();
        let id = dash.state().records()[0].id;

        dash.state_mut().select(id);
        dash.state_mut().request_delete(id);
        dash.confirm_delete().await.unwrap();
        assert_eq!(dash.state().form(), &FormState::default());
    }

    #[tokio::test]
    async fn test_failed_delete_surfaces_inline() {
        let mut dash = Dashboard::new(FakeApi::default());
        dash.refresh().await;

        dash.state_mut().request_delete(MetricId::new());
        assert_eq!(dash.confirm_delete().await, Ok(false));
        assert!(dash.state().inline_error().unwrap().contains("not found"));
        assert!(matches!(dash.state().view(), ViewState::Ready(_)));
    }

    #[test]
    fn test_select_unknown_record() {
        let mut state = DashboardState::new();
        state.finish_fetch(Ok(vec![]));
        assert!(!state.select(MetricId::new()));
        assert_eq!(state.form(), &FormState::default());
    }
}
