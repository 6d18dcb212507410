use std::sync::LazyLock;
use log::{debug, info, warn};
use regex::Regex;
use crate::postal::model::{DirectoryResponse, PostOffice};
use crate::postal::{DirectoryError, PostalDirectory};

const CODE_LEN: usize = 6;

static STRICT_CODE_REG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{6}$").unwrap());

/// Everything that can go wrong in a lookup session, as shown to the user.
///
/// None of these are fatal; the controller keeps at most one of them as the
/// current message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("Please enter a valid 6-digit postal code.")]
    InvalidCode,
    #[error("Invalid Pincode or no data found.")]
    NotFound,
    #[error("Error fetching data, please try again.")]
    Transport,
    #[error("Couldn't find the postal data you're looking for...")]
    NoFilterMatch,
}

/// How much checking a postal code gets before it is sent out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validation {
    /// exactly six characters, anything goes; the directory rejects the rest
    #[default]
    Lenient,
    /// exactly six ASCII digits
    Strict,
}

impl Validation {
    fn accepts(self, code: &str) -> bool {
        match self {
            Self::Lenient => code.chars().count() == CODE_LEN,
            Self::Strict => STRICT_CODE_REG.is_match(code),
        }
    }
}

/// Where the session currently is
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(LookupError),
}

/// A lookup that has been dispatched but not yet resolved
#[derive(Debug)]
pub struct PendingLookup {
    ticket: u64,
    code: String,
}

impl PendingLookup {
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// The whole state of one lookup session
#[derive(Debug, Default)]
pub struct LookupState {
    query_code: String,
    /// the code `all_results` belongs to
    loaded_code: String,
    all_results: Vec<PostOffice>,
    /// indices into `all_results`
    visible: Vec<usize>,
    filter_text: String,
    phase: Phase,
}

impl LookupState {
    pub fn query_code(&self) -> &str {
        &self.query_code
    }

    pub fn loaded_code(&self) -> &str {
        &self.loaded_code
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn error(&self) -> Option<&LookupError> {
        match &self.phase {
            Phase::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    pub fn all_results(&self) -> &[PostOffice] {
        &self.all_results
    }

    pub fn visible_results(&self) -> impl Iterator<Item = &PostOffice> + '_ {
        self.visible.iter().map(|&idx| &self.all_results[idx])
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    fn clear_results(&mut self) {
        self.loaded_code.clear();
        self.all_results.clear();
        self.visible.clear();
    }

    /// the phase to fall back to once an error message is dismissed
    fn settled_phase(&self) -> Phase {
        if self.all_results.is_empty() {
            Phase::Idle
        } else {
            Phase::Loaded
        }
    }
}

/// Returns the session to `Idle` if a lookup future is dropped before it resolves
struct LoadingGuard<'a> {
    state: &'a mut LookupState,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.state.is_loading() {
            warn!("lookup for [{}] was abandoned before it resolved", self.state.query_code);
            self.state.phase = Phase::Idle;
        }
    }
}

/// Owns a lookup session and drives it from user events
#[derive(Debug, Default)]
pub struct LookupController {
    state: LookupState,
    validation: Validation,
    next_ticket: u64,
    latest_ticket: Option<u64>,
}

impl LookupController {
    pub fn new(validation: Validation) -> Self {
        Self {
            validation,
            ..Default::default()
        }
    }

    pub fn state(&self) -> &LookupState {
        &self.state
    }

    /// validate `raw_code` and, if it passes, look it up in `directory`
    ///
    /// Whatever the outcome, the session is no longer loading once this
    /// returns, or once the returned future is dropped.
    pub async fn submit_lookup<D>(&mut self, directory: &D, raw_code: &str)
    where
        D: PostalDirectory + ?Sized,
    {
        let Some(pending) = self.begin_lookup(raw_code) else {
            return;
        };
        let mut guard = LoadingGuard {
            state: &mut self.state,
            armed: true,
        };
        let outcome = directory.fetch(pending.code()).await;
        guard.armed = false;
        drop(guard);

        self.complete_lookup(pending, outcome);
    }

    /// first half of [`Self::submit_lookup`]: validate and enter the loading phase
    ///
    /// Returns `None` when the code is rejected; no request should be made then.
    pub fn begin_lookup(&mut self, raw_code: &str) -> Option<PendingLookup> {
        self.state.query_code = raw_code.to_string();

        let code = raw_code.trim();
        if !self.validation.accepts(code) {
            debug!("rejected postal code [{}]", raw_code);
            self.state.phase = Phase::Failed(LookupError::InvalidCode);
            return None;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        if let (true, Some(outstanding)) = (self.state.is_loading(), self.latest_ticket) {
            debug!("lookup #{} dispatched while #{} is still in flight", ticket, outstanding);
        }
        self.latest_ticket = Some(ticket);

        self.state.clear_results();
        self.state.phase = Phase::Loading;
        info!("looking up postal code [{}] (#{})", code, ticket);

        Some(
            PendingLookup {
                ticket,
                code: code.to_string(),
            }
        )
    }

    /// second half of [`Self::submit_lookup`]: store whatever the directory answered
    ///
    /// Completions are applied in the order they arrive, so a slow earlier
    /// request can overwrite the result of a later one.
    pub fn complete_lookup(&mut self, pending: PendingLookup, outcome: Result<DirectoryResponse, DirectoryError>) {
        if self.latest_ticket != Some(pending.ticket) {
            warn!("lookup #{} for [{}] resolved after a newer lookup was dispatched", pending.ticket, pending.code);
        }

        self.state.clear_results();
        self.state.phase = match outcome {
            Ok(resp) if resp.is_success() => {
                self.state.loaded_code = pending.code.clone();
                self.state.all_results = resp.into_post_offices();
                self.state.visible = (0..self.state.all_results.len()).collect();
                info!("found [{}] post offices for [{}]", self.state.all_results.len(), pending.code);
                Phase::Loaded
            }
            Ok(resp) => {
                info!("no data for [{}], directory status [{}]", pending.code, resp.status());
                Phase::Failed(LookupError::NotFound)
            }
            Err(e) => {
                warn!("cannot look up [{}]: {}", pending.code, e);
                Phase::Failed(LookupError::Transport)
            }
        };
    }

    /// narrow the visible rows to names containing `raw_filter`, ignoring case
    pub fn apply_filter(&mut self, raw_filter: &str) {
        let filter = raw_filter.to_lowercase();
        let state = &mut self.state;

        state.visible = state.all_results.iter()
            .enumerate()
            .filter(|(_, office)| office.name().to_lowercase().contains(&filter))
            .map(|(idx, _)| idx)
            .collect();
        state.filter_text = filter;

        // results are cleared before a lookup is dispatched, so this never
        // runs against a loading session with rows
        if state.is_loading() {
            return;
        }
        state.phase = if state.visible.is_empty() && !state.all_results.is_empty() {
            Phase::Failed(LookupError::NoFilterMatch)
        } else {
            state.settled_phase()
        };
    }
}
