//! Roster download from a handheld over config-data requests.
//!
//! A roster fetch walks through three request kinds:
//!
//! ```text
//!            start
//!              │
//!              ▼
//!     ┌──────────────────┐  failure   ┌──────────────────────────┐
//!     │ AwaitingLocoList │──────────▶│ AwaitingLocoNamesLegacy  │◀─┐ page
//!     └──────────────────┘            └──────────────────────────┘──┘
//!              │ names                       │ all names
//!              ▼                             ▼
//!     ┌──────────────────┐◀──────────────────┘
//!     │ AwaitingLocoInfo │◀─┐ next name
//!     └──────────────────┘──┘
//!              │ last name
//!              ▼
//!            Idle  (sink.finished)
//! ```
//!
//! Newer handhelds answer `lokliste` with every name at once; older ones
//! reject it and are paged through `loknamen` two names at a time. Each
//! name is then fetched with `lokinfo`, rewritten by
//! [`transform_loco`](crate::dialect::transform_loco) and written to the
//! [`RosterSink`].
//!
//! Only one request is in flight at a time. An unanswered request is resent
//! after [`SessionConfig::timeout_ms`], up to
//! [`SessionConfig::max_cmd_repeat`] times, before counting as a failure.

extern crate alloc;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::{debug, error, info, warn};

use crate::commands::BusCommand;
use crate::config::SessionConfig;
use crate::dialect::{transform_loco, ROSTER_HEADER};
use crate::parsing::{extract_names, get_number, get_parameter, section_tag};
use crate::stream::DataType;
use crate::traits::TrainboxBus;

/// Names requested per legacy page.
const NAMES_PER_PAGE: usize = 2;

// ============================================================================
// Collaborators
// ============================================================================

/// Destination of a roster download.
///
/// `write` receives the roster file in order: the header, then one
/// `lokomotive` section per locomotive. `finished` is called exactly once
/// per fetch.
pub trait RosterSink {
    /// Append a chunk of roster text.
    fn write(&mut self, chunk: &str);

    /// The fetch ended.
    fn finished(&mut self, success: bool);
}

/// [`RosterSink`] built from two closures.
///
/// # Example
///
/// ```rust
/// use rs_trainbridge::session::{CallbackSink, RosterSink};
///
/// let mut text = String::new();
/// let mut sink = CallbackSink::new(|chunk: &str| text.push_str(chunk), |_ok| {});
/// sink.write("[lokomotive]\n");
/// drop(sink);
/// assert_eq!(text, "[lokomotive]\n");
/// ```
pub struct CallbackSink<W, D>
where
    W: FnMut(&str),
    D: FnMut(bool),
{
    write: W,
    done: D,
}

impl<W, D> CallbackSink<W, D>
where
    W: FnMut(&str),
    D: FnMut(bool),
{
    /// Wrap a chunk writer and a completion callback.
    pub fn new(write: W, done: D) -> Self {
        Self { write, done }
    }
}

impl<W, D> RosterSink for CallbackSink<W, D>
where
    W: FnMut(&str),
    D: FnMut(bool),
{
    fn write(&mut self, chunk: &str) {
        (self.write)(chunk)
    }

    fn finished(&mut self, success: bool) {
        (self.done)(success)
    }
}

/// Something that can put a config-data request on the bus.
pub trait ConfigRequester {
    /// Issue a request. Returns `false` when it could not be sent.
    fn request_config(&mut self, kind: DataType, info: &str) -> bool;
}

impl<B: TrainboxBus> ConfigRequester for B {
    fn request_config(&mut self, kind: DataType, info: &str) -> bool {
        match self.send(BusCommand::ConfigDataRequest {
            kind,
            info: info.to_string(),
        }) {
            Ok(()) => true,
            Err(e) => {
                warn!("config request {kind} '{info}' not sent: {e:?}");
                false
            }
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Phase of a roster download.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No download running.
    #[default]
    Idle,
    /// Waiting for the full name list.
    AwaitingLocoList,
    /// Waiting for one locomotive's configuration.
    AwaitingLocoInfo,
    /// Paging through names on a legacy handheld.
    AwaitingLocoNamesLegacy,
}

/// State of the single roster download.
pub struct ConfigSession {
    config: SessionConfig,
    phase: SessionPhase,
    sink: Option<Box<dyn RosterSink>>,
    names: Vec<String>,
    index: usize,
    expected_names: usize,
    request: Option<(DataType, String)>,
    in_flight: bool,
    repeats: u8,
    last_request_ms: u64,
}

impl ConfigSession {
    /// Create an idle session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            phase: SessionPhase::Idle,
            sink: None,
            names: Vec::new(),
            index: 0,
            expected_names: 0,
            request: None,
            in_flight: false,
            repeats: 0,
            last_request_ms: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// True while a download is running.
    pub fn is_active(&self) -> bool {
        self.phase != SessionPhase::Idle
    }

    /// True while a request waits for its answer.
    pub fn is_waiting(&self) -> bool {
        self.in_flight
    }

    /// Locomotive names collected so far.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Request currently outstanding or last sent.
    pub fn current_request(&self) -> Option<(DataType, &str)> {
        self.request.as_ref().map(|(kind, info)| (*kind, info.as_str()))
    }

    /// Begin a roster download.
    ///
    /// Returns `false` (and reports failure to `sink`) when a download is
    /// already running.
    pub fn start<R: ConfigRequester + ?Sized>(
        &mut self,
        mut sink: Box<dyn RosterSink>,
        requester: &mut R,
        now_ms: u64,
    ) -> bool {
        if self.is_active() {
            warn!("roster fetch already running");
            sink.finished(false);
            return false;
        }
        info!("fetching loco roster");
        self.sink = Some(sink);
        self.names.clear();
        self.index = 0;
        self.expected_names = 0;
        self.phase = SessionPhase::AwaitingLocoList;
        self.issue(DataType::LocoList, String::new(), requester, now_ms);
        true
    }

    /// Feed a complete response (`Some(text)`) or a failure (`None`).
    pub fn on_response<R: ConfigRequester + ?Sized>(
        &mut self,
        response: Option<&str>,
        requester: &mut R,
        now_ms: u64,
    ) {
        if !self.in_flight {
            match response {
                Some(text) if section_tag(text) == Some("lokliste") => {
                    info!("unsolicited loco list received ({} bytes), discarded", text.len())
                }
                Some(text) => debug!("unsolicited config data ({} bytes), discarded", text.len()),
                None => debug!("config data failure without a request"),
            }
            return;
        }
        self.in_flight = false;

        match (self.phase, response) {
            (SessionPhase::Idle, _) => {}
            (SessionPhase::AwaitingLocoList, Some(text)) => self.on_loco_list(text, requester, now_ms),
            (SessionPhase::AwaitingLocoList, None) => {
                info!("loco list not supported, paging through loco names");
                self.phase = SessionPhase::AwaitingLocoNamesLegacy;
                self.request_names_page(requester, now_ms);
            }
            (SessionPhase::AwaitingLocoInfo, Some(text)) => {
                let name = self.names.get(self.index).map(String::as_str).unwrap_or_default();
                match transform_loco(name, text) {
                    Ok(section) => {
                        if let Some(sink) = self.sink.as_mut() {
                            sink.write(&section);
                        }
                    }
                    Err(e) => warn!("skipping loco '{}': {}", name, e),
                }
                self.next_loco(requester, now_ms);
            }
            (SessionPhase::AwaitingLocoInfo, None) => {
                let name = self.names.get(self.index).map(String::as_str).unwrap_or_default();
                warn!("could not get loco '{}'", name);
                self.next_loco(requester, now_ms);
            }
            (SessionPhase::AwaitingLocoNamesLegacy, Some(text)) => {
                self.on_names_page(text, requester, now_ms)
            }
            (SessionPhase::AwaitingLocoNamesLegacy, None) => {
                error!("could not read loco names");
                self.finish(false);
            }
        }
    }

    /// Resend or fail an unanswered request once its timeout has passed.
    pub fn poll<R: ConfigRequester + ?Sized>(&mut self, requester: &mut R, now_ms: u64) {
        if !self.in_flight || self.last_request_ms + self.config.timeout_ms >= now_ms {
            return;
        }
        if self.repeats < self.config.max_cmd_repeat {
            self.repeats += 1;
            if let Some((kind, info)) = self.request.as_ref() {
                warn!(
                    "config request {} '{}' timed out, resending ({}/{})",
                    kind,
                    info,
                    self.repeats,
                    self.config.max_cmd_repeat
                );
                requester.request_config(*kind, info);
            }
            self.last_request_ms = now_ms;
        } else {
            warn!("config request gave up after {} resends", self.repeats);
            self.on_response(None, requester, now_ms);
        }
    }

    // ------------------------------------------------------------------------
    // Phase handlers
    // ------------------------------------------------------------------------

    fn on_loco_list<R: ConfigRequester + ?Sized>(&mut self, text: &str, requester: &mut R, now_ms: u64) {
        self.names = extract_names(text);
        if self.names.is_empty() {
            error!("no locos could be read");
            self.finish(false);
            return;
        }
        info!("{} locos in list", self.names.len());
        self.begin_loco_info(requester, now_ms);
    }

    fn on_names_page<R: ConfigRequester + ?Sized>(&mut self, text: &str, requester: &mut R, now_ms: u64) {
        if self.names.is_empty() {
            match get_number(text, ".wert=") {
                Some(count) => self.expected_names = usize::from(count),
                None => {
                    info!("handheld reports no locos");
                    self.finish(true);
                    return;
                }
            }
        }

        let before = self.names.len();
        let mut from = 0;
        while self.names.len() < self.expected_names && self.names.len() - before < NAMES_PER_PAGE {
            let Some((name, next)) = get_parameter(text, ".name=", from) else {
                break;
            };
            from = next;
            if !name.is_empty() {
                self.names.push(name.to_string());
            }
        }

        if self.names.len() == before && self.names.len() < self.expected_names {
            warn!(
                "loco names page empty, continuing with {} of {}",
                self.names.len(),
                self.expected_names
            );
            self.expected_names = self.names.len();
        }

        if self.names.len() < self.expected_names {
            self.request_names_page(requester, now_ms);
        } else if self.names.is_empty() {
            info!("handheld reports no locos");
            self.finish(true);
        } else {
            info!("{} loco names read", self.names.len());
            self.begin_loco_info(requester, now_ms);
        }
    }

    fn begin_loco_info<R: ConfigRequester + ?Sized>(&mut self, requester: &mut R, now_ms: u64) {
        if let Some(sink) = self.sink.as_mut() {
            sink.write(ROSTER_HEADER);
        }
        self.phase = SessionPhase::AwaitingLocoInfo;
        self.index = 0;
        let name = self.names[0].clone();
        self.issue(DataType::LocoInfo, name, requester, now_ms);
    }

    fn next_loco<R: ConfigRequester + ?Sized>(&mut self, requester: &mut R, now_ms: u64) {
        self.index += 1;
        match self.names.get(self.index) {
            Some(name) => {
                let name = name.clone();
                self.issue(DataType::LocoInfo, name, requester, now_ms);
            }
            None => {
                info!("roster complete, {} locos", self.names.len());
                self.finish(true);
            }
        }
    }

    fn request_names_page<R: ConfigRequester + ?Sized>(&mut self, requester: &mut R, now_ms: u64) {
        let page = format!("{} {}", self.names.len(), NAMES_PER_PAGE);
        self.issue(DataType::LocoNames, page, requester, now_ms);
    }

    fn issue<R: ConfigRequester + ?Sized>(
        &mut self,
        kind: DataType,
        info: String,
        requester: &mut R,
        now_ms: u64,
    ) {
        debug!("config request {kind} '{info}'");
        // A failed send is retried by `poll` like a lost answer.
        requester.request_config(kind, &info);
        self.request = Some((kind, info));
        self.in_flight = true;
        self.repeats = 0;
        self.last_request_ms = now_ms;
    }

    fn finish(&mut self, success: bool) {
        self.phase = SessionPhase::Idle;
        self.in_flight = false;
        if let Some(mut sink) = self.sink.take() {
            sink.finished(success);
        }
    }
}
