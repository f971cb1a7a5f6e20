use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{Engine, EngineError, EngineHandle};
use crate::library::Track;
use crate::present::Presenter;

use super::controller::Controller;
use super::queue::Queue;
use super::thread::{PlayerMsg, run_control_loop};
use super::types::{
    LoadRequest, PlaybackState, Snapshot, SnapshotHandle, TransportCmd, TransportError,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Event {
    Attached(u64),
    Started(u64),
    Paused(u64),
    Released(u64),
}

type EventLog = Arc<Mutex<Vec<Event>>>;

fn push(log: &EventLog, event: Event) {
    log.lock().unwrap().push(event);
}

struct FakeSource(u64);

/// Engine double. `prepare` fails for tracks whose path lives under
/// `missing/`; handles report finished when the shared set says so and read
/// their position from the shared map, which `attach` resets to zero the
/// way a freshly bound sink starts from the top.
#[derive(Default)]
struct FakeEngine {
    log: EventLog,
    finished: Arc<Mutex<HashSet<u64>>>,
    positions: Arc<Mutex<HashMap<u64, Duration>>>,
}

impl Engine for FakeEngine {
    type Prepared = FakeSource;
    type Handle = FakeHandle;

    fn prepare(track: &Track) -> Result<FakeSource, EngineError> {
        if track.path.starts_with("missing") {
            return Err(EngineError::Open {
                path: track.path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(FakeSource(track.id))
    }

    fn attach(&mut self, track: &Track, prepared: FakeSource) -> FakeHandle {
        assert_eq!(track.id, prepared.0, "prepared source bound to wrong track");
        push(&self.log, Event::Attached(track.id));
        self.positions
            .lock()
            .unwrap()
            .insert(track.id, Duration::ZERO);
        FakeHandle {
            id: track.id,
            released: false,
            log: self.log.clone(),
            finished: self.finished.clone(),
            positions: self.positions.clone(),
        }
    }
}

struct FakeHandle {
    id: u64,
    released: bool,
    log: EventLog,
    finished: Arc<Mutex<HashSet<u64>>>,
    positions: Arc<Mutex<HashMap<u64, Duration>>>,
}

impl EngineHandle for FakeHandle {
    fn start(&mut self) {
        push(&self.log, Event::Started(self.id));
    }

    fn pause(&mut self) {
        push(&self.log, Event::Paused(self.id));
    }

    fn bound_track(&self) -> u64 {
        self.id
    }

    fn position(&self) -> Duration {
        self.positions
            .lock()
            .unwrap()
            .get(&self.id)
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    fn is_finished(&self) -> bool {
        self.finished.lock().unwrap().contains(&self.id)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            push(&self.log, Event::Released(self.id));
        }
    }
}

#[derive(Default, Clone)]
struct RecordingPresenter {
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
    deactivations: Arc<Mutex<usize>>,
}

impl Presenter for RecordingPresenter {
    fn present(&self, snapshot: &Snapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn deactivate(&self) {
        *self.deactivations.lock().unwrap() += 1;
    }
}

fn track(id: u64, title: &str) -> Track {
    Track {
        id,
        path: PathBuf::from(format!("/music/{title}.mp3")),
        title: title.to_string(),
        artist: String::new(),
        album: String::new(),
        duration: None,
        artwork: None,
        display: title.to_string(),
    }
}

fn missing_track(id: u64) -> Track {
    let mut t = track(id, "broken");
    t.path = PathBuf::from(format!("missing/{id}.mp3"));
    t
}

fn setup(tracks: Vec<Track>) -> (Controller<FakeEngine>, EventLog, Arc<Mutex<HashSet<u64>>>) {
    let engine = FakeEngine::default();
    let log = engine.log.clone();
    let finished = engine.finished.clone();
    let snapshot: SnapshotHandle = Arc::new(Mutex::new(Snapshot::default()));
    let mut controller = Controller::new(engine, snapshot);
    controller.load_queue(tracks);
    (controller, log, finished)
}

fn numbered(n: u64) -> Vec<Track> {
    (0..n).map(|i| track(i, &format!("t{i}"))).collect()
}

/// Runs the loader half synchronously, like the control loop would.
fn drive(
    controller: &mut Controller<FakeEngine>,
    request: Option<LoadRequest>,
) -> Result<bool, TransportError> {
    match request {
        Some(request) => {
            let outcome = FakeEngine::prepare(&request.track);
            controller.complete_load(request.generation, outcome)
        }
        None => Ok(false),
    }
}

fn play_index(controller: &mut Controller<FakeEngine>, index: usize) {
    let request = controller.select_and_play(index).unwrap();
    assert!(drive(controller, request).unwrap());
}

#[test]
fn select_commits_only_when_the_load_lands() {
    let (mut c, _log, _) = setup(numbered(3));

    let request = c.select_and_play(1).unwrap();
    assert_eq!(c.state(), PlaybackState::Idle, "no commit before the load");
    assert_eq!(c.cursor(), None);

    assert!(drive(&mut c, request).unwrap());
    assert_eq!(c.state(), PlaybackState::Playing);
    assert_eq!(c.cursor(), Some(1));
    assert_eq!(c.current_track().map(|t| t.id), Some(1));
}

#[test]
fn out_of_range_select_is_rejected_without_state_change() {
    let (mut c, log, _) = setup(numbered(3));

    let err = c.select_and_play(5).unwrap_err();
    assert!(matches!(
        err,
        TransportError::OutOfRange { index: 5, len: 3 }
    ));
    assert_eq!(c.state(), PlaybackState::Idle);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn navigation_on_an_empty_queue_is_a_no_op() {
    let (mut c, log, _) = setup(Vec::new());

    assert!(c.next().unwrap().is_none());
    assert!(c.previous().unwrap().is_none());
    assert!(c.play().unwrap().is_none());
    assert_eq!(c.state(), PlaybackState::Idle);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn next_wraps_around_and_previous_inverts_it() {
    let (mut c, _log, _) = setup(numbered(3));
    play_index(&mut c, 0);

    for expected in [1, 2, 0] {
        let request = c.next().unwrap();
        assert!(drive(&mut c, request).unwrap());
        assert_eq!(c.cursor(), Some(expected));
    }

    let request = c.previous().unwrap();
    assert!(drive(&mut c, request).unwrap());
    assert_eq!(c.cursor(), Some(2), "previous from the first wraps to the last");
}

#[test]
fn navigation_without_a_cursor_picks_the_edges() {
    let (mut c, _log, _) = setup(numbered(4));
    let request = c.previous().unwrap();
    assert!(drive(&mut c, request).unwrap());
    assert_eq!(c.cursor(), Some(3));

    let (mut c, _log, _) = setup(numbered(4));
    let request = c.next().unwrap();
    assert!(drive(&mut c, request).unwrap());
    assert_eq!(c.cursor(), Some(0));
}

#[test]
fn old_handle_is_released_before_the_new_one_attaches() {
    let (mut c, log, _) = setup(numbered(2));
    play_index(&mut c, 0);
    let request = c.next().unwrap();
    assert!(drive(&mut c, request).unwrap());

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            Event::Attached(0),
            Event::Started(0),
            Event::Released(0),
            Event::Attached(1),
            Event::Started(1),
        ]
    );
}

#[test]
fn pause_and_resume_keep_the_same_handle() {
    let engine = FakeEngine::default();
    let log = engine.log.clone();
    let positions = engine.positions.clone();
    let snapshot: SnapshotHandle = Arc::new(Mutex::new(Snapshot::default()));
    let mut c = Controller::new(engine, snapshot.clone());
    c.load_queue(numbered(2));
    play_index(&mut c, 0);

    positions.lock().unwrap().insert(0, Duration::from_secs(5));
    c.pause();
    assert_eq!(c.state(), PlaybackState::Paused);
    let at_pause = snapshot.lock().unwrap().position;
    assert_eq!(at_pause, Duration::from_secs(5));

    assert!(c.play().unwrap().is_none());
    assert_eq!(c.state(), PlaybackState::Playing);
    let at_resume = snapshot.lock().unwrap().position;
    // A recreated handle would have been re-attached at zero.
    assert!(at_resume >= at_pause, "position must not rewind across resume");

    // No release or re-attach around the pause cycle.
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            Event::Attached(0),
            Event::Started(0),
            Event::Paused(0),
            Event::Started(0),
        ]
    );
}

#[test]
fn toggle_alternates_between_playing_and_paused() {
    let (mut c, _log, _) = setup(numbered(1));
    play_index(&mut c, 0);

    assert!(c.toggle().unwrap().is_none());
    assert_eq!(c.state(), PlaybackState::Paused);
    assert!(c.toggle().unwrap().is_none());
    assert_eq!(c.state(), PlaybackState::Playing);
}

#[test]
fn pause_is_a_no_op_unless_playing() {
    let (mut c, log, _) = setup(numbered(1));
    c.pause();
    assert_eq!(c.state(), PlaybackState::Idle);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn every_committed_transition_fans_out_once() {
    let engine = FakeEngine::default();
    let snapshot: SnapshotHandle = Arc::new(Mutex::new(Snapshot::default()));
    let mut c = Controller::new(engine, snapshot);
    let presenter = RecordingPresenter::default();
    let seen = presenter.snapshots.clone();
    c.add_presenter(Box::new(presenter.clone()));

    c.load_queue(numbered(2));
    play_index(&mut c, 0);
    c.pause();
    assert!(c.play().unwrap().is_none());

    let states: Vec<PlaybackState> = seen.lock().unwrap().iter().map(|s| s.state).collect();
    assert_eq!(
        states,
        vec![
            PlaybackState::Idle,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Playing,
        ]
    );
    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.track.map(|t| t.id), Some(0));
}

#[test]
fn completion_advances_and_wraps() {
    let (mut c, _log, finished) = setup(numbered(2));
    play_index(&mut c, 0);

    finished.lock().unwrap().insert(0);
    let request = c.poll_finished().unwrap();
    assert!(drive(&mut c, request).unwrap());
    assert_eq!(c.cursor(), Some(1));

    finished.lock().unwrap().insert(1);
    let request = c.poll_finished().unwrap();
    assert!(drive(&mut c, request).unwrap());
    assert_eq!(c.cursor(), Some(0), "completion on the last track wraps");
    assert_eq!(c.state(), PlaybackState::Playing);
}

#[test]
fn poll_finished_is_quiet_while_paused_or_loading() {
    let (mut c, _log, finished) = setup(numbered(2));
    play_index(&mut c, 0);
    finished.lock().unwrap().insert(0);

    c.pause();
    assert!(c.poll_finished().unwrap().is_none());
    assert!(c.play().unwrap().is_none());

    // An in-flight load also suppresses polling.
    let request = c.select_and_play(1).unwrap();
    assert!(c.poll_finished().unwrap().is_none());
    assert!(drive(&mut c, request).unwrap());
}

#[test]
fn superseded_load_is_discarded_on_arrival() {
    let (mut c, log, _) = setup(numbered(2));

    let stale = c.select_and_play(0).unwrap();
    let fresh = c.select_and_play(1).unwrap();

    assert!(!drive(&mut c, stale).unwrap(), "stale generation must not commit");
    assert_eq!(c.state(), PlaybackState::Idle);

    assert!(drive(&mut c, fresh).unwrap());
    assert_eq!(c.cursor(), Some(1));
    let attaches = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::Attached(_)))
        .count();
    assert_eq!(attaches, 1, "only the winning load attaches");
}

#[test]
fn load_failure_keeps_the_prior_state() {
    let (mut c, log, _) = setup(vec![track(0, "good"), missing_track(1)]);
    play_index(&mut c, 0);

    let request = c.select_and_play(1).unwrap();
    assert!(drive(&mut c, request).is_err());
    assert_eq!(c.state(), PlaybackState::Playing);
    assert_eq!(c.cursor(), Some(0));
    assert!(
        !log.lock().unwrap().contains(&Event::Released(0)),
        "the live handle survives a failed load"
    );
}

#[test]
fn load_failure_from_idle_stays_idle() {
    let (mut c, _log, _) = setup(vec![missing_track(0)]);
    let request = c.select_and_play(0).unwrap();
    assert!(drive(&mut c, request).is_err());
    assert_eq!(c.state(), PlaybackState::Idle);
    assert_eq!(c.cursor(), None);
}

#[test]
fn failed_auto_advance_falls_back_to_idle() {
    let (mut c, log, finished) = setup(vec![track(0, "good"), missing_track(1)]);
    play_index(&mut c, 0);

    finished.lock().unwrap().insert(0);
    let request = c.poll_finished().unwrap();
    assert!(drive(&mut c, request).is_err());

    // The finished handle has nothing left to play; idle, not a retry loop.
    assert_eq!(c.state(), PlaybackState::Idle);
    assert!(log.lock().unwrap().contains(&Event::Released(0)));
    assert!(c.poll_finished().unwrap().is_none());
}

#[test]
fn queue_replacement_resets_to_idle_and_releases() {
    let (mut c, log, _) = setup(numbered(2));
    play_index(&mut c, 1);

    c.load_queue(numbered(3));
    assert_eq!(c.state(), PlaybackState::Idle);
    assert_eq!(c.cursor(), None);
    assert!(log.lock().unwrap().contains(&Event::Released(1)));
}

#[test]
fn queue_replacement_cancels_an_inflight_load() {
    let (mut c, log, _) = setup(numbered(2));
    let stale = c.select_and_play(0).unwrap();

    c.load_queue(numbered(2));
    assert!(!drive(&mut c, stale).unwrap());
    assert_eq!(c.state(), PlaybackState::Idle);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn shutdown_is_terminal() {
    let engine = FakeEngine::default();
    let log = engine.log.clone();
    let snapshot: SnapshotHandle = Arc::new(Mutex::new(Snapshot::default()));
    let mut c = Controller::new(engine, snapshot);
    let presenter = RecordingPresenter::default();
    let deactivations = presenter.deactivations.clone();
    c.add_presenter(Box::new(presenter));

    c.load_queue(numbered(2));
    play_index(&mut c, 0);
    c.shutdown();

    assert!(c.is_shut_down());
    assert_eq!(c.state(), PlaybackState::Idle);
    assert!(log.lock().unwrap().contains(&Event::Released(0)));
    assert_eq!(*deactivations.lock().unwrap(), 1);

    // Everything after shutdown is a no-op.
    let events_before = log.lock().unwrap().len();
    assert!(c.select_and_play(0).unwrap().is_none());
    assert!(c.play().unwrap().is_none());
    c.load_queue(numbered(1));
    assert!(c.poll_finished().unwrap().is_none());
    c.shutdown();
    assert_eq!(log.lock().unwrap().len(), events_before);
    assert_eq!(*deactivations.lock().unwrap(), 1);
}

#[test]
fn shared_snapshot_tracks_commits() {
    let engine = FakeEngine::default();
    let snapshot: SnapshotHandle = Arc::new(Mutex::new(Snapshot::default()));
    let mut c = Controller::new(engine, snapshot.clone());
    c.load_queue(numbered(2));
    play_index(&mut c, 1);

    let shared = snapshot.lock().unwrap().clone();
    assert!(shared.is_playing());
    assert_eq!(shared.track.map(|t| t.id), Some(1));
}

mod queue_laws {
    use super::*;

    #[test]
    fn replace_resets_the_cursor() {
        let mut q = Queue::new();
        q.replace(numbered(3));
        q.set_cursor(2);
        q.replace(numbered(2));
        assert_eq!(q.cursor(), None);
        assert!(q.current().is_none());
    }

    #[test]
    fn next_applied_len_times_is_the_identity() {
        let mut q = Queue::new();
        q.replace(numbered(5));
        q.set_cursor(2);
        for _ in 0..5 {
            let next = q.next_index().unwrap();
            q.set_cursor(next);
        }
        assert_eq!(q.cursor(), Some(2));
    }

    #[test]
    fn prev_undoes_next() {
        let mut q = Queue::new();
        q.replace(numbered(4));
        for start in 0..4 {
            q.set_cursor(start);
            q.set_cursor(q.next_index().unwrap());
            assert_eq!(q.prev_index(), Some(start));
        }
    }

    #[test]
    fn empty_queue_has_no_neighbors() {
        let q = Queue::new();
        assert_eq!(q.next_index(), None);
        assert_eq!(q.prev_index(), None);
        assert!(q.is_empty());
    }
}

mod control_loop {
    use super::*;

    fn wait_until(mut pred: impl FnMut() -> bool) {
        for _ in 0..200 {
            if pred() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached within 2s");
    }

    #[test]
    fn pause_issued_during_a_load_applies_after_the_commit() {
        let engine = FakeEngine::default();
        let snapshot: SnapshotHandle = Arc::new(Mutex::new(Snapshot::default()));
        let controller = Controller::new(engine, snapshot.clone());

        let (tx, rx) = mpsc::channel::<PlayerMsg<FakeEngine>>();
        let loop_tx = tx.clone();
        let join = std::thread::spawn(move || run_control_loop(controller, rx, loop_tx));

        tx.send(PlayerMsg::Cmd(TransportCmd::LoadQueue(numbered(2))))
            .unwrap();
        tx.send(PlayerMsg::Cmd(TransportCmd::SelectAndPlay(0))).unwrap();
        // Arrives while the load is still in flight; must apply afterwards.
        tx.send(PlayerMsg::Cmd(TransportCmd::Pause)).unwrap();

        wait_until(|| snapshot.lock().unwrap().state == PlaybackState::Paused);
        let shared = snapshot.lock().unwrap().clone();
        assert_eq!(shared.track.map(|t| t.id), Some(0));

        tx.send(PlayerMsg::Cmd(TransportCmd::Shutdown)).unwrap();
        join.join().unwrap();
        assert_eq!(snapshot.lock().unwrap().state, PlaybackState::Idle);
    }
}
