//! External surfaces that mirror playback state. Presenters never own
//! state: the controller pushes a snapshot at every committed transition
//! and each presenter republishes it on its own surface (the media
//! session, the status notification). Input from those surfaces comes
//! back as [`ControlCmd`]s on a channel the host owns.

mod notify;
mod session;

pub use notify::{NotifyPresenter, spawn_notifier};
pub use session::{SessionPresenter, spawn_session};

use crate::playback::Snapshot;

/// Commands arriving from an external surface (media session, notification
/// actions). The host maps these onto the transport.
#[derive(Clone, Debug)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
}

/// One outward-facing mirror of playback state.
///
/// `present` is called on the control thread at every committed
/// transition, in registration order. `deactivate` tears the surface
/// down; after it, the surface must stop claiming anything is playing.
pub trait Presenter: Send {
    fn present(&self, snapshot: &Snapshot);
    fn deactivate(&self);
}
