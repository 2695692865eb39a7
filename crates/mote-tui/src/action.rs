//! Actions — what components ask the App to do.

use mote_client::protocol::PlayerCommand;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Probe and connect to the given host.
    ConnectTo(String),
    /// Drop the connection and return to the address screen.
    Disconnect,
    /// Send a playback command to the player.
    Dispatch(PlayerCommand),
    /// Seek relative to the last known position, in seconds.
    SeekBy(f64),
    /// Show/hide the help overlay.
    ToggleHelp,
    /// Quit the app.
    Quit,
}
