//! Controller action bindings
//!
//! Maps `(input mode, device role, control)` to an abstract [`Command`]. The
//! host executes commands through a [`CommandSink`]; nothing here knows
//! what a command does.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::device::Button;

/// Abstract commands understood by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Accept,
    Cancel,
    Up,
    Down,
    Left,
    Right,
    GoBack,
    GoForward,
    GoUp,
    NextFile,
    PreviousFile,
    OpenFileBrowser,
    FileInfo,
    ZoomActual,
    ZoomFit,
    Play,
    Pause,
    PlayPause,
    SeekBack,
    SeekForward,
    VolumeUp,
    VolumeDown,
    Mute,
}

/// Host application mode; selects which binding set is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputMode {
    #[default]
    FileBrowser,
    ImageViewer,
    VideoPlayer,
}

/// Whether a device is the one driving the synthesized pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Pointer,
    Secondary,
}

impl DeviceRole {
    pub fn of(is_pointer: bool) -> Self {
        if is_pointer {
            DeviceRole::Pointer
        } else {
            DeviceRole::Secondary
        }
    }
}

/// Quantized joystick direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisDirection {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
}

impl AxisDirection {
    pub const ALL: [AxisDirection; 4] = [
        AxisDirection::PositiveX,
        AxisDirection::NegativeX,
        AxisDirection::PositiveY,
        AxisDirection::NegativeY,
    ];

    /// Signed component of `value` along this direction.
    pub fn project(self, value: glam::Vec2) -> f32 {
        match self {
            AxisDirection::PositiveX => value.x,
            AxisDirection::NegativeX => -value.x,
            AxisDirection::PositiveY => value.y,
            AxisDirection::NegativeY => -value.y,
        }
    }
}

/// A physical button or a joystick direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Button(Button),
    Axis(AxisDirection),
}

/// Receives commands fired by controller input.
pub trait CommandSink {
    fn invoke(&mut self, command: Command);
}

impl<F: FnMut(Command)> CommandSink for F {
    fn invoke(&mut self, command: Command) {
        self(command)
    }
}

/// Read-only `(mode, role, control) -> command` table.
#[derive(Debug, Clone, Default)]
pub struct ActionBindings {
    table: HashMap<(InputMode, DeviceRole, Control), Command>,
}

impl ActionBindings {
    pub fn new(entries: impl IntoIterator<Item = ((InputMode, DeviceRole, Control), Command)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
        }
    }

    pub fn lookup(&self, mode: InputMode, role: DeviceRole, control: Control) -> Option<Command> {
        self.table.get(&(mode, role, control)).copied()
    }

    /// Fires the bound command, if any. Returns whether something ran.
    pub fn dispatch(
        &self,
        mode: InputMode,
        role: DeviceRole,
        control: Control,
        sink: &mut dyn CommandSink,
    ) -> bool {
        match self.lookup(mode, role, control) {
            Some(command) => {
                log::debug!("{:?}/{:?}/{:?} -> {:?}", mode, role, control, command);
                sink.invoke(command);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

lazy_static! {
    pub static ref DEFAULT_BINDINGS: ActionBindings = default_bindings();
}

fn default_bindings() -> ActionBindings {
    use AxisDirection::*;
    use Command::*;
    use DeviceRole::*;
    use InputMode::*;

    let b = Control::Button;
    let a = Control::Axis;

    ActionBindings::new([
        // File browser
        ((FileBrowser, Pointer, b(Button::A)), Accept),
        ((FileBrowser, Pointer, b(Button::B)), GoBack),
        ((FileBrowser, Pointer, b(Button::ApplicationMenu)), Cancel),
        ((FileBrowser, Pointer, a(PositiveY)), Up),
        ((FileBrowser, Pointer, a(NegativeY)), Down),
        ((FileBrowser, Pointer, a(NegativeX)), GoBack),
        ((FileBrowser, Pointer, a(PositiveX)), GoForward),
        ((FileBrowser, Secondary, b(Button::Trigger)), Accept),
        ((FileBrowser, Secondary, b(Button::A)), GoUp),
        ((FileBrowser, Secondary, b(Button::B)), GoBack),
        ((FileBrowser, Secondary, b(Button::ApplicationMenu)), Cancel),
        ((FileBrowser, Secondary, a(PositiveY)), Up),
        ((FileBrowser, Secondary, a(NegativeY)), Down),
        ((FileBrowser, Secondary, a(NegativeX)), Left),
        ((FileBrowser, Secondary, a(PositiveX)), Right),
        // Image viewer
        ((ImageViewer, Pointer, b(Button::A)), ZoomFit),
        ((ImageViewer, Pointer, b(Button::B)), ZoomActual),
        ((ImageViewer, Pointer, b(Button::ApplicationMenu)), OpenFileBrowser),
        ((ImageViewer, Pointer, a(NegativeX)), PreviousFile),
        ((ImageViewer, Pointer, a(PositiveX)), NextFile),
        ((ImageViewer, Pointer, a(PositiveY)), FileInfo),
        ((ImageViewer, Secondary, b(Button::Trigger)), NextFile),
        ((ImageViewer, Secondary, b(Button::A)), FileInfo),
        ((ImageViewer, Secondary, b(Button::B)), OpenFileBrowser),
        ((ImageViewer, Secondary, b(Button::ApplicationMenu)), OpenFileBrowser),
        ((ImageViewer, Secondary, a(NegativeX)), PreviousFile),
        ((ImageViewer, Secondary, a(PositiveX)), NextFile),
        // Video player
        ((VideoPlayer, Pointer, b(Button::A)), PlayPause),
        ((VideoPlayer, Pointer, b(Button::B)), Mute),
        ((VideoPlayer, Pointer, b(Button::ApplicationMenu)), OpenFileBrowser),
        ((VideoPlayer, Pointer, a(NegativeX)), SeekBack),
        ((VideoPlayer, Pointer, a(PositiveX)), SeekForward),
        ((VideoPlayer, Pointer, a(PositiveY)), VolumeUp),
        ((VideoPlayer, Pointer, a(NegativeY)), VolumeDown),
        ((VideoPlayer, Secondary, b(Button::Trigger)), PlayPause),
        ((VideoPlayer, Secondary, b(Button::A)), Play),
        ((VideoPlayer, Secondary, b(Button::B)), Pause),
        ((VideoPlayer, Secondary, b(Button::ApplicationMenu)), OpenFileBrowser),
        ((VideoPlayer, Secondary, a(NegativeX)), PreviousFile),
        ((VideoPlayer, Secondary, a(PositiveX)), NextFile),
        ((VideoPlayer, Secondary, a(PositiveY)), VolumeUp),
        ((VideoPlayer, Secondary, a(NegativeY)), VolumeDown),
    ])
}
