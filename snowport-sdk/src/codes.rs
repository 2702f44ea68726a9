//! Decoding of the raw values the host hands back.
//!
//! Pure functions, available on every target so they can be tested natively.

/// `js_snapshot_take_kind` results.
pub const SNAPSHOT_NONE: i32 = 0;
pub const SNAPSHOT_SAVE: i32 = 1;
pub const SNAPSHOT_LOAD: i32 = 2;

/// Where the host's staging directory is mounted inside the core.
pub const STAGING_DIR: &str = "/tmp";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    Save,
    Load,
}

impl SnapshotKind {
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            SNAPSHOT_SAVE => Some(SnapshotKind::Save),
            SNAPSHOT_LOAD => Some(SnapshotKind::Load),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotCommand {
    pub kind: SnapshotKind,
    pub request_id: u32,
}

/// Combine a polled kind code and request id. `0` in either position means nothing
/// is pending, as does a kind this SDK does not know.
pub fn decode_snapshot_command(kind: i32, request_id: u32) -> Option<SnapshotCommand> {
    if request_id == 0 {
        return None;
    }
    Some(SnapshotCommand {
        kind: SnapshotKind::from_code(kind)?,
        request_id,
    })
}

/// File the core writes a requested snapshot to.
pub fn save_path(request_id: u32) -> String {
    format!("{STAGING_DIR}/outgoing-vm-snapshot-{request_id}.snows")
}

/// File the host staged a snapshot in for the core to load.
pub fn load_path(request_id: u32) -> String {
    format!("{STAGING_DIR}/incoming-vm-snapshot-{request_id}.snows")
}

/// Emulation speed requested by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmulatorSpeed {
    /// Cycle-accurate timing.
    Accurate,
    /// Accurate while audio plays, uncapped otherwise.
    Dynamic,
    Uncapped,
    /// Paced by video refresh.
    Video,
}

impl EmulatorSpeed {
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -2 => Some(EmulatorSpeed::Accurate),
            7 => Some(EmulatorSpeed::Dynamic),
            -1 => Some(EmulatorSpeed::Uncapped),
            9 => Some(EmulatorSpeed::Video),
            _ => None,
        }
    }

    pub const fn code(self) -> i32 {
        match self {
            EmulatorSpeed::Accurate => -2,
            EmulatorSpeed::Dynamic => 7,
            EmulatorSpeed::Uncapped => -1,
            EmulatorSpeed::Video => 9,
        }
    }
}

/// Keyboard transition with the scancode clamped to a byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    Down(u8),
    Up(u8),
}

impl KeyEvent {
    pub fn decode(code: i32, state: i32) -> Self {
        let scancode = clamp_to_u8(code);
        if state == 0 {
            KeyEvent::Up(scancode)
        } else {
            KeyEvent::Down(scancode)
        }
    }
}

/// Exactly `length` bytes from `read`. Bytes it did not fill (a short read, or a refusal
/// reported as `None`) stay zero.
pub fn zero_filled_read(
    length: usize,
    read: impl FnOnce(&mut [u8]) -> Option<usize>,
) -> Vec<u8> {
    let mut buffer = vec![0u8; length];
    let _ = read(&mut buffer);
    buffer
}

pub fn clamp_to_u8(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}

pub fn clamp_to_u16(value: i32) -> u16 {
    value.clamp(0, u16::MAX as i32) as u16
}

pub fn clamp_to_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
