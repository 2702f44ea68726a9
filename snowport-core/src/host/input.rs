//! Shared input buffer.
//!
//! One slot per [`InputField`] plus a lock word, all atomics, shared between a writer
//! (window/event thread) and the core. The core polls once per tick:
//! `js_acquire_input_lock` → read fields → `js_release_input_lock`. Releasing consumes
//! the one-shot events (flags, deltas, button change) so each is seen exactly once.
//!
//! Writers take the same lock, spinning briefly; the core's side never blocks and simply
//! skips input for a tick if the writer holds it.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use super::{HostInput, InputField};

const UNLOCKED: i32 = 0;
const LOCKED: i32 = 1;

/// No button change pending.
pub const BUTTON_UNCHANGED: i32 = -1;

#[derive(Debug)]
struct InputBuffer {
    lock: AtomicI32,
    slots: [AtomicI32; InputField::COUNT],
}

impl InputBuffer {
    fn new() -> Self {
        let buffer = Self {
            lock: AtomicI32::new(UNLOCKED),
            slots: std::array::from_fn(|_| AtomicI32::new(0)),
        };
        buffer.set(InputField::MouseButtonState, BUTTON_UNCHANGED);
        buffer
    }

    fn try_lock(&self) -> bool {
        self.lock
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn lock_spinning(&self) {
        while !self.try_lock() {
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    fn unlock(&self) {
        self.lock.store(UNLOCKED, Ordering::Release);
    }

    fn get(&self, field: InputField) -> i32 {
        self.slots[field.index()].load(Ordering::Relaxed)
    }

    fn set(&self, field: InputField, value: i32) {
        self.slots[field.index()].store(value, Ordering::Relaxed);
    }

    fn add(&self, field: InputField, delta: i32) {
        let slot = &self.slots[field.index()];
        let current = slot.load(Ordering::Relaxed);
        slot.store(current.saturating_add(delta), Ordering::Relaxed);
    }

    fn clear_events(&self) {
        self.set(InputField::MousePositionFlag, 0);
        self.set(InputField::MouseDeltaX, 0);
        self.set(InputField::MouseDeltaY, 0);
        self.set(InputField::MouseButtonState, BUTTON_UNCHANGED);
        self.set(InputField::KeyEventFlag, 0);
        self.set(InputField::SpeedFlag, 0);
    }
}

/// Core-facing half; implements [`HostInput`].
#[derive(Debug)]
pub struct SharedInput {
    buffer: Arc<InputBuffer>,
    held: bool,
}

/// A clone reads the same buffer but starts without the lock.
impl Clone for SharedInput {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            held: false,
        }
    }
}

impl SharedInput {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(InputBuffer::new()),
            held: false,
        }
    }

    /// A writer publishing into this buffer.
    pub fn writer(&self) -> InputWriter {
        InputWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl Default for SharedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInput for SharedInput {
    fn acquire_lock(&mut self) -> bool {
        if self.held {
            return true;
        }
        self.held = self.buffer.try_lock();
        self.held
    }

    fn release_lock(&mut self) {
        if !self.held {
            log::warn!("input lock released without being held");
            return;
        }
        self.buffer.clear_events();
        self.held = false;
        self.buffer.unlock();
    }

    fn value(&self, field: InputField) -> i32 {
        self.buffer.get(field)
    }
}

/// Event-source half. Cheap to clone.
#[derive(Clone, Debug)]
pub struct InputWriter {
    buffer: Arc<InputBuffer>,
}

impl InputWriter {
    fn with_lock<R>(&self, f: impl FnOnce(&InputBuffer) -> R) -> R {
        self.buffer.lock_spinning();
        let result = f(&self.buffer);
        self.buffer.unlock();
        result
    }

    /// Absolute pointer position.
    pub fn mouse_position(&self, x: i32, y: i32) {
        self.with_lock(|buffer| {
            buffer.set(InputField::MousePositionX, x);
            buffer.set(InputField::MousePositionY, y);
            buffer.set(InputField::MousePositionFlag, 1);
        });
    }

    /// Relative motion; accumulates until the core consumes it.
    pub fn mouse_motion(&self, dx: i32, dy: i32) {
        self.with_lock(|buffer| {
            buffer.add(InputField::MouseDeltaX, dx);
            buffer.add(InputField::MouseDeltaY, dy);
            buffer.set(InputField::MousePositionFlag, 1);
        });
    }

    pub fn mouse_button(&self, pressed: bool) {
        self.with_lock(|buffer| {
            buffer.set(InputField::MouseButtonState, i32::from(pressed));
        });
    }

    /// Publish a key transition.
    ///
    /// Returns `false` without writing if the previous key event has not been consumed;
    /// retry after the core's next poll.
    pub fn key(&self, code: i32, pressed: bool) -> bool {
        self.with_lock(|buffer| {
            if buffer.get(InputField::KeyEventFlag) != 0 {
                return false;
            }
            buffer.set(InputField::KeyCode, code);
            buffer.set(InputField::KeyState, i32::from(pressed));
            buffer.set(InputField::KeyEventFlag, 1);
            true
        })
    }

    /// Request an emulation speed change (raw speed code).
    pub fn speed(&self, code: i32) {
        self.with_lock(|buffer| {
            buffer.set(InputField::Speed, code);
            buffer.set(InputField::SpeedFlag, 1);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_has_no_events() {
        let input = SharedInput::new();
        assert_eq!(input.value(InputField::MousePositionFlag), 0);
        assert_eq!(input.value(InputField::MouseButtonState), BUTTON_UNCHANGED);
        assert_eq!(input.value(InputField::KeyEventFlag), 0);
        assert_eq!(input.value(InputField::SpeedFlag), 0);
    }

    #[test]
    fn clone_of_a_holder_does_not_own_the_lock() {
        let mut holder = SharedInput::new();
        assert!(holder.acquire_lock());

        let mut copy = holder.clone();
        assert!(!copy.acquire_lock());
        copy.release_lock();
        assert!(!copy.acquire_lock());

        holder.release_lock();
        assert!(copy.acquire_lock());
    }

    #[test]
    fn events_are_consumed_on_release() {
        let mut input = SharedInput::new();
        let writer = input.writer();
        writer.mouse_position(100, 50);
        writer.mouse_button(true);
        assert!(writer.key(0x31, true));
        writer.speed(-1);

        assert!(input.acquire_lock());
        assert_eq!(input.value(InputField::MousePositionFlag), 1);
        assert_eq!(input.value(InputField::MousePositionX), 100);
        assert_eq!(input.value(InputField::MousePositionY), 50);
        assert_eq!(input.value(InputField::MouseButtonState), 1);
        assert_eq!(input.value(InputField::KeyEventFlag), 1);
        assert_eq!(input.value(InputField::KeyCode), 0x31);
        assert_eq!(input.value(InputField::KeyState), 1);
        assert_eq!(input.value(InputField::SpeedFlag), 1);
        assert_eq!(input.value(InputField::Speed), -1);
        input.release_lock();

        assert!(input.acquire_lock());
        assert_eq!(input.value(InputField::MousePositionFlag), 0);
        assert_eq!(input.value(InputField::MouseButtonState), BUTTON_UNCHANGED);
        assert_eq!(input.value(InputField::KeyEventFlag), 0);
        assert_eq!(input.value(InputField::SpeedFlag), 0);
        // Positions persist; only events are one-shot.
        assert_eq!(input.value(InputField::MousePositionX), 100);
        input.release_lock();
    }

    #[test]
    fn deltas_accumulate_between_polls() {
        let mut input = SharedInput::new();
        let writer = input.writer();
        writer.mouse_motion(3, -2);
        writer.mouse_motion(4, -1);

        assert!(input.acquire_lock());
        assert_eq!(input.value(InputField::MouseDeltaX), 7);
        assert_eq!(input.value(InputField::MouseDeltaY), -3);
        input.release_lock();

        assert!(input.acquire_lock());
        assert_eq!(input.value(InputField::MouseDeltaX), 0);
        input.release_lock();
    }

    #[test]
    fn pending_key_event_is_not_overwritten() {
        let mut input = SharedInput::new();
        let writer = input.writer();
        assert!(writer.key(10, true));
        assert!(!writer.key(10, false));

        assert!(input.acquire_lock());
        assert_eq!(input.value(InputField::KeyState), 1);
        input.release_lock();

        assert!(writer.key(10, false));
    }

    #[test]
    fn second_reader_cannot_take_held_lock() {
        let mut first = SharedInput::new();
        let mut second = first.clone();

        assert!(first.acquire_lock());
        assert!(!second.acquire_lock());
        first.release_lock();
        assert!(second.acquire_lock());
        second.release_lock();
    }
}
