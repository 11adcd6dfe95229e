use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers, MouseEventKind};
use log::trace;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Keys the control surface cares about, independent of the terminal library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Tab,
    BackTab,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(Key),
    /// positive pages forward through memory
    Scroll(i32),
    Interrupt,
}

/// reads operator input without blocking
pub trait Input {
    /// everything that arrived since the last call
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error>;
}

fn map_key(code: KeyCode, modifiers: KeyModifiers) -> Option<InputEvent> {
    let key = match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            return Some(InputEvent::Interrupt)
        }
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        _ => return None,
    };
    Some(InputEvent::Key(key))
}

/// terminal keyboard and mouse wheel, read through crossterm
#[derive(Default)]
pub struct StdinInput;

impl StdinInput {
    pub fn new() -> Self {
        StdinInput
    }
}

impl Input for StdinInput {
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error> {
        let mut events = Vec::new();
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => match map_key(evt.code, evt.modifiers) {
                    Some(e) => events.push(e),
                    None => trace!("unmapped key {:?}", evt.code),
                },
                Event::Mouse(m) => match m.kind {
                    // wheel down moves further into memory
                    MouseEventKind::ScrollDown => events.push(InputEvent::Scroll(1)),
                    MouseEventKind::ScrollUp => events.push(InputEvent::Scroll(-1)),
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(events)
    }
}

/// dummy Input implementation for testing
pub struct DummyInput {
    events: VecDeque<InputEvent>,
}

impl DummyInput {
    pub fn new(events: &[InputEvent]) -> Self {
        DummyInput {
            events: events.iter().copied().collect(),
        }
    }

    /// type a string as individual key presses
    pub fn typed(text: &str) -> Vec<InputEvent> {
        text.chars().map(|c| InputEvent::Key(Key::Char(c))).collect()
    }
}

impl Input for DummyInput {
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, io::Error> {
        Ok(self.events.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctrl_c_interrupts() {
        assert_eq!(
            map_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(InputEvent::Interrupt)
        );
        assert_eq!(
            map_key(KeyCode::Char('c'), KeyModifiers::NONE),
            Some(InputEvent::Key(Key::Char('c')))
        );
        assert_eq!(map_key(KeyCode::F(1), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_dummy_drains() {
        let mut i = DummyInput::new(&DummyInput::typed("ab"));
        assert_eq!(i.poll_events().unwrap().len(), 2);
        assert!(i.poll_events().unwrap().is_empty());
    }
}
