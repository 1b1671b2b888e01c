// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Commands delivered to experiment logic.
///
/// Raw device events are translated into this fixed set by the input
/// provider before they reach the `input` hook, so experiments are written
/// against responses, not key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Nothing was selected.
    None,
    /// Close the window and stop the loop.
    Close,
    /// Pause or resume the presentation.
    Pause,
    /// Affirmative response for binary paradigms.
    Yes,
    /// Item 1 selected.
    Item1,
    /// Item 2 selected.
    Item2,
    /// Item 3 selected.
    Item3,
    /// Item 4 selected.
    Item4,
    /// Item 5 selected.
    Item5,
    /// Item 6 selected.
    Item6,
    /// Item 7 selected.
    Item7,
    /// Item 8 selected.
    Item8,
    /// Item 9 selected.
    Item9,
}

impl Command {
    /// Maps a digit 1 to 9 to the corresponding item selector.
    pub fn item(n: u8) -> Option<Command> {
        match n {
            1 => Some(Command::Item1),
            2 => Some(Command::Item2),
            3 => Some(Command::Item3),
            4 => Some(Command::Item4),
            5 => Some(Command::Item5),
            6 => Some(Command::Item6),
            7 => Some(Command::Item7),
            8 => Some(Command::Item8),
            9 => Some(Command::Item9),
            _ => None,
        }
    }

    /// The item number for item-selector commands, if any.
    pub fn item_number(&self) -> Option<u8> {
        match self {
            Command::Item1 => Some(1),
            Command::Item2 => Some(2),
            Command::Item3 => Some(3),
            Command::Item4 => Some(4),
            Command::Item5 => Some(5),
            Command::Item6 => Some(6),
            Command::Item7 => Some(7),
            Command::Item8 => Some(8),
            Command::Item9 => Some(9),
            _ => None,
        }
    }
}

/// Source of translated input commands, polled once per tick.
///
/// Implementations translate raw device events (keyboard, clicker, serial
/// button box) into `Command`s. The engine stamps each command with the
/// elapsed time at which it was drained and forwards it to the experiment
/// logic `input` hook.
pub trait InputProvider {
    /// Returns the next queued command, or `None` when the queue is empty.
    fn poll_command(&mut self) -> Option<Command>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_map_to_item_selectors() {
        for n in 1..=9u8 {
            let cmd = Command::item(n).unwrap();
            assert_eq!(cmd.item_number(), Some(n));
        }
        assert_eq!(Command::item(0), None);
        assert_eq!(Command::item(10), None);
        assert_eq!(Command::Yes.item_number(), None);
    }
}
