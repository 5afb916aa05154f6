//! Timed effects on lore entries: delay, sticky and cooldown.
//!
//! All three are measured in chat length (number of messages) and read the
//! length recorded at the entry's last fresh activation.

use character_card::LoreEntry;

/// What the timers say about an entry at the current chat length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerGate {
    /// The chat is not long enough yet.
    Delayed,
    /// Still inside the sticky window of a previous activation.
    Sticky,
    /// Inside the cooldown window of a previous activation.
    CoolingDown,
    /// No timer applies; keywords decide.
    Open,
}

/// Evaluate the timers of `entry`.
///
/// - delay `d` keeps the entry inactive while `d > chat_len`
/// - sticky `s` keeps it active while `last + s >= chat_len`
/// - cooldown `c` blocks it for chat lengths `last + 1 ..= last + c`
///
/// Sticky wins over cooldown. An entry that never activated is only
/// subject to delay.
pub fn timer_gate(entry: &LoreEntry, chat_len: usize, last_activation: Option<usize>) -> TimerGate {
    if entry.delay > 0 && entry.delay as usize > chat_len {
        return TimerGate::Delayed;
    }

    if let Some(last) = last_activation {
        if entry.sticky > 0 && last + entry.sticky as usize >= chat_len {
            return TimerGate::Sticky;
        }
        if entry.cooldown > 0 && last < chat_len && chat_len <= last + entry.cooldown as usize {
            return TimerGate::CoolingDown;
        }
    }

    TimerGate::Open
}
