#![forbid(unsafe_code)]

use crossterm::event::{KeyCode, KeyEvent};
use time::{Date, Duration, Month, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerOutcome {
    Pending,
    Confirmed(OffsetDateTime),
    Cancelled,
}

/// Modal day picker. Only the calendar date moves; the time of day is kept.
#[derive(Debug, Clone)]
pub struct DatePicker {
    current: OffsetDateTime,
}

impl DatePicker {
    #[must_use]
    pub fn new(initial: OffsetDateTime) -> Self {
        Self { current: initial }
    }

    #[must_use]
    pub fn current(&self) -> OffsetDateTime {
        self.current
    }

    pub fn shift_days(&mut self, days: i64) {
        if let Some(next) = self.current.checked_add(Duration::days(days)) {
            self.current = next;
        }
    }

    pub fn shift_month(&mut self, forward: bool) {
        let date = shift_month(self.current.date(), forward);
        self.current = self.current.replace_date(date);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickerOutcome {
        match key.code {
            KeyCode::Esc => return PickerOutcome::Cancelled,
            KeyCode::Enter => return PickerOutcome::Confirmed(self.current),
            KeyCode::Left | KeyCode::Char('h') => self.shift_days(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_days(1),
            KeyCode::Up | KeyCode::Char('k') => self.shift_days(-7),
            KeyCode::Down | KeyCode::Char('j') => self.shift_days(7),
            KeyCode::PageUp => self.shift_month(false),
            KeyCode::PageDown => self.shift_month(true),
            _ => {}
        }
        PickerOutcome::Pending
    }
}

fn shift_month(date: Date, forward: bool) -> Date {
    let (year, month) = match (forward, date.month()) {
        (true, Month::December) => (date.year() + 1, Month::January),
        (false, Month::January) => (date.year() - 1, Month::December),
        (true, m) => (date.year(), m.next()),
        (false, m) => (date.year(), m.previous()),
    };
    let day = date.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use time::macros::datetime;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_move_days_and_weeks() {
        let mut picker = DatePicker::new(datetime!(2024-01-01 8:00 UTC));
        picker.handle_key(key(KeyCode::Right));
        picker.handle_key(key(KeyCode::Down));
        assert_eq!(picker.current(), datetime!(2024-01-09 8:00 UTC));
        picker.handle_key(key(KeyCode::Left));
        assert_eq!(picker.current(), datetime!(2024-01-08 8:00 UTC));
    }

    #[test]
    fn month_steps_clamp_to_month_length() {
        let mut picker = DatePicker::new(datetime!(2024-01-31 0:00 UTC));
        picker.handle_key(key(KeyCode::PageDown));
        assert_eq!(picker.current(), datetime!(2024-02-29 0:00 UTC));

        let mut picker = DatePicker::new(datetime!(2024-01-15 0:00 UTC));
        picker.handle_key(key(KeyCode::PageUp));
        assert_eq!(picker.current(), datetime!(2023-12-15 0:00 UTC));
    }

    #[test]
    fn enter_confirms_and_escape_cancels() {
        let mut picker = DatePicker::new(datetime!(2024-01-01 0:00 UTC));
        picker.handle_key(key(KeyCode::Right));
        assert_eq!(
            picker.handle_key(key(KeyCode::Enter)),
            PickerOutcome::Confirmed(datetime!(2024-01-02 0:00 UTC))
        );
        assert_eq!(picker.handle_key(key(KeyCode::Esc)), PickerOutcome::Cancelled);
    }
}
