/// Daily call budget with a rolling UTC-date window.
///
/// The caller supplies the date key (`YYYY-MM-DD`), which keeps the clock
/// out of this type: tests drive the rollover explicitly, and the server
/// can hold one instance for the process lifetime. State lives in memory,
/// so a restart resets the window.
#[derive(Debug)]
pub struct DailyBudget {
    cap: i64,
    date_key: String,
    used: i64,
}

impl DailyBudget {
    pub fn new(cap: i64) -> Self {
        Self {
            cap,
            date_key: String::new(),
            used: 0,
        }
    }

    pub fn cap(&self) -> i64 {
        self.cap
    }

    pub fn used(&self, today: &str) -> i64 {
        if self.date_key == today { self.used } else { 0 }
    }

    /// Consumes one unit of budget if any remains for `today`.
    /// A cap of zero (or less) refuses every request.
    pub fn try_consume(&mut self, today: &str) -> bool {
        if self.date_key != today {
            self.date_key = today.to_string();
            self.used = 0;
        }
        if self.cap <= 0 || self.used >= self.cap {
            return false;
        }
        self.used += 1;
        true
    }
}
