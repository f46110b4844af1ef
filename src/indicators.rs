//! Rolling statistics over daily series.
//!
//! Each indicator maintains its own state and is updated one value at a time.

use std::collections::VecDeque;

/// Trailing simple moving average over a fixed window.
///
/// A value is produced only once the window is full, and only when every
/// value in the window is present.
#[derive(Debug, Clone)]
pub struct Sma {
    window: VecDeque<Option<f64>>,
    period: usize,
    missing: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            window: VecDeque::new(),
            period: period.max(1),
            missing: 0,
        }
    }

    pub fn update(&mut self, value: Option<f64>) -> Option<f64> {
        if value.is_none() {
            self.missing += 1;
        }
        self.window.push_back(value);
        if self.window.len() > self.period && self.window.pop_front().flatten().is_none() {
            self.missing -= 1;
        }
        self.get()
    }

    pub fn get(&self) -> Option<f64> {
        if !self.is_ready() || self.missing > 0 {
            return None;
        }
        Some(self.window.iter().flatten().sum::<f64>() / self.period as f64)
    }

    pub fn is_ready(&self) -> bool {
        self.window.len() >= self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_window_full() {
        let mut sma = Sma::new(3);
        assert_eq!(sma.update(Some(1.0)), None);
        assert_eq!(sma.update(Some(2.0)), None);
        assert_eq!(sma.update(Some(3.0)), Some(2.0));
        assert_eq!(sma.update(Some(6.0)), Some(11.0 / 3.0));
    }

    #[test]
    fn missing_value_poisons_its_windows() {
        let mut sma = Sma::new(2);
        sma.update(Some(1.0));
        assert_eq!(sma.update(None), None);
        assert_eq!(sma.update(Some(4.0)), None);
        assert_eq!(sma.update(Some(6.0)), Some(5.0));
    }

    #[test]
    fn oversized_window_never_ready() {
        let mut sma = Sma::new(usize::MAX);
        for v in 0..100 {
            assert_eq!(sma.update(Some(v as f64)), None);
        }
        assert!(!sma.is_ready());
    }
}
