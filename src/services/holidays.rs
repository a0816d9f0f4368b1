use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

/// Brazilian civil holidays that fall on the same day every year.
const BRAZIL_FIXED_HOLIDAYS: &[(u32, u32)] = &[
    (1, 1),   // Confraternização Universal
    (4, 21),  // Tiradentes
    (5, 1),   // Dia do Trabalho
    (9, 7),   // Independência
    (10, 12), // Nossa Senhora Aparecida
    (11, 2),  // Finados
    (11, 15), // Proclamação da República
    (11, 20), // Consciência Negra
    (12, 25), // Natal
];

/// Public-holiday lookup for the quote calculator.
///
/// Movable feasts (Carnaval, Sexta-feira Santa, Corpus Christi) have no
/// fixed month/day; they are injected per year as extra dates through
/// `HOLIDAY_EXTRA_DATES`.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    fixed: BTreeSet<(u32, u32)>,
    extra_dates: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn brazil() -> Self {
        Self {
            fixed: BRAZIL_FIXED_HOLIDAYS.iter().copied().collect(),
            extra_dates: BTreeSet::new(),
        }
    }

    pub fn with_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.extra_dates.extend(dates);
        self
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.fixed.contains(&(date.month(), date.day())) || self.extra_dates.contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fixed_holidays_recur_every_year() {
        let calendar = HolidayCalendar::brazil();
        assert!(calendar.is_holiday(date(2025, 12, 25)));
        assert!(calendar.is_holiday(date(2026, 12, 25)));
        assert!(calendar.is_holiday(date(2026, 9, 7)));
        assert!(!calendar.is_holiday(date(2026, 9, 8)));
    }

    #[test]
    fn extra_dates_cover_movable_feasts() {
        // Carnaval 2026 (Feb 17) is not a fixed-date holiday.
        let carnaval = date(2026, 2, 17);
        let calendar = HolidayCalendar::brazil();
        assert!(!calendar.is_holiday(carnaval));

        let calendar = calendar.with_dates([carnaval]);
        assert!(calendar.is_holiday(carnaval));
        // Extras are year-specific.
        assert!(!calendar.is_holiday(date(2027, 2, 17)));
    }

    #[test]
    fn empty_calendar_has_no_holidays() {
        let calendar = HolidayCalendar::empty();
        assert!(!calendar.is_holiday(date(2026, 1, 1)));
        assert!(!calendar.is_holiday(date(2026, 12, 25)));
    }
}
