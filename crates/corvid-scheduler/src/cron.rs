use chrono::{DateTime, Datelike, Local, Timelike};

use corvid_core::{CorvidError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    Wildcard,
    Exact(u32),
    Step(u32),
}

impl CronField {
    fn parse(field: &str) -> Result<Self> {
        if field == "*" {
            return Ok(CronField::Wildcard);
        }
        if let Some(step_str) = field.strip_prefix("*/") {
            let step: u32 = step_str
                .parse()
                .map_err(|_| CorvidError::Config(format!("invalid cron step field: {field}")))?;
            if step == 0 {
                return Err(CorvidError::Config(format!("cron step must be >= 1: {field}")));
            }
            return Ok(CronField::Step(step));
        }
        let exact: u32 = field
            .parse()
            .map_err(|_| CorvidError::Config(format!("invalid cron field: {field}")))?;
        Ok(CronField::Exact(exact))
    }

    fn matches(&self, time_val: u32) -> bool {
        match self {
            CronField::Wildcard => true,
            CronField::Exact(n) => *n == time_val,
            CronField::Step(n) => time_val % n == 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CronExpr {
    minute: CronField,
    hour: CronField,
    mday: CronField,
    month: CronField,
    wday: CronField,
}

impl CronExpr {
    /// Parse a standard 5-field cron expression: `minute hour mday month wday`.
    /// No ranges, no lists, no named months/days — just `*`, `*/N`, and exact
    /// integers.
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CorvidError::Config(format!(
                "cron expression must have exactly 5 fields, got {}: {expr}",
                fields.len()
            )));
        }

        Ok(Self {
            minute: CronField::parse(fields[0])?,
            hour: CronField::parse(fields[1])?,
            mday: CronField::parse(fields[2])?,
            month: CronField::parse(fields[3])?,
            wday: CronField::parse(fields[4])?,
        })
    }

    pub fn matches(&self, now: &DateTime<Local>) -> bool {
        self.minute.matches(now.minute())
            && self.hour.matches(now.hour())
            && self.mday.matches(now.day())
            && self.month.matches(now.month())
            && self.wday.matches(now.weekday().num_days_from_sunday())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn all_wildcards_match_every_time() {
        let expr = CronExpr::parse("* * * * *").unwrap();
        assert!(expr.matches(&local(2026, 7, 27, 13, 45)));
    }

    #[test]
    fn exact_minute_only_matches_that_minute() {
        let expr = CronExpr::parse("30 * * * *").unwrap();
        assert!(expr.matches(&local(2026, 7, 27, 13, 30)));
        assert!(!expr.matches(&local(2026, 7, 27, 13, 31)));
    }

    #[test]
    fn step_field_matches_multiples() {
        let expr = CronExpr::parse("*/15 * * * *").unwrap();
        assert!(expr.matches(&local(2026, 7, 27, 13, 0)));
        assert!(expr.matches(&local(2026, 7, 27, 13, 15)));
        assert!(!expr.matches(&local(2026, 7, 27, 13, 16)));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronExpr::parse("* * * *").is_err());
        assert!(CronExpr::parse("* * * * * *").is_err());
    }

    #[test]
    fn rejects_zero_step() {
        assert!(CronExpr::parse("*/0 * * * *").is_err());
    }
}
