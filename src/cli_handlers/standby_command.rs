use chrono::{Local, NaiveDateTime};
use serde_json::json;

use super::utils::print_json;
use crate::error::{RelayError, Result};
use crate::standby;

pub fn handle_standby_command(
    start: &str,
    end: &str,
    at: Option<&str>,
    disabled: bool,
) -> Result<()> {
    let now = resolve_now(at)?;
    let standby = standby::evaluate(now, start, end, !disabled);
    print_json(&json!({ "standby": standby }))
}

/// `--at HH:MM` on today's date, or the current local time.
fn resolve_now(at: Option<&str>) -> Result<NaiveDateTime> {
    let today = Local::now().naive_local();
    match at {
        None => Ok(today),
        Some(raw) => standby::parse_hhmm(raw)
            .map(|time| today.date().and_time(time))
            .ok_or_else(|| RelayError::InvalidInput(format!("--at must be HH:MM, got '{}'", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_resolve_now_uses_given_time() {
        let now = resolve_now(Some("23:30")).unwrap();
        assert_eq!((now.hour(), now.minute(), now.second()), (23, 30, 0));
    }

    #[test]
    fn test_resolve_now_rejects_garbage() {
        let err = resolve_now(Some("late")).unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
    }
}
