//! Envelope-level error classification.
//!
//! The exchange reports failures inside a JSON body as `{"code": .., "msg": ..}`
//! (or as such objects embedded in an array for batch endpoints). Two codes are
//! recovered locally; everything else is handed to the caller.

use crate::core::errors::ExchangeError;
use crate::core::kernel::context::SharedContext;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const SUCCESS_CODE: i64 = 200;
pub const TIMESTAMP_OUTSIDE_RECV_WINDOW: i64 = -1021;
pub const IP_BANNED: i64 = -1003;

/// Wait used when a -1003 message carries no parseable lift time.
pub const DEFAULT_BAN_WAIT: Duration = Duration::from_secs(60);

/// Outcome of inspecting a decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    ClockSkew { message: String },
    IpBanned { wait: Duration, message: String },
    Failure { code: i64, message: String },
}

fn code_of(value: &Value) -> Option<i64> {
    let code = match value.get("code")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    // A zero code is treated as absent.
    code.filter(|code| *code != 0)
}

/// Extract `(code, message)` from an envelope. Success is `(200, "")`.
///
/// For arrays the first element carrying a non-200 code wins and the message
/// is the whole array, so every per-item error reaches the caller.
pub fn extract_envelope(body: &Value) -> (i64, String) {
    match body {
        Value::Array(items) => items
            .iter()
            .filter(|item| item.is_object())
            .find_map(|item| code_of(item).filter(|code| *code != SUCCESS_CODE))
            .map_or_else(
                || (SUCCESS_CODE, String::new()),
                |code| (code, body.to_string()),
            ),
        Value::Object(_) => code_of(body).map_or_else(
            || (SUCCESS_CODE, String::new()),
            |code| {
                let message = body
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (code, message)
            },
        ),
        _ => (SUCCESS_CODE, String::new()),
    }
}

/// Parse the lift time out of a ban message such as
/// `"Way too many requests; IP banned until 1623288780000. Please use ..."`.
///
/// Returns epoch milliseconds. Second-resolution values are scaled up.
pub fn parse_ban_until(message: &str) -> Option<i64> {
    let rest = &message[message.find("until")? + "until".len()..];
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    let ts: i64 = digits.parse().ok()?;
    if ts < 100_000_000_000 {
        Some(ts * 1000)
    } else {
        Some(ts)
    }
}

/// Remaining ban, rounded up to whole seconds, never negative.
pub fn ban_wait(message: &str, now_ms: i64) -> Option<Duration> {
    let until = parse_ban_until(message)?;
    let remaining_ms = (until - now_ms).max(0) as u64;
    Some(Duration::from_secs(remaining_ms.div_ceil(1000)))
}

/// Classify a decoded body, applying the clock-shift correction for -1021.
pub fn classify(body: &Value, ctx: &SharedContext) -> Classification {
    let (code, message) = extract_envelope(body);
    match code {
        SUCCESS_CODE => Classification::Success,
        TIMESTAMP_OUTSIDE_RECV_WINDOW => {
            let shift = ctx.adjust_clock_shift(-1);
            warn!(clock_shift = shift, "Timestamp outside recvWindow, clock shift corrected");
            Classification::ClockSkew { message }
        }
        IP_BANNED => {
            let wait = ban_wait(&message, Utc::now().timestamp_millis()).unwrap_or_else(|| {
                warn!(message = %message, "Could not parse ban lift time, using default wait");
                DEFAULT_BAN_WAIT
            });
            Classification::IpBanned { wait, message }
        }
        code => Classification::Failure { code, message },
    }
}

/// Classify and act: sleep out an IP ban, then surface the typed error.
pub async fn check_response(body: &Value, ctx: &SharedContext) -> Result<(), ExchangeError> {
    match classify(body, ctx) {
        Classification::Success => Ok(()),
        Classification::ClockSkew { message } => {
            Err(ExchangeError::TimestampOutsideRecvWindow { message })
        }
        Classification::IpBanned { wait, message } => {
            let lift = DateTime::<Utc>::from_timestamp(
                Utc::now().timestamp() + wait.as_secs() as i64,
                0,
            );
            warn!(wait_secs = wait.as_secs(), lift = ?lift, "IP banned by exchange, waiting");
            tokio::time::sleep(wait).await;
            debug!("Ban wait elapsed");
            Err(ExchangeError::IpBanned { wait, message })
        }
        Classification::Failure { code, message } => Err(ExchangeError::ApiError { code, message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"symbol": "BTCUSDT"}))]
    #[case(json!({"code": 200, "msg": "success"}))]
    #[case(json!([{"orderId": 1}, {"orderId": 2}]))]
    #[case(json!([]))]
    #[case(json!({}))]
    fn test_success_envelopes(#[case] body: Value) {
        let ctx = SharedContext::new();
        assert_eq!(classify(&body, &ctx), Classification::Success);
        assert_eq!(ctx.clock_shift(), 0);
    }

    #[test]
    fn test_clock_skew_decrements_shift_once() {
        let ctx = SharedContext::new();
        let body = json!({"code": -1021, "msg": "Timestamp for this request is outside of the recvWindow."});
        assert!(matches!(
            classify(&body, &ctx),
            Classification::ClockSkew { .. }
        ));
        assert_eq!(ctx.clock_shift(), -1);
        classify(&body, &ctx);
        assert_eq!(ctx.clock_shift(), -2);
    }

    #[test]
    fn test_generic_failure_carries_code_and_message() {
        let ctx = SharedContext::new();
        let body = json!({"code": -2019, "msg": "Margin is insufficient."});
        assert_eq!(
            classify(&body, &ctx),
            Classification::Failure {
                code: -2019,
                message: "Margin is insufficient.".to_string()
            }
        );
    }

    #[test]
    fn test_string_code_is_parsed() {
        let (code, _) = extract_envelope(&json!({"code": "-1102", "msg": "Mandatory parameter"}));
        assert_eq!(code, -1102);
    }

    #[test]
    fn test_array_with_embedded_error() {
        let body = json!([
            {"orderId": 1, "status": "NEW"},
            {"code": -2022, "msg": "ReduceOnly Order is rejected."}
        ]);
        let (code, message) = extract_envelope(&body);
        assert_eq!(code, -2022);
        assert!(message.contains("ReduceOnly Order is rejected."));
        assert!(message.contains("orderId"));
    }

    #[test]
    fn test_parse_ban_until() {
        let msg = "Way too many requests; IP banned until 1623288780000. Please use the websocket for live updates to avoid bans.";
        assert_eq!(parse_ban_until(msg), Some(1_623_288_780_000));
        assert_eq!(parse_ban_until("IP banned until 1623288780."), Some(1_623_288_780_000));
        assert_eq!(parse_ban_until("IP banned for a while."), None);
        assert_eq!(parse_ban_until("banned until later."), None);
    }

    #[rstest]
    #[case(10_000, 1_000, 9)]
    #[case(10_000, 9_001, 1)]
    #[case(10_000, 10_000, 0)]
    #[case(10_000, 20_000, 0)]
    fn test_ban_wait_is_non_negative(
        #[case] until: i64,
        #[case] now: i64,
        #[case] expected_secs: u64,
    ) {
        let msg = format!("IP banned until {}. Please use the websocket.", until + 100_000_000_000);
        let wait = ban_wait(&msg, now + 100_000_000_000).unwrap();
        assert_eq!(wait, Duration::from_secs(expected_secs));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ban_blocks_for_computed_wait() {
        let ctx = SharedContext::new();
        let until = Utc::now().timestamp_millis() + 30_000;
        let body = json!({"code": -1003, "msg": format!("IP banned until {}. Bye.", until)});

        let start = tokio::time::Instant::now();
        let err = check_response(&body, &ctx).await.unwrap_err();
        let elapsed = start.elapsed();

        match err {
            ExchangeError::IpBanned { wait, .. } => {
                assert!(wait <= Duration::from_secs(30));
                assert!(wait >= Duration::from_secs(29));
                assert!(elapsed >= wait);
            }
            other => panic!("expected IpBanned, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_ban_uses_default_wait() {
        let ctx = SharedContext::new();
        let body = json!({"code": -1003, "msg": "Too many requests."});
        let start = tokio::time::Instant::now();
        let err = check_response(&body, &ctx).await.unwrap_err();
        assert!(start.elapsed() >= DEFAULT_BAN_WAIT);
        assert!(matches!(err, ExchangeError::IpBanned { wait, .. } if wait == DEFAULT_BAN_WAIT));
    }

    #[tokio::test]
    async fn test_check_response_maps_failure() {
        let ctx = SharedContext::new();
        let err = check_response(&json!({"code": -4164, "msg": "Order's notional must be no smaller than 5"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(-4164));
        assert!(!err.is_retryable());
    }
}
