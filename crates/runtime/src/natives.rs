//! Built-in native functions.

use std::sync::OnceLock;
use std::time::Instant;

use pythowon_core::value::Value;

static START: OnceLock<Instant> = OnceLock::new();

/// Record the process epoch `clock` measures from. Called once during VM
/// construction; later calls are no-ops.
pub fn mark_start() {
    let _ = START.get_or_init(Instant::now);
}

/// `clock()` — seconds elapsed since the first VM was created.
pub fn clock(_args: &[Value]) -> Value {
    let start = START.get_or_init(Instant::now);
    Value::Number(start.elapsed().as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_returns_monotonic_seconds() {
        mark_start();
        let first = match clock(&[]) {
            Value::Number(n) => n,
            other => panic!("clock returned {other:?}"),
        };
        let second = match clock(&[]) {
            Value::Number(n) => n,
            other => panic!("clock returned {other:?}"),
        };
        assert!(first >= 0.0);
        assert!(second >= first);
    }
}
