//! Brace-depth frame reader: reads bytes until a single top-level JSON
//! object is complete, bounded by a read deadline.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::CommandMonitorError;

const MAX_FRAME_BYTES: usize = 1 << 20;

/// Reads one self-delimited JSON object from `reader`, tracking `{`/`}`
/// nesting depth (ignoring braces inside string literals) and stopping as
/// soon as depth returns to zero. Bounded by `deadline`; exceeding it
/// before a complete frame arrives is `ReadDeadlineExceeded`.
pub async fn read_frame<R>(reader: &mut R, deadline: Duration) -> Result<Vec<u8>, CommandMonitorError>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(deadline, read_frame_inner(reader))
        .await
        .map_err(|_| CommandMonitorError::ReadDeadlineExceeded)?
}

async fn read_frame_inner<R>(reader: &mut R) -> Result<Vec<u8>, CommandMonitorError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut depth: i64 = 0;
    let mut started = false;
    let mut in_string = false;
    let mut escaped = false;
    let mut byte = [0u8; 1];

    loop {
        let n = reader
            .read(&mut byte)
            .await
            .map_err(|e| CommandMonitorError::Connection(e.to_string()))?;
        if n == 0 {
            return Err(CommandMonitorError::Connection(
                "connection closed before a complete frame arrived".to_string(),
            ));
        }
        if buf.len() >= MAX_FRAME_BYTES {
            return Err(CommandMonitorError::Connection("frame exceeded the size limit".to_string()));
        }
        let b = byte[0];
        buf.push(b);

        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => {
                started = true;
                depth += 1;
            }
            b'}' => {
                depth -= 1;
                if started && depth == 0 {
                    return Ok(buf);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_exactly_one_nested_object() {
        let mut extra = Cursor::new(br#"{"Command":"x","Nested":{"a":1}}{"Command":"second"}"#.to_vec());
        let frame = read_frame(&mut extra, Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame, br#"{"Command":"x","Nested":{"a":1}}"#);
    }

    #[tokio::test]
    async fn braces_inside_strings_do_not_affect_depth() {
        let mut input = Cursor::new(br#"{"Command":"x","Note":"a { b } c"}"#.to_vec());
        let frame = read_frame(&mut input, Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame, br#"{"Command":"x","Note":"a { b } c"}"#);
    }

    #[tokio::test]
    async fn deadline_exceeded_on_an_incomplete_frame() {
        let mut input = Cursor::new(br#"{"Command":"x""#.to_vec());
        let result = read_frame(&mut input, Duration::from_millis(1)).await;
        assert!(matches!(
            result,
            Err(CommandMonitorError::ReadDeadlineExceeded) | Err(CommandMonitorError::Connection(_))
        ));
    }
}
