//! Newline-delimited fragment extraction over a streaming response body.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};

use crate::error::ChatError;
use crate::provider::FragmentStream;

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

struct LineState {
    body: ByteStream,
    buf: Vec<u8>,
    finished: bool,
}

/// Pop one complete line off the buffer, if any. The newline is consumed; a
/// trailing carriage return is stripped.
fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buf.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// Wrap a streaming response into a pull-based sequence of raw lines.
///
/// Fragments are yielded opaque; empty lines are skipped. Each pull waits at
/// most `read_timeout` for the next network segment, after which the stream
/// terminates with [`ChatError::Timeout`]. Dropping the stream closes the
/// connection.
pub(crate) fn ndjson_lines(response: reqwest::Response, read_timeout: Duration) -> FragmentStream {
    let state = LineState {
        body: Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec()))),
        buf: Vec::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, move |mut st| async move {
        loop {
            if st.finished {
                return None;
            }
            while let Some(line) = take_line(&mut st.buf) {
                if !line.is_empty() {
                    return Some((Ok(line), st));
                }
            }

            match tokio::time::timeout(read_timeout, st.body.next()).await {
                Err(_) => {
                    st.finished = true;
                    return Some((Err(ChatError::Timeout(read_timeout)), st));
                }
                Ok(None) => {
                    st.finished = true;
                    let rest = String::from_utf8_lossy(&st.buf).trim().to_owned();
                    if rest.is_empty() {
                        return None;
                    }
                    return Some((Ok(rest), st));
                }
                Ok(Some(Ok(bytes))) => st.buf.extend_from_slice(&bytes),
                Ok(Some(Err(e))) => {
                    st.finished = true;
                    return Some((Err(ChatError::Transport(e)), st));
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_line_splits_on_newline() {
        let mut buf = b"{\"a\":1}\n{\"b\":2}".to_vec();
        assert_eq!(take_line(&mut buf).as_deref(), Some("{\"a\":1}"));
        assert_eq!(take_line(&mut buf), None);
        assert_eq!(buf, b"{\"b\":2}");
    }

    #[test]
    fn take_line_strips_carriage_return() {
        let mut buf = b"hello\r\nrest".to_vec();
        assert_eq!(take_line(&mut buf).as_deref(), Some("hello"));
        assert_eq!(buf, b"rest");
    }

    #[test]
    fn take_line_empty_line() {
        let mut buf = b"\nnext".to_vec();
        assert_eq!(take_line(&mut buf).as_deref(), Some(""));
    }

    #[test]
    fn take_line_no_newline_leaves_buffer() {
        let mut buf = b"partial".to_vec();
        assert_eq!(take_line(&mut buf), None);
        assert_eq!(buf, b"partial");
    }
}
