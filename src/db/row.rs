use futures::{stream, Stream, StreamExt};
use serde::Deserialize;

use crate::error::{Error, Result};

/// One result row: column name → value, in server column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Body of a `FORMAT JSON` response. Only `data` is read.
#[derive(Debug, Deserialize)]
struct JsonResponse {
    #[serde(default)]
    data: Vec<Row>,
}

/// Rows of a `FORMAT JSON` body. An empty body is a statement without a
/// result set.
pub fn parse_json_body(body: &str) -> Result<Vec<Row>> {
    if body.trim().is_empty() {
        return Ok(vec![]);
    }
    let response: JsonResponse = serde_json::from_str(body)?;
    Ok(response.data)
}

fn parse_line(line: &[u8]) -> Result<Row> {
    serde_json::from_slice(line).map_err(|e| {
        Error::MalformedResponse(format!(
            "{}: {}",
            e,
            String::from_utf8_lossy(line).chars().take(200).collect::<String>()
        ))
    })
}

/// Decode a `JSONEachRow` byte stream into rows as lines complete.
pub fn decode_rows<S, B, E>(bytes: S) -> impl Stream<Item = Result<Row>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    stream::unfold(
        (bytes, Vec::<u8>::new(), false),
        |(mut bytes, mut buf, mut eof)| async move {
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = line[..pos].trim_ascii();
                    if line.is_empty() {
                        continue;
                    }
                    let row = parse_line(line);
                    if row.is_err() {
                        // A bad line ends the stream.
                        buf.clear();
                        eof = true;
                    }
                    return Some((row, (bytes, buf, eof)));
                }
                if eof {
                    if buf.trim_ascii().is_empty() {
                        return None;
                    }
                    let rest = std::mem::take(&mut buf);
                    return Some((parse_line(rest.trim_ascii()), (bytes, buf, eof)));
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                    Some(Err(e)) => {
                        buf.clear();
                        return Some((Err(e.into()), (bytes, buf, true)));
                    }
                    None => eof = true,
                }
            }
        },
    )
}

/// Integers arrive as JSON numbers or, for 64-bit types, as strings.
pub fn value_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn value_as_bool(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_u64().map(|n| n != 0),
        serde_json::Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// First column of the first row, if any.
pub fn first_value(rows: &[Row]) -> Option<&serde_json::Value> {
    rows.first().and_then(|row| row.values().next())
}
