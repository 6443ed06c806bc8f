//! Just enough LDAPv3 to prove a directory bind works.
//!
//! The bind probe performs an anonymous simple bind, reads
//! `defaultNamingContext` from the rootDSE with a base-scope search, and
//! unbinds. Messages are hand-encoded BER; only the handful of tags this
//! exchange uses are understood.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Attribute read to force the bind to complete.
pub const DEFAULT_NAMING_CONTEXT: &str = "defaultNamingContext";

const TAG_BOOLEAN: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_ENUMERATED: u8 = 0x0a;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;

const OP_BIND_REQUEST: u8 = 0x60;
const OP_BIND_RESPONSE: u8 = 0x61;
const OP_UNBIND_REQUEST: u8 = 0x42;
const OP_SEARCH_REQUEST: u8 = 0x63;
const OP_SEARCH_ENTRY: u8 = 0x64;
const OP_SEARCH_DONE: u8 = 0x65;
const OP_SEARCH_REFERENCE: u8 = 0x73;

const AUTH_SIMPLE: u8 = 0x80;
const FILTER_PRESENT: u8 = 0x87;

const MAX_FRAME: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum LdapError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated message")]
    Truncated,

    #[error("malformed message: {0}")]
    Malformed(&'static str),

    #[error("message of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("unexpected protocol op 0x{0:02x}")]
    UnexpectedOp(u8),

    #[error("server returned result code {code}: {message}")]
    Result { code: u32, message: String },
}

// ── Encoding ───────────────────────────────────────────────────────

fn push_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    push_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn integer(tag: u8, value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(3);
    let mut content = bytes[skip..].to_vec();
    // Keep the value non-negative in two's complement.
    if content[0] & 0x80 != 0 {
        content.insert(0, 0);
    }
    tlv(tag, &content)
}

fn message(message_id: u32, op: Vec<u8>) -> Vec<u8> {
    tlv(TAG_SEQUENCE, &[integer(TAG_INTEGER, message_id), op].concat())
}

/// Anonymous LDAPv3 simple bind.
pub fn bind_request(message_id: u32) -> Vec<u8> {
    let op = tlv(
        OP_BIND_REQUEST,
        &[
            integer(TAG_INTEGER, 3),
            tlv(TAG_OCTET_STRING, b""),
            tlv(AUTH_SIMPLE, b""),
        ]
        .concat(),
    );
    message(message_id, op)
}

/// Base-scope search of the rootDSE for a single attribute.
pub fn root_dse_search_request(message_id: u32, attribute: &str) -> Vec<u8> {
    let op = tlv(
        OP_SEARCH_REQUEST,
        &[
            tlv(TAG_OCTET_STRING, b""),
            integer(TAG_ENUMERATED, 0),
            integer(TAG_ENUMERATED, 0),
            integer(TAG_INTEGER, 0),
            integer(TAG_INTEGER, 0),
            tlv(TAG_BOOLEAN, &[0x00]),
            tlv(FILTER_PRESENT, b"objectClass"),
            tlv(TAG_SEQUENCE, &tlv(TAG_OCTET_STRING, attribute.as_bytes())),
        ]
        .concat(),
    );
    message(message_id, op)
}

pub fn unbind_request(message_id: u32) -> Vec<u8> {
    message(message_id, vec![OP_UNBIND_REQUEST, 0x00])
}

// ── Decoding ───────────────────────────────────────────────────────

/// One decoded tag-length-value element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub content: &'a [u8],
}

/// Split the first element off `buf`, returning it and the remainder.
pub fn read_tlv(buf: &[u8]) -> Result<(Tlv<'_>, &[u8]), LdapError> {
    let (&tag, rest) = buf.split_first().ok_or(LdapError::Truncated)?;
    let (&first, rest) = rest.split_first().ok_or(LdapError::Truncated)?;
    let (len, rest) = if first < 0x80 {
        (first as usize, rest)
    } else {
        let n = (first & 0x7f) as usize;
        if n == 0 || n > 4 {
            return Err(LdapError::Malformed("unsupported length form"));
        }
        if rest.len() < n {
            return Err(LdapError::Truncated);
        }
        let len = rest[..n].iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, &rest[n..])
    };
    if rest.len() < len {
        return Err(LdapError::Truncated);
    }
    Ok((
        Tlv {
            tag,
            content: &rest[..len],
        },
        &rest[len..],
    ))
}

fn read_uint(el: Tlv<'_>) -> Result<u32, LdapError> {
    if el.content.is_empty() || el.content.len() > 5 {
        return Err(LdapError::Malformed("integer width"));
    }
    Ok(el
        .content
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | *b as u64) as u32)
}

/// A server message, reduced to what the probe needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub message_id: u32,
    pub op: u8,
    /// Present for operations that carry an LDAPResult.
    pub result: Option<(u32, String)>,
    /// First value of the first attribute of a search entry.
    pub first_value: Option<String>,
}

/// Decode one complete LDAPMessage.
pub fn parse_message(frame: &[u8]) -> Result<Response, LdapError> {
    let (envelope, _) = read_tlv(frame)?;
    if envelope.tag != TAG_SEQUENCE {
        return Err(LdapError::Malformed("message is not a sequence"));
    }
    let (id, rest) = read_tlv(envelope.content)?;
    if id.tag != TAG_INTEGER {
        return Err(LdapError::Malformed("missing message id"));
    }
    let message_id = read_uint(id)?;
    let (op, _) = read_tlv(rest)?;

    let mut response = Response {
        message_id,
        op: op.tag,
        result: None,
        first_value: None,
    };

    match op.tag {
        OP_BIND_RESPONSE | OP_SEARCH_DONE => {
            let (code, rest) = read_tlv(op.content)?;
            if code.tag != TAG_ENUMERATED {
                return Err(LdapError::Malformed("missing result code"));
            }
            let (_matched_dn, rest) = read_tlv(rest)?;
            let (diagnostic, _) = read_tlv(rest)?;
            response.result = Some((
                read_uint(code)?,
                String::from_utf8_lossy(diagnostic.content).into_owned(),
            ));
        }
        OP_SEARCH_ENTRY => {
            response.first_value = first_attribute_value(op.content)?;
        }
        _ => {}
    }
    Ok(response)
}

fn first_attribute_value(entry: &[u8]) -> Result<Option<String>, LdapError> {
    let (_object_name, rest) = read_tlv(entry)?;
    let (attributes, _) = read_tlv(rest)?;
    if attributes.content.is_empty() {
        return Ok(None);
    }
    let (attribute, _) = read_tlv(attributes.content)?;
    let (_kind, rest) = read_tlv(attribute.content)?;
    let (values, _) = read_tlv(rest)?;
    if values.tag != TAG_SET || values.content.is_empty() {
        return Ok(None);
    }
    let (value, _) = read_tlv(values.content)?;
    Ok(Some(String::from_utf8_lossy(value.content).into_owned()))
}

/// Read one complete LDAPMessage from the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, LdapError> {
    let mut head = [0u8; 2];
    reader.read_exact(&mut head).await?;
    let mut frame = head.to_vec();

    let len = if head[1] < 0x80 {
        head[1] as usize
    } else {
        let n = (head[1] & 0x7f) as usize;
        if n == 0 || n > 4 {
            return Err(LdapError::Malformed("unsupported length form"));
        }
        let mut len_bytes = vec![0u8; n];
        reader.read_exact(&mut len_bytes).await?;
        frame.extend_from_slice(&len_bytes);
        len_bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize)
    };
    if len > MAX_FRAME {
        return Err(LdapError::FrameTooLarge(len));
    }

    let start = frame.len();
    frame.resize(start + len, 0);
    reader.read_exact(&mut frame[start..]).await?;
    Ok(frame)
}

fn check_result(response: &Response) -> Result<(), LdapError> {
    match &response.result {
        Some((0, _)) => Ok(()),
        Some((code, message)) => Err(LdapError::Result {
            code: *code,
            message: message.clone(),
        }),
        None => Err(LdapError::Malformed("missing result")),
    }
}

/// Bind, read the rootDSE naming context, and unbind.
///
/// Returns the naming context if the server sent one. The bind counts as
/// confirmed once the search completes successfully.
pub async fn root_dse_session<S>(stream: &mut S) -> Result<Option<String>, LdapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&bind_request(1)).await?;
    let bound = parse_message(&read_frame(stream).await?)?;
    if bound.op != OP_BIND_RESPONSE {
        return Err(LdapError::UnexpectedOp(bound.op));
    }
    check_result(&bound)?;

    stream
        .write_all(&root_dse_search_request(2, DEFAULT_NAMING_CONTEXT))
        .await?;
    let mut naming_context = None;
    loop {
        let response = parse_message(&read_frame(stream).await?)?;
        match response.op {
            OP_SEARCH_ENTRY => {
                if naming_context.is_none() {
                    naming_context = response.first_value;
                }
            }
            OP_SEARCH_REFERENCE => {}
            OP_SEARCH_DONE => {
                check_result(&response)?;
                break;
            }
            other => return Err(LdapError::UnexpectedOp(other)),
        }
    }

    // The server closes without answering an unbind.
    let _ = stream.write_all(&unbind_request(3)).await;
    Ok(naming_context)
}
