//! Byte-exact encoding of the three message shapes.
//!
//! Fields are packed in declaration order with no padding, all in host byte
//! order:
//!
//! | Message    | Layout                                          |
//! |------------|-------------------------------------------------|
//! | Hello      | `i8 tag=1, i8 version, u32 from, u32 to`        |
//! | JobRequest | `i8 tag=2, u32 job_id, u32 job_type, f64[] data` |
//! | JobResult  | `i8 tag=3, u32 job_id, f64 result`              |

use crate::{Hello, JobRequest, JobResult, MessageType, ProtocolError, Result, PROTOCOL_VERSION};
use bytes::{Buf, BufMut};
use stateline_core::{JobId, JobType};

/// Size of an encoded Hello
pub const HELLO_LEN: usize = 1 + 1 + 4 + 4;

/// Size of the fixed JobRequest header preceding the vector
pub const JOB_REQUEST_HEADER_LEN: usize = 1 + 4 + 4;

/// Size of an encoded JobResult
pub const JOB_RESULT_LEN: usize = 1 + 4 + 8;

const F64_LEN: usize = std::mem::size_of::<f64>();

pub fn encode_hello(job_type_from: JobType, job_type_to: JobType) -> [u8; HELLO_LEN] {
    let mut buf = [0u8; HELLO_LEN];
    let mut dst = &mut buf[..];

    dst.put_i8(MessageType::Hello.as_i8());
    dst.put_i8(PROTOCOL_VERSION);
    dst.put_u32_ne(job_type_from);
    dst.put_u32_ne(job_type_to);

    buf
}

pub fn decode_hello(bytes: &[u8]) -> Result<Hello> {
    check_tag(bytes, MessageType::Hello)?;
    check_exact_len(bytes, HELLO_LEN)?;

    let mut src = &bytes[1..];
    let version = src.get_i8();
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    Ok(Hello {
        version,
        job_type_from: src.get_u32_ne(),
        job_type_to: src.get_u32_ne(),
    })
}

pub fn encode_job_request(job_id: JobId, job_type: JobType, vector: &[f64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(job_request_len(vector.len()));

    buf.put_i8(MessageType::JobRequest.as_i8());
    buf.put_u32_ne(job_id);
    buf.put_u32_ne(job_type);
    for value in vector {
        buf.put_f64_ne(*value);
    }

    buf
}

/// Decode a JobRequest spanning all of `bytes`.
///
/// Every 8 bytes after the header form one vector element. A ragged tail is
/// rejected as [`ProtocolError::Truncated`] rather than dropped.
pub fn decode_job_request(bytes: &[u8]) -> Result<JobRequest> {
    check_tag(bytes, MessageType::JobRequest)?;

    if bytes.len() < JOB_REQUEST_HEADER_LEN {
        return Err(ProtocolError::Truncated {
            needed: JOB_REQUEST_HEADER_LEN,
            available: bytes.len(),
        });
    }

    let body_len = bytes.len() - JOB_REQUEST_HEADER_LEN;
    if body_len % F64_LEN != 0 {
        let elements = body_len / F64_LEN + 1;
        return Err(ProtocolError::Truncated {
            needed: job_request_len(elements),
            available: bytes.len(),
        });
    }

    let mut src = &bytes[1..];
    let job_id = src.get_u32_ne();
    let job_type = src.get_u32_ne();

    let mut vector = Vec::with_capacity(body_len / F64_LEN);
    while src.has_remaining() {
        vector.push(src.get_f64_ne());
    }

    Ok(JobRequest {
        job_id,
        job_type,
        vector,
    })
}

pub fn encode_job_result(job_id: JobId, result: f64) -> [u8; JOB_RESULT_LEN] {
    let mut buf = [0u8; JOB_RESULT_LEN];
    let mut dst = &mut buf[..];

    dst.put_i8(MessageType::JobResult.as_i8());
    dst.put_u32_ne(job_id);
    dst.put_f64_ne(result);

    buf
}

pub fn decode_job_result(bytes: &[u8]) -> Result<JobResult> {
    check_tag(bytes, MessageType::JobResult)?;
    check_exact_len(bytes, JOB_RESULT_LEN)?;

    let mut src = &bytes[1..];
    Ok(JobResult {
        job_id: src.get_u32_ne(),
        result: src.get_f64_ne(),
    })
}

/// Encoded size of a JobRequest carrying `elements` values
pub fn job_request_len(elements: usize) -> usize {
    JOB_REQUEST_HEADER_LEN + elements * F64_LEN
}

fn check_tag(bytes: &[u8], expected: MessageType) -> Result<()> {
    match bytes.first() {
        None => Err(ProtocolError::Truncated {
            needed: 1,
            available: 0,
        }),
        Some(&tag) if tag as i8 == expected.as_i8() => Ok(()),
        Some(&tag) => Err(ProtocolError::UnexpectedTag(tag as i8)),
    }
}

fn check_exact_len(bytes: &[u8], len: usize) -> Result<()> {
    if bytes.len() < len {
        return Err(ProtocolError::Truncated {
            needed: len,
            available: bytes.len(),
        });
    }
    if bytes.len() > len {
        return Err(ProtocolError::TrailingBytes(bytes.len() - len));
    }
    Ok(())
}
