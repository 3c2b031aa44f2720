use crate::wire::{self, HELLO_LEN, JOB_REQUEST_HEADER_LEN, JOB_RESULT_LEN};
use crate::{JobRequest, MessageType, ProtocolError, Result, WorkerMessage, MAX_MESSAGE_SIZE};
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_util::codec::{Decoder, Encoder};

const LENGTH_PREFIX_LEN: usize = 4;

/// How message boundaries are found on the stream
///
/// Hello and JobResult have a fixed size, but a JobRequest carries no length:
/// in `Raw` mode its vector runs to the end of whatever bytes are buffered
/// once they hold a whole number of elements. `LengthPrefixed` precedes every
/// message with a native-endian `u32` byte count so requests survive split or
/// coalesced reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    #[default]
    Raw,
    LengthPrefixed,
}

impl Framing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framing::Raw => "raw",
            Framing::LengthPrefixed => "length-prefixed",
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Framing::Raw),
            "length-prefixed" => Ok(Framing::LengthPrefixed),
            other => Err(format!("unknown framing '{}' (expected raw or length-prefixed)", other)),
        }
    }
}

/// Worker side of the protocol: decodes job requests, encodes hello and results
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerCodec {
    framing: Framing,
}

impl WorkerCodec {
    pub fn new(framing: Framing) -> Self {
        WorkerCodec { framing }
    }
}

impl Decoder for WorkerCodec {
    type Item = JobRequest;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let frame = match self.framing {
            Framing::Raw => {
                // Reject garbage as soon as the tag is visible
                let Some(&tag) = src.first() else {
                    return Ok(None);
                };
                if tag as i8 != MessageType::JobRequest.as_i8() {
                    return Err(ProtocolError::UnexpectedTag(tag as i8));
                }

                if src.len() < JOB_REQUEST_HEADER_LEN {
                    return Ok(None);
                }
                if src.len() > MAX_MESSAGE_SIZE {
                    return Err(ProtocolError::MessageTooLarge(src.len()));
                }

                // A read can stop mid-element; wait until the vector is whole
                let needed = raw_request_len(src.len());
                if needed > src.len() {
                    src.reserve(needed - src.len());
                    return Ok(None);
                }

                // Everything buffered belongs to this request
                src.split()
            }
            Framing::LengthPrefixed => match split_frame(src)? {
                Some(frame) => frame,
                None => return Ok(None),
            },
        };

        tracing::trace!(frame_len = frame.len(), "Decoding job request");
        wire::decode_job_request(&frame).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(req) => Ok(Some(req)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::Truncated {
                needed: pending_len(self.framing, src, raw_request_len(src.len())),
                available: src.len(),
            }),
        }
    }
}

impl Encoder<WorkerMessage> for WorkerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: WorkerMessage, dst: &mut BytesMut) -> Result<()> {
        match item {
            WorkerMessage::Hello(hello) => {
                let mut bytes = wire::encode_hello(hello.job_type_from, hello.job_type_to);
                bytes[1] = hello.version as u8;
                put_frame(self.framing, &bytes, dst)
            }
            WorkerMessage::JobResult(result) => {
                let bytes = wire::encode_job_result(result.job_id, result.result);
                put_frame(self.framing, &bytes, dst)
            }
        }
    }
}

/// Controller side of the protocol: decodes hello and results, encodes job requests
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerCodec {
    framing: Framing,
}

impl ControllerCodec {
    pub fn new(framing: Framing) -> Self {
        ControllerCodec { framing }
    }
}

impl Decoder for ControllerCodec {
    type Item = WorkerMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let frame = match self.framing {
            Framing::Raw => {
                let Some(&tag) = src.first() else {
                    return Ok(None);
                };
                let len = fixed_len(tag as i8)?;
                if src.len() < len {
                    return Ok(None);
                }
                src.split_to(len)
            }
            Framing::LengthPrefixed => match split_frame(src)? {
                Some(frame) => frame,
                None => return Ok(None),
            },
        };

        decode_worker_message(&frame).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(msg) => Ok(Some(msg)),
            None if src.is_empty() => Ok(None),
            None => {
                let fixed = fixed_len(src[0] as i8).unwrap_or(1);
                Err(ProtocolError::Truncated {
                    needed: pending_len(self.framing, src, fixed),
                    available: src.len(),
                })
            }
        }
    }
}

impl Encoder<JobRequest> for ControllerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: JobRequest, dst: &mut BytesMut) -> Result<()> {
        let bytes = wire::encode_job_request(item.job_id, item.job_type, &item.vector);
        put_frame(self.framing, &bytes, dst)
    }
}

/// Raw JobRequest length covering `buffered` bytes with whole vector elements
fn raw_request_len(buffered: usize) -> usize {
    match buffered.checked_sub(JOB_REQUEST_HEADER_LEN) {
        Some(body) => JOB_REQUEST_HEADER_LEN + body.div_ceil(8) * 8,
        None => JOB_REQUEST_HEADER_LEN,
    }
}

fn decode_worker_message(frame: &[u8]) -> Result<WorkerMessage> {
    let tag = frame.first().copied().unwrap_or_default() as i8;
    match MessageType::from_i8(tag) {
        Some(MessageType::Hello) => wire::decode_hello(frame).map(WorkerMessage::Hello),
        Some(MessageType::JobResult) => wire::decode_job_result(frame).map(WorkerMessage::JobResult),
        _ if frame.is_empty() => Err(ProtocolError::Truncated {
            needed: 1,
            available: 0,
        }),
        _ => Err(ProtocolError::UnexpectedTag(tag)),
    }
}

fn fixed_len(tag: i8) -> Result<usize> {
    match MessageType::from_i8(tag) {
        Some(MessageType::Hello) => Ok(HELLO_LEN),
        Some(MessageType::JobResult) => Ok(JOB_RESULT_LEN),
        _ => Err(ProtocolError::UnexpectedTag(tag)),
    }
}

/// Split one length-prefixed frame off `src`, or `None` until it is complete
fn split_frame(src: &mut BytesMut) -> Result<Option<BytesMut>> {
    let Some(length) = peek_length(src) else {
        return Ok(None);
    };

    if length > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(length));
    }

    if src.len() < LENGTH_PREFIX_LEN + length {
        src.reserve(LENGTH_PREFIX_LEN + length - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_LEN);
    Ok(Some(src.split_to(length)))
}

fn peek_length(src: &[u8]) -> Option<usize> {
    let prefix: [u8; LENGTH_PREFIX_LEN] = src.get(..LENGTH_PREFIX_LEN)?.try_into().ok()?;
    Some(u32::from_ne_bytes(prefix) as usize)
}

/// Bytes the incomplete message at the head of `src` would need
fn pending_len(framing: Framing, src: &[u8], raw_len: usize) -> usize {
    match framing {
        Framing::Raw => raw_len,
        Framing::LengthPrefixed => match peek_length(src) {
            Some(length) => LENGTH_PREFIX_LEN + length,
            None => LENGTH_PREFIX_LEN,
        },
    }
}

fn put_frame(framing: Framing, bytes: &[u8], dst: &mut BytesMut) -> Result<()> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(bytes.len()));
    }

    match framing {
        Framing::Raw => {
            dst.reserve(bytes.len());
        }
        Framing::LengthPrefixed => {
            dst.reserve(LENGTH_PREFIX_LEN + bytes.len());
            dst.put_u32_ne(bytes.len() as u32);
        }
    }
    dst.put_slice(bytes);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Hello, JobResult};
    use stateline_core::JobTypeRange;

    fn request(job_id: u32, vector: Vec<f64>) -> JobRequest {
        JobRequest {
            job_id,
            job_type: 1,
            vector,
        }
    }

    #[test]
    fn test_codec_roundtrip() {
        for framing in [Framing::Raw, Framing::LengthPrefixed] {
            let mut controller = ControllerCodec::new(framing);
            let mut worker = WorkerCodec::new(framing);
            let mut buffer = BytesMut::new();

            controller
                .encode(request(1, vec![1.0, 2.0, 3.0]), &mut buffer)
                .unwrap();
            let decoded = worker.decode(&mut buffer).unwrap().unwrap();
            assert_eq!(decoded, request(1, vec![1.0, 2.0, 3.0]));
            assert!(buffer.is_empty());

            let hello = Hello::new(JobTypeRange::default());
            worker.encode(WorkerMessage::Hello(hello), &mut buffer).unwrap();
            match controller.decode(&mut buffer).unwrap() {
                Some(WorkerMessage::Hello(decoded)) => assert_eq!(decoded, hello),
                other => panic!("Expected hello, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_raw_hello_is_ten_bytes() {
        let mut codec = WorkerCodec::default();
        let mut buffer = BytesMut::new();

        codec
            .encode(WorkerMessage::Hello(Hello::new(JobTypeRange::default())), &mut buffer)
            .unwrap();
        assert_eq!(&buffer[..], &[1u8, 0, 0, 0, 0, 0, 0, 0, 0, 0][..]);
    }

    #[test]
    fn test_partial_message() {
        let mut codec = WorkerCodec::new(Framing::LengthPrefixed);
        let mut buffer = BytesMut::new();
        ControllerCodec::new(Framing::LengthPrefixed)
            .encode(request(3, vec![0.25; 4]), &mut buffer)
            .unwrap();

        let full_len = buffer.len();
        let partial = buffer.split_to(full_len / 2);
        let mut partial_buffer = BytesMut::from(&partial[..]);

        assert!(codec.decode(&mut partial_buffer).unwrap().is_none());

        partial_buffer.extend_from_slice(&buffer);
        let decoded = codec.decode(&mut partial_buffer).unwrap().unwrap();
        assert_eq!(decoded.vector, vec![0.25; 4]);
    }

    #[test]
    fn test_raw_waits_for_header() {
        let mut codec = WorkerCodec::default();
        let bytes = wire::encode_job_request(1, 1, &[]);
        let mut buffer = BytesMut::from(&bytes[..6]);

        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_raw_rejects_bad_tag_immediately() {
        let mut codec = WorkerCodec::default();
        let mut buffer = BytesMut::from(&[9u8][..]);

        assert!(matches!(
            codec.decode(&mut buffer),
            Err(ProtocolError::UnexpectedTag(9))
        ));
    }

    #[test]
    fn test_raw_ragged_vector_waits() {
        let mut codec = WorkerCodec::default();
        let bytes = wire::encode_job_request(1, 1, &[1.0, 2.0]);
        let mut buffer = BytesMut::from(&bytes[..bytes.len() - 1]);

        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert_eq!(buffer.len(), bytes.len() - 1);

        match codec.decode_eof(&mut buffer) {
            Err(ProtocolError::Truncated { needed, available }) => {
                assert_eq!(needed, bytes.len());
                assert_eq!(available, bytes.len() - 1);
            }
            other => panic!("Expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_request_split_across_reads() {
        let mut codec = WorkerCodec::default();
        let vector = vec![1.0; 2000];
        let bytes = wire::encode_job_request(4, 1, &vector);

        // Framed fills its read buffer 8 KiB at a time
        let mut buffer = BytesMut::from(&bytes[..8192]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&bytes[8192..]);
        let decoded = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(decoded, request(4, vector));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_eof_with_leftover_bytes() {
        let mut codec = WorkerCodec::default();
        let mut buffer = BytesMut::from(&[2u8, 1, 0][..]);

        match codec.decode_eof(&mut buffer) {
            Err(ProtocolError::Truncated { needed, available }) => {
                assert_eq!(needed, JOB_REQUEST_HEADER_LEN);
                assert_eq!(available, 3);
            }
            other => panic!("Expected Truncated, got {:?}", other),
        }

        let mut empty = BytesMut::new();
        assert!(codec.decode_eof(&mut empty).unwrap().is_none());
    }

    #[test]
    fn test_length_prefix_too_large() {
        let mut codec = WorkerCodec::new(Framing::LengthPrefixed);
        let mut buffer = BytesMut::new();
        buffer.put_u32_ne(u32::MAX);

        assert!(matches!(
            codec.decode(&mut buffer),
            Err(ProtocolError::MessageTooLarge(_))
        ));
    }

    #[test]
    fn test_controller_decodes_back_to_back_messages() {
        let mut worker = WorkerCodec::default();
        let mut controller = ControllerCodec::default();
        let mut buffer = BytesMut::new();

        worker
            .encode(WorkerMessage::Hello(Hello::new(JobTypeRange::default())), &mut buffer)
            .unwrap();
        worker
            .encode(
                WorkerMessage::JobResult(JobResult {
                    job_id: 1,
                    result: 6.0,
                }),
                &mut buffer,
            )
            .unwrap();

        assert!(matches!(
            controller.decode(&mut buffer).unwrap(),
            Some(WorkerMessage::Hello(_))
        ));
        match controller.decode(&mut buffer).unwrap() {
            Some(WorkerMessage::JobResult(result)) => {
                assert_eq!(result.job_id, 1);
                assert_eq!(result.result, 6.0);
            }
            other => panic!("Expected job result, got {:?}", other),
        }
        assert!(controller.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_framing_parse() {
        assert_eq!("raw".parse::<Framing>().unwrap(), Framing::Raw);
        assert_eq!(
            "length-prefixed".parse::<Framing>().unwrap(),
            Framing::LengthPrefixed
        );
        assert!("zmq".parse::<Framing>().is_err());
        assert_eq!(Framing::LengthPrefixed.to_string(), "length-prefixed");
    }
}
