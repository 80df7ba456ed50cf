// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOAP-over-HTTP binding.
//!
//! | Outcome | Status |
//! |---------|--------|
//! | response message | 200 |
//! | no response (one-way) | 202 |
//! | Sender fault | 400 |
//! | Receiver fault | 500 |

use super::codec::SoapCodec;
use super::{
    fault_message, Attachment, Exchange, MessageGenerator, MessageReceiver, SoapError, Transport,
};
use crate::config::SOAP_MEDIA_TYPE;
use crate::http::{HandlerError, HttpHandler, HttpRequest, HttpResponse};
use crate::message::{Message, MessageBody};
use crate::mime::{ContentType, MimeError, MultipartReader};
use crate::protocol::ProtocolVersion;
use std::io::Read;
use std::sync::Arc;

const DEFAULT_MAX_ENVELOPE: usize = 1024 * 1024;

/// Dispatches POSTed envelopes to a [`MessageReceiver`].
pub struct SoapHttpHandler {
    generator: Arc<dyn MessageGenerator>,
    receiver: Arc<dyn MessageReceiver>,
    max_envelope: usize,
}

impl SoapHttpHandler {
    pub fn new(receiver: Arc<dyn MessageReceiver>) -> Self {
        Self {
            generator: Arc::new(SoapCodec),
            receiver,
            max_envelope: DEFAULT_MAX_ENVELOPE,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn MessageGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Largest accepted envelope or attachment, in bytes.
    pub fn with_max_envelope(mut self, bytes: usize) -> Self {
        self.max_envelope = bytes;
        self
    }

    fn read_limited<R: Read>(&self, source: R) -> Result<Vec<u8>, HandlerError> {
        let mut out = Vec::new();
        let limit = self.max_envelope as u64 + 1;
        source.take(limit).read_to_end(&mut out)?;
        if out.len() > self.max_envelope {
            return Err(HandlerError::new(413, "SOAP message too large"));
        }
        Ok(out)
    }

    /// Envelope from the first (or `start`-designated) part, later parts as
    /// attachments.
    fn read_multipart<R: Read>(
        &self,
        source: R,
        content_type: &ContentType,
    ) -> Result<(Vec<u8>, Vec<Attachment>), HandlerError> {
        let boundary = content_type
            .boundary()
            .ok_or_else(|| HandlerError::new(400, "multipart body without boundary"))?;
        let start = content_type
            .param("start")
            .map(|s| s.trim_matches(['<', '>']).to_string());

        let mut reader = MultipartReader::new(source, boundary).map_err(multipart_error)?;
        let mut parts = Vec::new();
        loop {
            let headers = reader.headers().clone();
            let data = self.read_limited(reader.part().map_err(multipart_error)?)?;
            parts.push(Attachment {
                content_id: headers.content_id().map(str::to_string),
                content_type: headers.content_type().map(str::to_string),
                data,
            });
            if !reader.advance_to_next_part().map_err(multipart_error)? {
                break;
            }
        }

        let root = start
            .and_then(|id| {
                parts
                    .iter()
                    .position(|p| p.content_id.as_deref() == Some(id.as_str()))
            })
            .unwrap_or(0);
        let envelope = parts.remove(root).data;
        Ok((envelope, parts))
    }

    fn envelope_response(&self, message: &Message, version: ProtocolVersion) -> HttpResponse {
        let status = match &message.body {
            MessageBody::Fault(fault) => fault.code.http_status(),
            _ => 200,
        };
        match self.generator.encode(message, version) {
            Ok(bytes) => HttpResponse::new(status)
                .with_content_type(&format!("{}; charset=utf-8", SOAP_MEDIA_TYPE))
                .with_body(bytes),
            Err(e) => {
                log::error!("[soap-http] cannot encode {:?}: {}", message.kind(), e);
                HttpResponse::text(500, "cannot encode response").closing()
            }
        }
    }

    fn fault_response(
        &self,
        request: Option<&Message>,
        error: &SoapError,
        version: ProtocolVersion,
    ) -> HttpResponse {
        let fault = fault_message(request, error.to_fault());
        self.envelope_response(&fault, version)
    }
}

fn multipart_error(e: MimeError) -> HandlerError {
    match e {
        MimeError::Io { message, .. } => HandlerError::internal(message),
        other => HandlerError::new(400, other.to_string()),
    }
}

impl HttpHandler for SoapHttpHandler {
    fn handle(&self, request: &mut HttpRequest<'_>) -> Result<HttpResponse, HandlerError> {
        if request.method() != "POST" {
            return Ok(HttpResponse::text(405, "SOAP endpoints accept POST only")
                .with_header("Allow", "POST"));
        }

        let content_type = request.header.headers.content_type();
        let (envelope, attachments) = match content_type {
            Some(ct) if ct.is_multipart() => self.read_multipart(&mut request.body, &ct)?,
            _ => (self.read_limited(&mut request.body)?, Vec::new()),
        };

        let decoded = match self.generator.decode(&envelope) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("[soap-http] {}: {}", request.path(), e);
                return Ok(self.fault_response(None, &e, ProtocolVersion::Current));
            }
        };
        let version = decoded.version;
        log::debug!(
            "[soap-http] {} {:?} ({}) from {:?}",
            request.path(),
            decoded.message.kind(),
            version,
            request.peer
        );

        let transport = Transport::Http {
            peer: request.peer,
            path: request.path().to_string(),
            user: request.user.clone(),
        };
        let mut exchange = Exchange::new(transport, version).with_attachments(attachments);
        let request_message = decoded.message.clone();

        match self.receiver.receive(decoded.message, &mut exchange) {
            Ok(()) => Ok(match exchange.take_response() {
                Some(response) => self.envelope_response(&response, version),
                None => HttpResponse::new(202),
            }),
            Err(e) => {
                log::warn!("[soap-http] receiver failed on {:?}: {}", request_message.kind(), e);
                Ok(self.fault_response(Some(&request_message), &e, version))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequestHeader, RequestBody, ResponseBody};
    use crate::message::{DeviceMetadata, FaultCode, ThisDevice};
    use std::io::Cursor;

    fn device_receiver() -> Arc<dyn MessageReceiver> {
        Arc::new(
            |message: Message, exchange: &mut Exchange| -> Result<(), SoapError> {
                match message.body {
                    MessageBody::Get => {
                        let meta = DeviceMetadata {
                            this_device: Some(ThisDevice {
                                friendly_name: format!(
                                    "{} attachments",
                                    exchange.attachments().len()
                                ),
                                ..Default::default()
                            }),
                            ..Default::default()
                        };
                        exchange.respond(message.reply(MessageBody::GetResponse(meta)))
                    }
                    MessageBody::Hello(_) => Ok(()),
                    _ => Err(SoapError::Receiver("unsupported".into())),
                }
            },
        )
    }

    fn post(handler: &SoapHttpHandler, content_type: &str, body: &[u8]) -> HttpResponse {
        let mut header = HttpRequestHeader::new("POST", "/device");
        header.headers.insert("Content-Type", content_type);
        let mut source = Cursor::new(body.to_vec());
        let mut request = HttpRequest {
            header,
            peer: None,
            body: RequestBody::fixed(&mut source, body.len() as u64),
            user: None,
        };
        handler.handle(&mut request).unwrap()
    }

    fn body_text(response: &HttpResponse) -> String {
        match &response.body {
            ResponseBody::Fixed(bytes) => String::from_utf8(bytes.clone()).unwrap(),
            _ => String::new(),
        }
    }

    fn encoded(message: &Message, version: ProtocolVersion) -> Vec<u8> {
        SoapCodec.encode(message, version).unwrap()
    }

    #[test]
    fn test_request_response_in_requesters_generation() {
        let handler = SoapHttpHandler::new(device_receiver());
        let get = Message::new(MessageBody::Get);
        let response = post(&handler, SOAP_MEDIA_TYPE, &encoded(&get, ProtocolVersion::Legacy));
        assert_eq!(response.status, 200);
        let text = body_text(&response);
        assert!(text.contains(ProtocolVersion::Legacy.vocabulary().addressing_ns));
        let decoded = SoapCodec.decode(text.as_bytes()).unwrap();
        assert_eq!(decoded.version, ProtocolVersion::Legacy);
        assert_eq!(
            decoded.message.header.relates_to.as_deref(),
            Some(get.header.message_id.as_str())
        );
    }

    #[test]
    fn test_one_way_message_accepted() {
        let handler = SoapHttpHandler::new(device_receiver());
        let hello = Message::new(MessageBody::Hello(crate::message::DiscoveryData::default()));
        let response = post(&handler, SOAP_MEDIA_TYPE, &encoded(&hello, ProtocolVersion::Current));
        assert_eq!(response.status, 202);
    }

    #[test]
    fn test_receiver_error_is_receiver_fault() {
        let handler = SoapHttpHandler::new(device_receiver());
        let renew = Message::new(MessageBody::Renew(Default::default()));
        let response = post(&handler, SOAP_MEDIA_TYPE, &encoded(&renew, ProtocolVersion::Current));
        assert_eq!(response.status, 500);
        let decoded = SoapCodec.decode(body_text(&response).as_bytes()).unwrap();
        match decoded.message.body {
            MessageBody::Fault(fault) => assert_eq!(fault.code, FaultCode::Receiver),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_sender_fault() {
        let handler = SoapHttpHandler::new(device_receiver());
        let response = post(&handler, SOAP_MEDIA_TYPE, b"<nope/>");
        assert_eq!(response.status, 400);
        assert!(body_text(&response).contains("Sender"));
    }

    #[test]
    fn test_multipart_with_attachment() {
        let handler = SoapHttpHandler::new(device_receiver());
        let get = Message::new(MessageBody::Get);
        let envelope = String::from_utf8(encoded(&get, ProtocolVersion::Current)).unwrap();
        let body = format!(
            "--b1\r\nContent-Type: application/soap+xml\r\nContent-ID: <root>\r\n\r\n{}\r\n\
             --b1\r\nContent-Type: image/png\r\nContent-ID: <img>\r\n\r\nPNGDATA\r\n--b1--\r\n",
            envelope
        );
        let response = post(
            &handler,
            "multipart/related; boundary=b1; type=\"application/soap+xml\"; start=\"<root>\"",
            body.as_bytes(),
        );
        assert_eq!(response.status, 200);
        assert!(body_text(&response).contains("1 attachments"));
    }

    #[test]
    fn test_oversized_envelope_rejected() {
        let handler = SoapHttpHandler::new(device_receiver()).with_max_envelope(16);
        let mut header = HttpRequestHeader::new("POST", "/device");
        header.headers.insert("Content-Type", SOAP_MEDIA_TYPE);
        let payload = vec![b'x'; 64];
        let mut source = Cursor::new(payload.clone());
        let mut request = HttpRequest {
            header,
            peer: None,
            body: RequestBody::fixed(&mut source, payload.len() as u64),
            user: None,
        };
        let err = handler.handle(&mut request).err().unwrap();
        assert_eq!(err.status, 413);
    }

    #[test]
    fn test_get_method_not_allowed() {
        let handler = SoapHttpHandler::new(device_receiver());
        let mut request = HttpRequest {
            header: HttpRequestHeader::new("GET", "/device"),
            peer: None,
            body: RequestBody::empty(),
            user: None,
        };
        assert_eq!(handler.handle(&mut request).unwrap().status, 405);
    }
}
