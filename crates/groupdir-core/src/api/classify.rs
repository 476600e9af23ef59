//! Turns a raw `(status, body)` pair from the directory service into one outcome.
//!
//! The service reports failures on two independent channels: the HTTP status
//! and an `AppsForYourDomainErrors` document embedded in the body. Both are
//! reconciled here, so callers only ever see an [`Outcome`].

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::trace;

use super::error::{ClassifiedError, ParseFailure};

/// Marker that introduces the embedded error document
const ERROR_DOCUMENT_MARKER: &str = "<AppsForYourDomainErrors>";

/// "Entity not valid": returned for addresses that have no subscriptions.
/// Not a failure of the requested operation.
pub const ENTITY_NOT_VALID: i64 = 1303;

/// Message used when only the embedded document reports an error
const UNMAPPED_STATUS_MESSAGE: &str = "Directory service reported an error.";

/// Result of classifying one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// 201 Created / 304 Not Modified
    OkNoBody,
    Err(ClassifiedError),
}

enum HttpVerdict {
    Success,
    NoContent,
    Failure(&'static str),
    Unmapped,
}

fn http_verdict(status: u16) -> HttpVerdict {
    match status {
        200 => HttpVerdict::Success,
        201 | 304 => HttpVerdict::NoContent,
        400 => HttpVerdict::Failure("Bad request to directory service."),
        401 => HttpVerdict::Failure("Unauthorized resource requested."),
        403 => HttpVerdict::Failure("Unsupported parameter or failed authorization."),
        404 => HttpVerdict::Failure("Directory resource not found."),
        409 => HttpVerdict::Failure("Resource version number conflict."),
        410 => HttpVerdict::Failure("Requested directory resource is no longer available."),
        500 => HttpVerdict::Failure("Internal directory server error."),
        _ => HttpVerdict::Unmapped,
    }
}

/// Error reported inside the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedError {
    pub code: i64,
    pub reason: Option<String>,
}

/// Classify a directory (or login) response.
///
/// Returns `Err` only when the body carries an error document that cannot be
/// parsed; a service-reported failure is `Ok(Outcome::Err(..))`.
pub fn classify(status: u16, body: &str) -> Result<Outcome, ParseFailure> {
    let verdict = http_verdict(status);
    if let HttpVerdict::Success = verdict {
        return Ok(Outcome::Ok);
    }

    let embedded = find_embedded_error(body)?;

    let outcome = match (verdict, embedded) {
        (_, Some(embedded)) if embedded.code == ENTITY_NOT_VALID => {
            trace!(status, "Embedded error was \"entity not valid\", ignoring");
            Outcome::Ok
        }
        (HttpVerdict::Failure(message), embedded) => Outcome::Err(ClassifiedError {
            http_status: Some(status),
            message: message.to_string(),
            embedded_code: embedded.as_ref().map(|e| e.code),
            embedded_reason: embedded.and_then(|e| e.reason),
        }),
        (_, Some(embedded)) => Outcome::Err(ClassifiedError {
            http_status: None,
            message: UNMAPPED_STATUS_MESSAGE.to_string(),
            embedded_code: Some(embedded.code),
            embedded_reason: embedded.reason,
        }),
        (HttpVerdict::NoContent, None) => Outcome::OkNoBody,
        (_, None) => Outcome::Ok,
    };

    trace!(status, ?outcome, "Classified directory response");
    Ok(outcome)
}

/// Locate and parse the embedded error document, if the body has one.
pub fn find_embedded_error(body: &str) -> Result<Option<EmbeddedError>, ParseFailure> {
    match body.find(ERROR_DOCUMENT_MARKER) {
        Some(start) => parse_error_document(&body[start..]).map(Some),
        None => Ok(None),
    }
}

#[derive(Clone, Copy)]
enum Field {
    Code,
    Reason,
}

fn malformed(err: impl std::fmt::Display) -> ParseFailure {
    ParseFailure::ErrorDocument(err.to_string())
}

/// Read the first `error` element. `errorCode` and `reason` may be attributes
/// of it or child elements.
fn parse_error_document(xml: &str) -> Result<EmbeddedError, ParseFailure> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut code: Option<String> = None;
    let mut reason: Option<String> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"error" => {
                for attr in e.attributes() {
                    let attr = attr.map_err(malformed)?;
                    let value = attr.unescape_value().map_err(malformed)?;
                    match attr.key.local_name().as_ref() {
                        b"errorCode" if code.is_none() => code = Some(value.into_owned()),
                        b"reason" if reason.is_none() => reason = Some(value.into_owned()),
                        _ => {}
                    }
                }
            }
            Event::Start(e) => {
                field = match e.local_name().as_ref() {
                    b"errorCode" => Some(Field::Code),
                    b"reason" => Some(Field::Reason),
                    _ => None,
                };
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(malformed)?;
                match field {
                    Some(Field::Code) if code.is_none() => code = Some(value.into_owned()),
                    Some(Field::Reason) if reason.is_none() => reason = Some(value.into_owned()),
                    _ => {}
                }
            }
            Event::End(e) => {
                field = None;
                if e.local_name().as_ref() == b"AppsForYourDomainErrors" {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let code = code.ok_or_else(|| malformed("missing errorCode"))?;
    let code = code
        .trim()
        .parse::<i64>()
        .map_err(|e| malformed(format!("errorCode {:?}: {}", code, e)))?;

    Ok(EmbeddedError { code, reason })
}
