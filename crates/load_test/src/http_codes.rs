// Rust guideline compliant 2026-10-18

//! HTTP status code table.
//!
//! Each known code has a short description and a flag telling fixture
//! creation whether a GET returning it implies the object exists.

/// Description and "object exists" flag for a known code.
fn lookup(code: i32) -> Option<(&'static str, bool)> {
    let entry = match code {
        200 => ("OK", true),
        201 => ("created", false),
        202 => ("accepted", false),
        203 => ("non-authoritative information", true),
        204 => ("no content", false),
        205 => ("reset content", false),
        206 => ("partial content", true),

        304 => ("not modified", true),
        305 => ("use proxy", false),
        306 => ("switch proxy", false),

        400 => ("bad request", false),
        401 => ("unauthorized", false),
        402 => ("payment required", false),
        403 => ("forbidden", false),
        404 => ("not found", false),
        405 => ("method not allowed", false),
        406 => ("not acceptable", false),
        407 => ("proxy authentication required", false),
        408 => ("timed out", true),
        409 => ("conflict", false),
        410 => ("gone", false),
        411 => ("length required", false),
        412 => ("precondition failed", false),
        413 => ("payload too large", false),
        414 => ("uri too long", false),
        415 => ("unsupported media type", false),
        416 => ("range not satisfiable", false),
        417 => ("expectation failed", false),
        418 => ("I'm a teapot", false),
        420 => ("enhance your calm", false),
        421 => ("misdirected request", false),
        422 => ("unprocessable entity", false),
        423 => ("locked", false),
        424 => ("failed dependency", false),
        426 => ("upgrade required", false),
        428 => ("precondition required", false),
        429 => ("too many requests", false),
        431 => ("request header fields too large", false),
        440 => ("login time-out", false),
        444 => ("no response", false),
        449 => ("retry with", false),
        450 => ("blocked by parental controls", false),
        451 => ("unavailable for legal reasons", false),
        495 => ("ssl certificate error", false),
        496 => ("ssl certificate required", false),
        497 => ("http request sent to https port", false),
        498 => ("invalid token", false),
        499 => ("client closed request", true),

        500 => ("internal server error", true),
        501 => ("not implemented", false),
        502 => ("bad gateway", false),
        503 => ("service unavailable", false),
        504 => ("gateway time-out", false),
        505 => ("http version not supported", false),
        506 => ("variant also negotiates", false),
        507 => ("insufficient storage", false),
        508 => ("loop detected", false),
        509 => ("bandwidth limit exceeded", false),
        510 => ("not extended", false),
        511 => ("network authentication required", false),
        520 => ("unknown error", false),
        521 => ("web server is down", false),
        522 => ("connection timed out", false),
        523 => ("origin is unreachable", false),
        524 => ("a timeout occurred", false),
        525 => ("ssl handshake failed", false),
        526 => ("invalid ssl certificate", false),
        527 => ("railgun error", false),
        530 => ("site is frozen", false),
        598 => ("network read timeout error", false),
        599 => ("network connect timeout error", false),
        _ => return None,
    };
    Some(entry)
}

/// `"<code> <description>"`, or `"<code> not defined"` for unknown codes.
#[must_use]
pub fn describe(code: i32) -> String {
    match lookup(code) {
        Some((text, _)) => format!("{code} {text}"),
        None => format!("{code} not defined"),
    }
}

/// `true` when a GET that returned `code` means the object was present.
#[must_use]
pub fn should_exist(code: i32) -> bool {
    lookup(code).is_some_and(|(_, exists)| exists)
}

/// GET codes worth a diagnostic dump: anything but 200, 202 and 404.
#[must_use]
pub fn is_bad_get(code: i32) -> bool {
    !matches!(code, 200 | 202 | 404)
}

/// PUT/POST codes worth a diagnostic dump: anything outside the 2xx
/// success set {200, 201, 202, 204, 205}.
#[must_use]
pub fn is_bad_put(code: i32) -> bool {
    !matches!(code, 200 | 201 | 202 | 204 | 205)
}
