//! `x-payment-required` offer header parsing for the x402 gateway proxy.
//!
//! Retargeted from the L402 `WWW-Authenticate` challenge parser this crate
//! used to carry: same shape (parse a header value into a typed struct,
//! tolerating unknown keys), different wire format (`k=v` pairs separated by
//! `;` rather than a scheme name plus comma-separated quoted params).

use std::fmt;

use settld_protocol::token::RequestBindingMode;

/// Parsed `x-payment-required` offer.
///
/// Fields absent from the header are `None`; `amount_cents` is the only
/// field a caller must supply to proceed with `create()` — everything else
/// narrows or annotates the gate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct X402Offer {
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub provider_id: Option<String>,
    pub tool_id: Option<String>,
    pub quote_id: Option<String>,
    pub quote_required: bool,
    pub request_binding_mode: Option<RequestBindingMode>,
    pub spend_authorization_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferParseError {
    Empty,
    AmountMissing,
    AmountInvalid,
}

impl fmt::Display for OfferParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "x-payment-required header is empty or absent"),
            Self::AmountMissing => write!(f, "x-payment-required header carries no amount key"),
            Self::AmountInvalid => write!(f, "x-payment-required amount key is not a valid integer"),
        }
    }
}

impl std::error::Error for OfferParseError {}

/// Parser for `x-payment-required` header values.
#[derive(Debug, Default, Clone, Copy)]
pub struct X402OfferParser;

impl X402OfferParser {
    /// Parses an offer header into its typed components.
    ///
    /// Returns `Err(OfferParseError::AmountMissing/AmountInvalid)` when no
    /// recognized amount key is present or its value doesn't parse as an
    /// integer — the gateway cannot create a gate without an amount. Every
    /// other key is optional; unrecognized keys are tolerated and ignored.
    pub fn parse(&self, header: Option<&str>) -> Result<X402Offer, OfferParseError> {
        let raw = header.unwrap_or("").trim();
        if raw.is_empty() {
            return Err(OfferParseError::Empty);
        }

        let mut offer = X402Offer::default();
        let mut amount_raw: Option<&str> = None;

        for part in raw.split(';') {
            let segment = part.trim();
            if segment.is_empty() {
                continue;
            }

            let Some((key_raw, value_raw)) = segment.split_once('=') else {
                continue;
            };
            let key = key_raw.trim();
            let value = unquote(value_raw.trim());
            if value.is_empty() {
                continue;
            }

            match key {
                "amountCents" | "amount_cents" | "priceCents" | "price" => {
                    amount_raw = Some(value);
                }
                "currency" => offer.currency = Some(value.to_string()),
                "providerId" => offer.provider_id = Some(value.to_string()),
                "toolId" => offer.tool_id = Some(value.to_string()),
                "quoteId" => offer.quote_id = Some(value.to_string()),
                "quoteRequired" => offer.quote_required = parse_bool(value),
                "requestBindingMode" => offer.request_binding_mode = parse_binding_mode(value),
                "spendAuthorizationMode" => offer.spend_authorization_mode = Some(value.to_string()),
                _ => {}
            }
        }

        let amount_raw = amount_raw.ok_or(OfferParseError::AmountMissing)?;
        let amount_cents = amount_raw
            .parse::<i64>()
            .map_err(|_| OfferParseError::AmountInvalid)?;
        offer.amount_cents = Some(amount_cents);

        Ok(offer)
    }
}

fn unquote(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_binding_mode(value: &str) -> Option<RequestBindingMode> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Some(RequestBindingMode::None),
        "strict" => Some(RequestBindingMode::Strict),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_offer_header() {
        let parser = X402OfferParser;
        let offer = parser
            .parse(Some(
                "amountCents=1250;currency=USD;providerId=prov-1;toolId=tool-9;quoteId=q-1;quoteRequired=true;requestBindingMode=strict;spendAuthorizationMode=auto",
            ))
            .expect("parse");

        assert_eq!(offer.amount_cents, Some(1250));
        assert_eq!(offer.currency.as_deref(), Some("USD"));
        assert_eq!(offer.provider_id.as_deref(), Some("prov-1"));
        assert_eq!(offer.tool_id.as_deref(), Some("tool-9"));
        assert_eq!(offer.quote_id.as_deref(), Some("q-1"));
        assert!(offer.quote_required);
        assert_eq!(offer.request_binding_mode, Some(RequestBindingMode::Strict));
        assert_eq!(offer.spend_authorization_mode.as_deref(), Some("auto"));
    }

    #[test]
    fn accepts_snake_case_and_legacy_amount_keys() {
        let parser = X402OfferParser;
        assert_eq!(
            parser.parse(Some("amount_cents=500")).expect("parse").amount_cents,
            Some(500)
        );
        assert_eq!(
            parser.parse(Some("priceCents=500")).expect("parse").amount_cents,
            Some(500)
        );
        assert_eq!(
            parser.parse(Some("price=500")).expect("parse").amount_cents,
            Some(500)
        );
    }

    #[test]
    fn tolerates_unknown_keys() {
        let parser = X402OfferParser;
        let offer = parser
            .parse(Some("amountCents=100;futureKey=whatever;anotherUnknown=1"))
            .expect("parse");
        assert_eq!(offer.amount_cents, Some(100));
    }

    #[test]
    fn rejects_empty_or_missing_header() {
        let parser = X402OfferParser;
        assert_eq!(parser.parse(None), Err(OfferParseError::Empty));
        assert_eq!(parser.parse(Some("")), Err(OfferParseError::Empty));
        assert_eq!(parser.parse(Some("   ")), Err(OfferParseError::Empty));
    }

    #[test]
    fn rejects_missing_or_invalid_amount() {
        let parser = X402OfferParser;
        assert_eq!(
            parser.parse(Some("currency=USD")),
            Err(OfferParseError::AmountMissing)
        );
        assert_eq!(
            parser.parse(Some("amountCents=not-a-number")),
            Err(OfferParseError::AmountInvalid)
        );
    }

    #[test]
    fn unquotes_quoted_values() {
        let parser = X402OfferParser;
        let offer = parser
            .parse(Some("amountCents=\"750\";currency=\"EUR\""))
            .expect("parse");
        assert_eq!(offer.amount_cents, Some(750));
        assert_eq!(offer.currency.as_deref(), Some("EUR"));
    }
}
