//! Payment request URIs: `hoosat:<address>?amount=<HTN>&label=<text>&message=<text>`.
//!
//! The scheme is the address's network prefix, so the part before `?` is
//! exactly the address string.

use serde::{Deserialize, Serialize};

use crate::units::{htn_to_sompi, sompi_to_htn};
use crate::wallet::{Address, Network};
use crate::{HoosatError, Result};

/// The fields a URI can carry. `amount` is in sompi; `None` means
/// unspecified, not zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParams {
    pub address: Address,
    pub amount: Option<u64>,
    pub label: Option<String>,
    pub message: Option<String>,
}

impl PaymentParams {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            amount: None,
            label: None,
            message: None,
        }
    }

    pub fn with_amount(mut self, sompi: u64) -> Self {
        self.amount = Some(sompi);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A parsed URI together with the text it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub address: Address,
    pub amount: Option<u64>,
    pub label: Option<String>,
    pub message: Option<String>,
    pub raw_uri: String,
}

impl PaymentRequest {
    pub fn params(&self) -> PaymentParams {
        PaymentParams {
            address: self.address.clone(),
            amount: self.amount,
            label: self.label.clone(),
            message: self.message.clone(),
        }
    }

    /// The amount as an HTN decimal string, if one was given.
    pub fn amount_htn(&self) -> Option<String> {
        self.amount.map(sompi_to_htn)
    }
}

pub fn build_payment_uri(params: &PaymentParams) -> String {
    let mut query: Vec<String> = Vec::new();
    if let Some(amount) = params.amount {
        query.push(format!("amount={}", sompi_to_htn(amount)));
    }
    if let Some(label) = &params.label {
        query.push(format!("label={}", percent_encode(label)));
    }
    if let Some(message) = &params.message {
        query.push(format!("message={}", percent_encode(message)));
    }

    let mut uri = params.address.to_string();
    if !query.is_empty() {
        uri.push('?');
        uri.push_str(&query.join("&"));
    }
    uri
}

pub fn parse_payment_uri(uri: &str) -> Result<PaymentRequest> {
    let (scheme, _) = uri
        .split_once(':')
        .ok_or_else(|| HoosatError::MalformedUri(format!("missing scheme in '{}'", uri)))?;
    Network::from_prefix(scheme)?;

    let (address_part, query) = match uri.split_once('?') {
        Some((address, query)) => (address, Some(query)),
        None => (uri, None),
    };
    let address = Address::decode(address_part)
        .map_err(|_| HoosatError::InvalidAddress(address_part.to_string()))?;

    let mut amount = None;
    let mut label = None;
    let mut message = None;

    for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(key)?;
        match key.as_str() {
            "amount" if amount.is_none() => amount = Some(htn_to_sompi(&percent_decode(value)?)?),
            "label" if label.is_none() => label = Some(percent_decode(value)?),
            "message" if message.is_none() => message = Some(percent_decode(value)?),
            _ => {}
        }
    }

    Ok(PaymentRequest {
        address,
        amount,
        label,
        message,
        raw_uri: uri.to_string(),
    })
}

/// `true` when [`parse_payment_uri`] would succeed.
pub fn is_valid_payment_uri(uri: &str) -> bool {
    parse_payment_uri(uri).is_ok()
}

fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn percent_decode(text: &str) -> Result<String> {
    let malformed = || HoosatError::MalformedUri(format!("bad percent-encoding in '{}'", text));

    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex_digits = bytes.get(i + 1..i + 3).ok_or_else(malformed)?;
                let hex_str = std::str::from_utf8(hex_digits).map_err(|_| malformed())?;
                out.push(u8::from_str_radix(hex_str, 16).map_err(|_| malformed())?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{AddressVersion, KeyPair};

    fn address() -> Address {
        KeyPair::generate(Network::Mainnet).address(AddressVersion::PubKeyEcdsa)
    }

    #[test]
    fn test_round_trip() {
        let params = PaymentParams::new(address())
            .with_amount(2_550_000_000)
            .with_label("Restaurant")
            .with_message("Table 15 - Dinner");
        let uri = build_payment_uri(&params);
        assert!(uri.starts_with("hoosat:"));
        assert!(uri.contains("amount=25.5"));
        assert!(uri.contains("message=Table%2015%20-%20Dinner"));

        let request = parse_payment_uri(&uri).unwrap();
        assert_eq!(request.params(), params);
        assert_eq!(request.raw_uri, uri);
        assert_eq!(request.amount_htn().as_deref(), Some("25.5"));
    }

    #[test]
    fn test_address_only() {
        let address = address();
        let uri = address.to_string();
        assert_eq!(build_payment_uri(&PaymentParams::new(address.clone())), uri);
        let request = parse_payment_uri(&uri).unwrap();
        assert_eq!(request.address, address);
        assert_eq!(request.amount, None);
        assert_eq!(request.label, None);
    }

    #[test]
    fn test_query_decoding() {
        let address = address();
        let uri = format!(
            "{}?label=Caf%C3%A9+Bar&foo=bar&amount=1&amount=2&message=&",
            address
        );
        let request = parse_payment_uri(&uri).unwrap();
        assert_eq!(request.label.as_deref(), Some("Café Bar"));
        assert_eq!(request.amount, Some(100_000_000));
        assert_eq!(request.message.as_deref(), Some(""));
    }

    #[test]
    fn test_non_ascii_round_trip() {
        let params = PaymentParams::new(address()).with_label("Zoë & Co. 100%/ok?");
        let request = parse_payment_uri(&build_payment_uri(&params)).unwrap();
        assert_eq!(request.params(), params);
    }

    #[test]
    fn test_invalid_uris() {
        let valid = address().to_string();
        let negative = format!("{}?amount=-5", valid);
        let non_numeric = format!("{}?amount=abc", valid);
        let bad_escape = format!("{}?label=%zz", valid);
        let bad_utf8 = format!("{}?label=%E2%82", valid);
        let uris: [&str; 7] = [
            "bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "hoosat:invalid_address",
            "not_a_uri",
            &negative,
            &non_numeric,
            &bad_escape,
            &bad_utf8,
        ];
        for uri in uris {
            assert!(!is_valid_payment_uri(uri), "accepted {:?}", uri);
        }
        assert!(is_valid_payment_uri(&valid));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(parse_payment_uri("not_a_uri"), Err(HoosatError::MalformedUri(_))));
        assert!(matches!(
            parse_payment_uri("bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"),
            Err(HoosatError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_payment_uri("hoosat:invalid_address"),
            Err(HoosatError::InvalidAddress(_))
        ));
        let negative = format!("{}?amount=-1", address());
        assert!(matches!(
            parse_payment_uri(&negative),
            Err(HoosatError::InvalidPaymentAmount(_))
        ));
    }

    #[test]
    fn test_testnet_scheme() {
        let address = KeyPair::generate(Network::Testnet).address(AddressVersion::PubKey);
        let uri = build_payment_uri(&PaymentParams::new(address.clone()).with_amount(1));
        assert!(uri.starts_with("hoosattest:"));
        assert_eq!(uri, format!("{}?amount=0.00000001", address));
        assert_eq!(parse_payment_uri(&uri).unwrap().address, address);
    }
}
