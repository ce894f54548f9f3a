mod uri;

pub use uri::{
    build_payment_uri, is_valid_payment_uri, parse_payment_uri, PaymentParams, PaymentRequest,
};
