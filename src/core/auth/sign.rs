use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use sha1::Sha1;

use crate::utils::error::{ArkError, Result};

const U8_SIGN_KEY: &[u8] = b"91240f70c09a08a6bc72af1a5c8d4670";

/// Characters left as is in a signed query; space is handled separately.
const QUERY_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

fn quote_plus(input: &str) -> String {
    input
        .split(' ')
        .map(|part| utf8_percent_encode(part, QUERY_SAFE).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Scalars are written the way the game servers' own signer prints them.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Build the signed query string: key-sorted pairs, `quote_plus` encoded.
pub(crate) fn sign_query(params: &Map<String, Value>) -> String {
    let mut pairs: Vec<(&String, &Value)> = params.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", quote_plus(key), quote_plus(&query_value(value))))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign a u8/as request body: HMAC-SHA1 over the key-sorted, form-encoded
/// parameters, as lowercase hex.
pub fn generate_u8_sign(params: &Map<String, Value>) -> Result<String> {
    let query = sign_query(params);

    let mut mac = HmacSha1::new_from_slice(U8_SIGN_KEY)
        .map_err(|e| ArkError::unexpected(format!("invalid sign key: {e}")))?;
    mac.update(query.as_bytes());

    Ok(mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

/// Insert the `sign` field into a JSON object body.
pub(crate) fn signed(mut body: Map<String, Value>) -> Result<Value> {
    let sign = generate_u8_sign(&body)?;
    body.insert("sign".to_string(), Value::String(sign));
    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sign_matches_known_digest() {
        let params = object(json!({
            "token": "abc",
            "account": "doctor@example.com",
            "platform": 1
        }));

        assert_eq!(
            generate_u8_sign(&params).unwrap(),
            "e768c60b6e12a31ebc8c8d03f68bed8eca8f88c5"
        );
    }

    /// `*` is escaped while `~` stays literal
    #[test]
    fn test_sign_escapes_reserved_password_characters() {
        let params = object(json!({
            "account": "doc",
            "password": "p*ss~word",
            "deviceId": "x",
            "platform": 1
        }));

        assert_eq!(
            sign_query(&params),
            "account=doc&deviceId=x&password=p%2Ass~word&platform=1"
        );
        assert_eq!(
            generate_u8_sign(&params).unwrap(),
            "ecda8d64611f1e1465fe92f73c22227dc69ac328"
        );
    }

    #[test]
    fn test_sign_query_spaces_and_booleans() {
        let params = object(json!({"token": "a b", "flag": true}));

        assert_eq!(sign_query(&params), "flag=True&token=a+b");
        assert_eq!(
            generate_u8_sign(&params).unwrap(),
            "321b42b48c2c693754bb5f7878863df409feafa5"
        );
    }

    #[test]
    fn test_sign_ignores_insertion_order() {
        let a = object(json!({"b": "2", "a": "1"}));
        let mut b = Map::new();
        b.insert("a".to_string(), json!("1"));
        b.insert("b".to_string(), json!("2"));

        assert_eq!(generate_u8_sign(&a).unwrap(), generate_u8_sign(&b).unwrap());
    }

    #[test]
    fn test_signed_appends_sign_field() {
        let body = signed(object(json!({"token": "abc"}))).unwrap();
        let sign = body["sign"].as_str().unwrap();

        assert_eq!(sign.len(), 40);
        assert!(sign.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
