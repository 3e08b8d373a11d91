//! Minimal query-string parsing for the five parameters this crate reads:
//! `sid`, `transport`, `b64`, `j`, `EIO`.

use std::borrow::Cow;
use std::collections::HashMap;

pub fn parse(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, value),
            None => (pair, ""),
        };

        params.insert(decode(key).into_owned(), decode(value).into_owned());
    }

    params
}

fn decode(value: &str) -> Cow<'_, str> {
    percent_encoding::percent_decode_str(&value.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
        .into()
}
