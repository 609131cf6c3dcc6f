//! Tokenizer: the external collaborator that turns raw input bytes into
//! a lazy sequence of text tokens. Whatever comes out here is
//! fed verbatim to `InputPrepper` — no assumption is made downstream
//! about how the split happened.

use crate::error::CrateResult;
use bstr::ByteSlice;
use std::io::{BufReader, Read};

/// Reads `source` to completion and splits it into tokens. When
/// `delimiter` is given, tokens are split on that single byte (trailing
/// empty token from a final delimiter is dropped, matching a shell's
/// `$IFS`-delimiter convention). Otherwise splits on runs of ASCII
/// whitespace, shell-quote-unaware (quoting is the caller's concern if
/// it wants it — this layer just splits).
pub fn tokenize<R: Read>(source: R, delimiter: Option<u8>) -> CrateResult<Vec<String>> {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;

    let tokens = match delimiter {
        Some(b) => split_on_byte(&buf, b),
        None => split_whitespace(&buf),
    };
    Ok(tokens)
}

fn split_on_byte(buf: &[u8], delim: u8) -> Vec<String> {
    buf.split_str(&[delim])
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.to_str_lossy().into_owned())
        .collect()
}

fn split_whitespace(buf: &[u8]) -> Vec<String> {
    buf.fields().map(|f| f.to_str_lossy().into_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_by_default() {
        let input = b"cat snake\nhedgehog dog  horse".to_vec();
        let tokens = tokenize(&input[..], None).unwrap();
        assert_eq!(tokens, vec!["cat", "snake", "hedgehog", "dog", "horse"]);
    }

    #[test]
    fn splits_on_given_delimiter_and_drops_trailing_empty() {
        let input = b"a\0b\0c\0".to_vec();
        let tokens = tokenize(&input[..], Some(0)).unwrap();
        assert_eq!(tokens, vec!["a", "b", "c"]);
    }
}
