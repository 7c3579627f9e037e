//! Encoding of `ra_svn` items into wire bytes.

use super::SvnItem;

pub(crate) fn encode_item(item: &SvnItem, out: &mut Vec<u8>) {
    match item {
        SvnItem::Word(w) => {
            out.extend_from_slice(w.as_bytes());
            out.push(b' ');
        }
        SvnItem::Number(n) => {
            encode_decimal_u64(*n, out);
            out.push(b' ');
        }
        SvnItem::Bool(b) => out.extend_from_slice(if *b { b"true " } else { b"false " }),
        SvnItem::String(bytes) => {
            encode_decimal_u64(bytes.len() as u64, out);
            out.push(b':');
            out.extend_from_slice(bytes);
            out.push(b' ');
        }
        SvnItem::List(items) => {
            out.extend_from_slice(b"( ");
            for item in items {
                encode_item(item, out);
            }
            out.extend_from_slice(b") ");
        }
    }
}

/// Encodes `( command params ) ` without building an outer list item.
pub(crate) fn encode_command(command: &str, params: &SvnItem, out: &mut Vec<u8>) {
    out.extend_from_slice(b"( ");
    out.extend_from_slice(command.as_bytes());
    out.push(b' ');
    encode_item(params, out);
    out.extend_from_slice(b") ");
}

fn encode_decimal_u64(mut n: u64, out: &mut Vec<u8>) {
    if n == 0 {
        out.push(b'0');
        return;
    }
    let mut buf = [0u8; 20];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }
    out.extend_from_slice(&buf[i..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(item: &SvnItem) -> Vec<u8> {
        let mut bytes = Vec::new();
        encode_item(item, &mut bytes);
        bytes
    }

    #[test]
    fn encodes_nested_items() {
        let item = SvnItem::List(vec![
            SvnItem::word("word"),
            SvnItem::Number(22),
            SvnItem::string("string"),
            SvnItem::Bool(false),
            SvnItem::List(vec![SvnItem::word("sublist")]),
        ]);
        assert_eq!(
            encoded(&item),
            b"( word 22 6:string false ( sublist ) ) "
        );
    }

    #[test]
    fn encodes_zero_and_large_numbers() {
        assert_eq!(encoded(&SvnItem::Number(0)), b"0 ");
        assert_eq!(
            encoded(&SvnItem::Number(u64::MAX)),
            b"18446744073709551615 "
        );
    }

    #[test]
    fn check_path_command_encodes_optional_revision() {
        let params = SvnItem::List(vec![
            SvnItem::string("conf/app.conf"),
            SvnItem::List(vec![SvnItem::Number(12)]),
        ]);
        let mut bytes = Vec::new();
        encode_command("check-path", &params, &mut bytes);
        assert_eq!(bytes, b"( check-path ( 13:conf/app.conf ( 12 ) ) ) ");

        let params = SvnItem::List(vec![SvnItem::string(""), SvnItem::List(Vec::new())]);
        let mut bytes = Vec::new();
        encode_command("check-path", &params, &mut bytes);
        assert_eq!(bytes, b"( check-path ( 0: ( ) ) ) ");
    }

    #[test]
    fn auth_response_plain_encodes_binary_token_inside_tuple() {
        let item = SvnItem::List(vec![
            SvnItem::word("PLAIN"),
            SvnItem::List(vec![SvnItem::String(vec![0, b'u', 0, b'p'])]),
        ]);

        let mut expected = b"( PLAIN ( 4:".to_vec();
        expected.extend_from_slice(&[0, b'u', 0, b'p']);
        expected.extend_from_slice(b" ) ) ");
        assert_eq!(encoded(&item), expected);
    }
}
