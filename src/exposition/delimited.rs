//! Varint length-delimited `MetricFamily` streams.

use super::{ExpositionError, MetricFamily};
use bytes::Bytes;
use prometheus::{Encoder, PROTOBUF_FORMAT, ProtobufEncoder};
use protobuf::CodedInputStream;

pub const DELIMITED_CONTENT_TYPE: &str = PROTOBUF_FORMAT;

/// Encodes families back to back, each prefixed by its varint length.
///
/// Fails on a family without a name or without metrics.
pub fn encode(families: &[MetricFamily]) -> Result<Bytes, ExpositionError> {
    let mut buf = Vec::new();
    ProtobufEncoder::new().encode(families, &mut buf)?;
    Ok(Bytes::from(buf))
}

pub fn decode(buf: &[u8]) -> Result<Vec<MetricFamily>, ExpositionError> {
    let mut input = CodedInputStream::from_bytes(buf);
    let mut families = Vec::new();
    while !input.eof()? {
        families.push(input.read_message::<MetricFamily>()?);
    }
    Ok(families)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposition::text;

    #[test]
    fn content_type_names_the_delimited_encoding() {
        assert_eq!(
            DELIMITED_CONTENT_TYPE,
            "application/vnd.google.protobuf; proto=io.prometheus.client.MetricFamily; encoding=delimited"
        );
    }

    #[test]
    fn encoded_stream_decodes_to_the_same_families() {
        let families = text::parse(
            "# HELP up Whether the target is up.\n\
             # TYPE up gauge\n\
             up{instance=\"a\"} 1\n\
             # TYPE lat histogram\n\
             lat_bucket{le=\"1\"} 2\n\
             lat_bucket{le=\"+Inf\"} 3\n\
             lat_sum 4.5\n\
             lat_count 3\n",
        )
        .unwrap();

        let expected: Vec<MetricFamily> = families.into_values().collect();
        let bytes = encode(&expected).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded, expected);
    }

    #[test]
    fn empty_input_is_empty_stream() {
        let bytes = encode(&[]).unwrap();
        assert!(bytes.is_empty());
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn family_without_metrics_is_not_encoded() {
        let family = MetricFamily {
            name: Some("up".to_string()),
            ..MetricFamily::default()
        };
        assert!(matches!(
            encode(&[family]),
            Err(ExpositionError::Encode(_))
        ));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let families: Vec<_> = text::parse("up 1\n").unwrap().into_values().collect();
        let bytes = encode(&families).unwrap();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1]),
            Err(ExpositionError::Decode(_))
        ));
    }
}
