use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::Write;

/// Serializes a value to JSON and uploads it to an S3 bucket with
/// `application/json` content type, gzip-compressed when `gzip` is set.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
    gzip: bool,
) -> anyhow::Result<()> {
    let json = serde_json::to_vec(value)?;

    let request = client
        .put_object()
        .bucket(bucket)
        .content_type("application/json");

    let request = if gzip {
        request
            .key(format!("{key}.gz"))
            .content_encoding("gzip")
            .body(gzip_bytes(&json)?.into())
    } else {
        request.key(key).body(json.into())
    };

    request.send().await?;

    Ok(())
}

fn gzip_bytes(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_gzip_bytes_decompresses_to_input() {
        let input = br#"{"summaries":[]}"#;
        let compressed = gzip_bytes(input).unwrap();

        let mut decoded = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, input);
    }
}
