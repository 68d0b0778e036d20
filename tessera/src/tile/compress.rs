//! Tile payload compression.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::str::FromStr;

/// Transfer compression applied to encoded tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileCompression {
    #[default]
    None,
    Gzip,
}

impl FromStr for TileCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            other => Err(format!("unknown compression '{}'", other)),
        }
    }
}

/// Compress an encoded tile.
pub fn compress(bytes: &[u8], compression: TileCompression) -> io::Result<Vec<u8>> {
    match compression {
        TileCompression::None => Ok(bytes.to_vec()),
        TileCompression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
            encoder.write_all(bytes)?;
            encoder.finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_gzip_decompresses_to_input() {
        let payload = b"vector tile payload ".repeat(50);
        let compressed = compress(&payload, TileCompression::Gzip).unwrap();

        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert!(compressed.len() < payload.len());

        let mut decoded = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_none_is_passthrough() {
        assert_eq!(compress(b"abc", TileCompression::None).unwrap(), b"abc");
    }

    #[test]
    fn test_parse() {
        assert_eq!("GZIP".parse::<TileCompression>().unwrap(), TileCompression::Gzip);
        assert!("brotli".parse::<TileCompression>().is_err());
    }
}
